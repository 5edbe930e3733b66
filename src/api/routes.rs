//! Route Definitions
//!
//! Maps URLs to handlers with type-safe routing.

use super::{admin, handlers::*, websocket::websocket_handler};
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

/// Build the API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Public
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/games", get(games_handler))
        .route("/ws", get(websocket_handler))
        // Authenticated user
        .route("/api/wager", post(wager_handler))
        .route("/api/round", get(round_handler))
        .route("/api/round/bet", post(round_bet_handler))
        .route("/api/round/cashout", post(round_cashout_handler))
        .route("/api/user/balance", get(balance_handler))
        .route("/api/user/history", get(history_handler))
        .route("/api/user/transactions", get(transactions_handler))
        .route("/api/user/stats", get(stats_handler))
        .route("/api/user/transaction-stats", get(transaction_stats_handler))
        .route("/api/user/deposit-request", post(deposit_request_handler))
        .route("/api/user/withdrawal-request", post(withdrawal_request_handler))
        // Admin
        .route(
            "/api/admin/users",
            get(admin::list_users_handler).post(admin::create_user_handler),
        )
        .route("/api/admin/users/:id/balance", put(admin::set_balance_handler))
        .route("/api/admin/transactions", get(admin::list_transactions_handler))
        .route(
            "/api/admin/transactions/:id/status",
            put(admin::transaction_status_handler),
        )
        .route(
            "/api/admin/games",
            get(admin::list_games_handler).post(admin::create_game_handler),
        )
        .route("/api/admin/games/:code/status", put(admin::game_status_handler))
        .route("/api/admin/stats", get(admin::stats_handler))
        .with_state(state)
}
