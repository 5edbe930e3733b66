//! Request Handlers
//!
//! User-facing and public endpoints. Handlers convert units to cents, call
//! into the ledger, resolver or round scheduler, and map rejections to
//! `ApiError`.

use super::{
    errors::ApiError,
    middleware::{AuthUser, RequestId},
    models::*,
};
use crate::auth::{Authenticator, TokenStore};
use crate::errors::WagerError;
use crate::games::{GameCatalog, WagerRequest, WagerResolver};
use crate::ledger::types::{cents_from_units, units_from_cents};
use crate::ledger::Ledger;
use crate::metrics::Metrics;
use crate::round::{RoundScheduler, RoundSnapshot};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use std::sync::Arc;
use tracing::error;

/// Shared application state
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub catalog: Arc<GameCatalog>,
    pub resolver: Arc<WagerResolver>,
    pub scheduler: Arc<RoundScheduler>,
    pub tokens: TokenStore,
    pub authenticator: Arc<dyn Authenticator>,
    pub metrics: Arc<Metrics>,
    /// Admin endpoints reject everything when unset
    pub admin_api_key: Option<String>,
    pub version: String,
}

impl AppState {
    /// Count the rejection and attach the request id
    pub fn reject(&self, request_id: &RequestId, error: WagerError) -> ApiError {
        self.metrics.record_rejection(error.code());
        ApiError::new(request_id, error)
    }

    /// Unwrap a JSON body, reporting malformed input in the API error format
    pub fn body<T>(&self, request_id: &RequestId, body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
        body.map(|Json(inner)| inner)
            .map_err(|e| self.reject(request_id, WagerError::InvalidInput(e.body_text())))
    }

    /// Unwrap query parameters the same way as [`AppState::body`]
    pub fn query<T>(&self, request_id: &RequestId, query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
        query
            .map(|Query(inner)| inner)
            .map_err(|e| self.reject(request_id, WagerError::InvalidInput(e.body_text())))
    }

    /// Convert a wire amount to cents
    pub fn cents(&self, request_id: &RequestId, units: f64, field: &str) -> Result<i64, ApiError> {
        cents_from_units(units).ok_or_else(|| {
            self.reject(
                request_id,
                WagerError::InvalidInput(format!("{} must be a finite amount", field)),
            )
        })
    }
}

fn page(limit: usize) -> usize {
    limit.clamp(1, MAX_PAGE)
}

/// GET /health
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: state.version.clone(),
        spectators: state.scheduler.broadcaster().spectator_count(),
    })
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /api/games
pub async fn games_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<GameView>>, ApiError> {
    let games = state
        .catalog
        .list(true)
        .map_err(|e| state.reject(&request_id, e))?;
    Ok(Json(games.into_iter().map(GameView::from).collect()))
}

/// POST /api/wager
pub async fn wager_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    body: Result<Json<WagerBody>, JsonRejection>,
) -> Result<Json<WagerResponse>, ApiError> {
    let body = state.body(&request_id, body)?;
    let request = WagerRequest {
        user_id: user.user_id,
        game_code: body.game_code,
        bet_amount: state.cents(&request_id, body.bet_amount, "betAmount")?,
        is_demo: body.is_demo,
        choice: body.choice,
    };

    let receipt = state
        .resolver
        .place_wager(&request)
        .await
        .map_err(|e| state.reject(&request_id, e))?;
    Ok(Json(receipt.into()))
}

/// GET /api/round
pub async fn round_handler(State(state): State<Arc<AppState>>) -> Json<RoundSnapshot> {
    Json(state.scheduler.snapshot().await)
}

/// POST /api/round/bet
pub async fn round_bet_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    body: Result<Json<RoundBetBody>, JsonRejection>,
) -> Result<Json<RoundBetResponse>, ApiError> {
    let body = state.body(&request_id, body)?;
    let amount = state.cents(&request_id, body.bet_amount, "betAmount")?;

    let receipt = state
        .scheduler
        .place_bet(&user.user_id, amount, body.is_demo)
        .await
        .map_err(|e| state.reject(&request_id, e))?;
    Ok(Json(receipt.into()))
}

/// POST /api/round/cashout
pub async fn round_cashout_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    body: Result<Json<RoundCashoutBody>, JsonRejection>,
) -> Result<Json<CashoutResponse>, ApiError> {
    let body = state.body(&request_id, body)?;

    let receipt = state
        .scheduler
        .cash_out(&user.user_id, body.is_demo, body.multiplier)
        .await
        .map_err(|e| state.reject(&request_id, e))?;
    Ok(Json(receipt.into()))
}

/// GET /api/user/balance
pub async fn balance_handler(AuthUser(user): AuthUser) -> Json<BalanceResponse> {
    Json(BalanceResponse {
        user_id: user.user_id,
        balance: units_from_cents(user.balance),
        demo_balance: units_from_cents(user.demo_balance),
    })
}

/// GET /api/user/history?limit={n}
pub async fn history_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let query = state.query(&request_id, query)?;
    let rows = state
        .ledger
        .history_for(&user.user_id, page(query.limit))
        .map_err(|e| state.reject(&request_id, e))?;
    Ok(Json(rows.into_iter().map(HistoryEntry::from).collect()))
}

/// GET /api/user/transactions?limit={n}
pub async fn transactions_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Vec<TransactionView>>, ApiError> {
    let query = state.query(&request_id, query)?;
    let rows = state
        .ledger
        .transactions_for(&user.user_id, page(query.limit))
        .map_err(|e| state.reject(&request_id, e))?;
    Ok(Json(rows.into_iter().map(TransactionView::from).collect()))
}

/// GET /api/user/stats
pub async fn stats_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<UserStatsResponse>, ApiError> {
    let stats = state
        .ledger
        .user_stats(&user.user_id)
        .map_err(|e| state.reject(&request_id, e))?;
    Ok(Json(stats.into()))
}

/// GET /api/user/transaction-stats
pub async fn transaction_stats_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<TransactionStatsResponse>, ApiError> {
    let stats = state
        .ledger
        .transaction_stats(&user.user_id)
        .map_err(|e| state.reject(&request_id, e))?;
    Ok(Json(stats.into()))
}

/// POST /api/user/deposit-request
pub async fn deposit_request_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    body: Result<Json<DepositBody>, JsonRejection>,
) -> Result<(StatusCode, Json<TransactionView>), ApiError> {
    let body = state.body(&request_id, body)?;
    let amount = state.cents(&request_id, body.amount, "amount")?;

    let tx = state
        .ledger
        .request_deposit(&user.user_id, amount, &body.payment_method)
        .await
        .map_err(|e| state.reject(&request_id, e))?;
    Ok((StatusCode::CREATED, Json(tx.into())))
}

/// POST /api/user/withdrawal-request
pub async fn withdrawal_request_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    body: Result<Json<WithdrawalBody>, JsonRejection>,
) -> Result<(StatusCode, Json<TransactionView>), ApiError> {
    let body = state.body(&request_id, body)?;
    let amount = state.cents(&request_id, body.amount, "amount")?;

    let tx = state
        .ledger
        .request_withdrawal(&user.user_id, amount, &body.wallet_address)
        .await
        .map_err(|e| state.reject(&request_id, e))?;
    Ok((StatusCode::CREATED, Json(tx.into())))
}
