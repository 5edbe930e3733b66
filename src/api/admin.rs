//! Admin endpoints, guarded by the `X-API-Key` header

use super::{
    errors::ApiError,
    handlers::AppState,
    middleware::{AdminAccess, RequestId},
    models::*,
};
use crate::errors::WagerError;
use crate::games::NewGame;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use std::sync::Arc;
use tracing::info;

/// POST /api/admin/users
pub async fn create_user_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    _admin: AdminAccess,
    body: Result<Json<CreateUserBody>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedUserResponse>), ApiError> {
    let body = state.body(&request_id, body)?;
    let balance = body
        .balance
        .map(|v| state.cents(&request_id, v, "balance"))
        .transpose()?;
    let demo_balance = body
        .demo_balance
        .map(|v| state.cents(&request_id, v, "demoBalance"))
        .transpose()?;

    let (account, token) = state
        .tokens
        .open_account(
            &state.ledger,
            &body.display_name,
            balance,
            demo_balance,
            body.referred_by.as_deref(),
        )
        .map_err(|e| state.reject(&request_id, e))?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedUserResponse {
            account: account.into(),
            token,
        }),
    ))
}

/// GET /api/admin/users
pub async fn list_users_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    _admin: AdminAccess,
) -> Result<Json<Vec<AccountView>>, ApiError> {
    let accounts = state
        .ledger
        .list_accounts()
        .map_err(|e| state.reject(&request_id, e))?;
    Ok(Json(accounts.into_iter().map(AccountView::from).collect()))
}

/// PUT /api/admin/users/:id/balance
pub async fn set_balance_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    _admin: AdminAccess,
    Path(user_id): Path<String>,
    body: Result<Json<SetBalanceBody>, JsonRejection>,
) -> Result<Json<AccountView>, ApiError> {
    let body = state.body(&request_id, body)?;
    if body.balance.is_none() && body.demo_balance.is_none() {
        return Err(state.reject(
            &request_id,
            WagerError::InvalidInput("balance or demoBalance is required".to_string()),
        ));
    }
    let balance = body
        .balance
        .map(|v| state.cents(&request_id, v, "balance"))
        .transpose()?;
    let demo_balance = body
        .demo_balance
        .map(|v| state.cents(&request_id, v, "demoBalance"))
        .transpose()?;

    let account = state
        .ledger
        .set_balances(&user_id, balance, demo_balance)
        .await
        .map_err(|e| state.reject(&request_id, e))?;
    Ok(Json(account.into()))
}

/// GET /api/admin/transactions?status={status}&limit={n}
pub async fn list_transactions_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    _admin: AdminAccess,
    query: Result<Query<TransactionsQuery>, QueryRejection>,
) -> Result<Json<Vec<TransactionView>>, ApiError> {
    let query = state.query(&request_id, query)?;
    let rows = state
        .ledger
        .transactions_by_status(query.status, query.limit.clamp(1, MAX_PAGE))
        .map_err(|e| state.reject(&request_id, e))?;
    Ok(Json(rows.into_iter().map(TransactionView::from).collect()))
}

/// PUT /api/admin/transactions/:id/status
///
/// Approving an already completed transaction reports `alreadySettled` and
/// moves no money.
pub async fn transaction_status_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    _admin: AdminAccess,
    Path(transaction_id): Path<String>,
    body: Result<Json<TransactionStatusBody>, JsonRejection>,
) -> Result<Json<SettlementResponse>, ApiError> {
    let body = state.body(&request_id, body)?;
    let outcome = state
        .ledger
        .settle_transaction(&transaction_id, body.status)
        .await
        .map_err(|e| state.reject(&request_id, e))?;

    info!(
        request_id = %request_id.0,
        tx_id = %transaction_id,
        status = ?outcome.transaction.status,
        already_settled = outcome.already_settled,
        "transaction adjudicated"
    );
    Ok(Json(outcome.into()))
}

/// GET /api/admin/games
pub async fn list_games_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    _admin: AdminAccess,
) -> Result<Json<Vec<GameView>>, ApiError> {
    let games = state
        .catalog
        .list(false)
        .map_err(|e| state.reject(&request_id, e))?;
    Ok(Json(games.into_iter().map(GameView::from).collect()))
}

/// POST /api/admin/games
pub async fn create_game_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    _admin: AdminAccess,
    body: Result<Json<CreateGameBody>, JsonRejection>,
) -> Result<(StatusCode, Json<GameView>), ApiError> {
    let body = state.body(&request_id, body)?;
    let new_game = NewGame {
        min_bet: state.cents(&request_id, body.min_bet, "minBet")?,
        max_bet: state.cents(&request_id, body.max_bet, "maxBet")?,
        code: body.code,
        name: body.name,
        description: body.description,
        category: body.category,
    };

    let game = state
        .catalog
        .create(new_game)
        .map_err(|e| state.reject(&request_id, e))?;
    Ok((StatusCode::CREATED, Json(game.into())))
}

/// PUT /api/admin/games/:code/status
pub async fn game_status_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    _admin: AdminAccess,
    Path(code): Path<String>,
    body: Result<Json<GameStatusBody>, JsonRejection>,
) -> Result<Json<GameView>, ApiError> {
    let body = state.body(&request_id, body)?;
    let game = state
        .catalog
        .set_active(&code, body.is_active)
        .map_err(|e| state.reject(&request_id, e))?;
    Ok(Json(game.into()))
}

/// GET /api/admin/stats
pub async fn stats_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    _admin: AdminAccess,
) -> Result<Json<LedgerStatsResponse>, ApiError> {
    let stats = state
        .ledger
        .ledger_stats()
        .map_err(|e| state.reject(&request_id, e))?;
    Ok(Json(stats.into()))
}
