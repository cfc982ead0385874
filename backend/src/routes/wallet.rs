use super::{ApiJson, ApiQuery, ApiResult, SharedState, ok};
use crate::auth::AuthUser;
use crate::models::WalletTransaction;
use crate::services::wallet_service::{
    AddMoneyRequest, PayRequest, RedeemRequest, RedeemResult, WalletSummary,
};
use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct HistoryQuery {
    limit: Option<i64>,
}

pub fn wallet_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_wallet))
        .route("/transactions", get(transactions))
        .route("/add-money", post(add_money))
        .route("/pay", post(pay))
        .route("/redeem", post(redeem))
}

async fn get_wallet(State(state): State<SharedState>, user: AuthUser) -> ApiResult<WalletSummary> {
    Ok(ok(state.wallet_service.get_wallet(user.id).await?))
}

async fn transactions(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> ApiResult<Vec<WalletTransaction>> {
    Ok(ok(state
        .wallet_service
        .transactions(user.id, query.limit)
        .await?))
}

async fn add_money(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiJson(req): ApiJson<AddMoneyRequest>,
) -> ApiResult<WalletSummary> {
    Ok(ok(state.wallet_service.add_money(user.id, req.amount).await?))
}

async fn pay(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiJson(req): ApiJson<PayRequest>,
) -> ApiResult<WalletSummary> {
    Ok(ok(state.wallet_service.pay(user.id, req).await?))
}

async fn redeem(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiJson(req): ApiJson<RedeemRequest>,
) -> ApiResult<RedeemResult> {
    Ok(ok(state.wallet_service.redeem_points(user.id, req.points).await?))
}
