use super::{ApiJson, ApiQuery, ApiResult, CreatedResult, SharedState, created, ok};
use crate::auth::AuthUser;
use crate::models::{CostEstimate, CostTemplate, UserRole};
use crate::services::cost_estimator_service::{CreateTemplateRequest, EstimateRequest};
use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TemplatesQuery {
    service_type: Option<String>,
}

pub fn cost_estimator_routes() -> Router<SharedState> {
    Router::new()
        .route("/templates", get(templates).post(create_template))
        .route("/estimate", post(estimate))
}

async fn templates(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<TemplatesQuery>,
) -> ApiResult<Vec<CostTemplate>> {
    Ok(ok(state
        .cost_estimator_service
        .templates(query.service_type.as_deref())
        .await?))
}

async fn estimate(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<EstimateRequest>,
) -> ApiResult<CostEstimate> {
    Ok(ok(state.cost_estimator_service.estimate(&req).await?))
}

async fn create_template(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateTemplateRequest>,
) -> CreatedResult<CostTemplate> {
    user.require_role(&[UserRole::Admin])?;
    Ok(created(state.cost_estimator_service.create_template(req).await?))
}
