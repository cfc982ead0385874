use super::{ApiJson, ApiPath, ApiResult, CreatedResult, SharedState, created, ok};
use crate::auth::AuthUser;
use crate::models::{EmergencyDetail, EmergencyService as Emergency, NearbyProvider, UserRole};
use crate::services::emergency_service::{
    CreateEmergencyRequest, DispatchOutcome, UpdateEmergencyStatusRequest,
};
use axum::extract::State;
use axum::routing::{get, post, put};
use axum::Router;
use uuid::Uuid;

pub fn emergency_routes() -> Router<SharedState> {
    Router::new()
        .route("/", post(create_emergency))
        .route("/mine", get(list_mine))
        .route("/assigned", get(list_assigned))
        .route("/active", get(list_active))
        .route("/:id", get(get_emergency))
        .route("/:id/nearby-providers", get(nearby_providers))
        .route("/:id/dispatch", post(redispatch))
        .route("/:id/status", put(update_status))
}

async fn create_emergency(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateEmergencyRequest>,
) -> CreatedResult<Emergency> {
    Ok(created(state.emergency_service.create(&user, req).await?))
}

async fn list_mine(State(state): State<SharedState>, user: AuthUser) -> ApiResult<Vec<Emergency>> {
    Ok(ok(state.emergency_service.list_mine(&user).await?))
}

async fn list_assigned(
    State(state): State<SharedState>,
    user: AuthUser,
) -> ApiResult<Vec<Emergency>> {
    user.require_role(&[UserRole::Helper])?;
    Ok(ok(state.emergency_service.list_assigned(&user).await?))
}

async fn list_active(
    State(state): State<SharedState>,
    user: AuthUser,
) -> ApiResult<Vec<Emergency>> {
    user.require_role(&[UserRole::Admin])?;
    Ok(ok(state.emergency_service.list_active().await?))
}

async fn get_emergency(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<EmergencyDetail> {
    Ok(ok(state.emergency_service.get(&user, id).await?))
}

async fn nearby_providers(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Vec<NearbyProvider>> {
    Ok(ok(state.emergency_service.nearby_providers(&user, id).await?))
}

async fn redispatch(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<DispatchOutcome> {
    Ok(ok(state.emergency_service.redispatch(&user, id).await?))
}

async fn update_status(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateEmergencyStatusRequest>,
) -> ApiResult<Emergency> {
    Ok(ok(state.emergency_service.update_status(&user, id, req).await?))
}
