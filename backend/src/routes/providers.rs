use super::{ApiJson, ApiPath, ApiQuery, ApiResult, SharedState, ok};
use crate::auth::AuthUser;
use crate::models::{NearbyProvider, ServiceCategory, ServiceProvider, UserRole};
use crate::services::provider_service::{ListProvidersQuery, NearbyQuery, UpdateProviderRequest};
use axum::extract::State;
use axum::routing::{get, put};
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AvailabilityRequest {
    is_available: bool,
}

#[derive(Debug, Deserialize)]
struct VerifyRequest {
    verified: bool,
}

pub fn provider_routes() -> Router<SharedState> {
    Router::new()
        .route("/categories", get(categories))
        .route("/providers", get(list_providers))
        .route("/providers/nearby", get(nearby_providers))
        .route("/providers/:id", get(get_provider))
        .route("/providers/:id/verify", put(verify_provider))
        .route("/me", get(my_profile).put(update_my_profile))
        .route("/me/availability", put(set_availability))
}

async fn categories(State(state): State<SharedState>) -> ApiResult<Vec<ServiceCategory>> {
    Ok(ok(state.provider_service.categories()))
}

async fn list_providers(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<ListProvidersQuery>,
) -> ApiResult<Vec<ServiceProvider>> {
    Ok(ok(state.provider_service.list(&query).await?))
}

async fn nearby_providers(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<NearbyQuery>,
) -> ApiResult<Vec<NearbyProvider>> {
    Ok(ok(state.provider_service.find_nearby(&query).await?))
}

async fn get_provider(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ServiceProvider> {
    Ok(ok(state.provider_service.get(id).await?))
}

async fn verify_provider(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<VerifyRequest>,
) -> ApiResult<ServiceProvider> {
    user.require_role(&[UserRole::Admin])?;
    Ok(ok(state.provider_service.verify(id, req.verified).await?))
}

async fn my_profile(
    State(state): State<SharedState>,
    user: AuthUser,
) -> ApiResult<ServiceProvider> {
    user.require_role(&[UserRole::Helper])?;
    Ok(ok(state.provider_service.profile_for_user(user.id).await?))
}

async fn update_my_profile(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiJson(req): ApiJson<UpdateProviderRequest>,
) -> ApiResult<ServiceProvider> {
    user.require_role(&[UserRole::Helper])?;
    Ok(ok(state.provider_service.update_my_profile(user.id, req).await?))
}

async fn set_availability(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiJson(req): ApiJson<AvailabilityRequest>,
) -> ApiResult<ServiceProvider> {
    user.require_role(&[UserRole::Helper])?;
    Ok(ok(state
        .provider_service
        .set_availability(user.id, req.is_available)
        .await?))
}
