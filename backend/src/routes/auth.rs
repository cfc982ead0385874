use super::{ApiJson, ApiResult, CreatedResult, SharedState, created, ok};
use crate::auth::AuthUser;
use crate::models::User;
use crate::services::auth_service::{
    AuthResponse, LoginRequest, Profile, RegisterRequest, UpdateLocationRequest,
    UpdateProfileRequest,
};
use axum::extract::State;
use axum::routing::{get, post, put};
use axum::Router;

pub fn auth_routes() -> Router<SharedState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/profile", put(update_profile))
        .route("/location", put(update_location))
}

async fn register(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> CreatedResult<AuthResponse> {
    Ok(created(state.auth_service.register(req).await?))
}

async fn login(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<AuthResponse> {
    Ok(ok(state.auth_service.login(req).await?))
}

async fn me(State(state): State<SharedState>, user: AuthUser) -> ApiResult<Profile> {
    Ok(ok(state.auth_service.me(user.id).await?))
}

async fn update_profile(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> ApiResult<User> {
    Ok(ok(state.auth_service.update_profile(user.id, req).await?))
}

async fn update_location(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiJson(req): ApiJson<UpdateLocationRequest>,
) -> ApiResult<User> {
    Ok(ok(state.auth_service.update_location(user.id, req).await?))
}
