use super::{ApiJson, ApiPath, ApiQuery, ApiResult, CreatedResult, SharedState, created, ok};
use crate::auth::AuthUser;
use crate::models::Booking;
use crate::services::booking_service::{
    CreateBookingRequest, ListBookingsQuery, RateBookingRequest, UpdateBookingStatusRequest,
};
use axum::extract::State;
use axum::routing::{get, post, put};
use axum::Router;
use uuid::Uuid;

pub fn booking_routes() -> Router<SharedState> {
    Router::new()
        .route("/", post(create_booking).get(list_bookings))
        .route("/:id", get(get_booking))
        .route("/:id/status", put(update_status))
        .route("/:id/rate", post(rate_booking))
}

async fn create_booking(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateBookingRequest>,
) -> CreatedResult<Booking> {
    Ok(created(state.booking_service.create(&user, req).await?))
}

async fn list_bookings(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiQuery(query): ApiQuery<ListBookingsQuery>,
) -> ApiResult<Vec<Booking>> {
    Ok(ok(state.booking_service.list_mine(&user, &query).await?))
}

async fn get_booking(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Booking> {
    Ok(ok(state.booking_service.get(&user, id).await?))
}

async fn update_status(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateBookingStatusRequest>,
) -> ApiResult<Booking> {
    Ok(ok(state.booking_service.update_status(&user, id, req).await?))
}

async fn rate_booking(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<RateBookingRequest>,
) -> ApiResult<Booking> {
    Ok(ok(state.booking_service.rate(&user, id, req).await?))
}
