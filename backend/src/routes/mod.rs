//! HTTP routers, one per domain, mounted under `/api` by [`crate::build_router`].
//!
//! Successful responses share the `{"success": true, "data": ...}` envelope;
//! failures are rendered by [`crate::error::AppError`].

pub mod auth;
pub mod bookings;
pub mod community;
pub mod cost_estimator;
pub mod emergency;
pub mod extract;
pub mod health;
pub mod providers;
pub mod video;
pub mod wallet;

pub use extract::{ApiJson, ApiPath, ApiQuery};

use crate::error::AppResult;
use crate::AppState;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

pub type SharedState = Arc<AppState>;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

pub type ApiResult<T> = AppResult<Json<ApiResponse<T>>>;
pub type CreatedResult<T> = AppResult<(StatusCode, Json<ApiResponse<T>>)>;

pub fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
    })
}

pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, ok(data))
}
