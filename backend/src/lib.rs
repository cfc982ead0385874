//! HelpHive Backend Library
//!
//! This module exposes the backend components for use by tests and other consumers.

pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod geo;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod websocket;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};

use auth::{AccountGuard, TokenService};
use axum::routing::get;
use axum::Router;
use database::Database;
use repositories::*;
use services::*;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use websocket::WebSocketServer;

/// Application state containing all repositories and services
pub struct AppState {
    pub database: Database,
    pub user_repo: Arc<UserRepository>,
    pub provider_repo: Arc<ProviderRepository>,
    pub wallet_repo: Arc<WalletRepository>,
    pub booking_repo: Arc<BookingRepository>,
    pub emergency_repo: Arc<EmergencyRepository>,
    pub community_repo: Arc<CommunityRepository>,
    pub video_repo: Arc<VideoRepository>,
    pub cost_repo: Arc<CostRepository>,
    pub audit: Arc<AuditTrailService>,
    pub auth_service: Arc<AuthService>,
    pub provider_service: Arc<ProviderService>,
    pub wallet_service: Arc<WalletService>,
    pub booking_service: Arc<BookingService>,
    pub emergency_service: Arc<EmergencyService>,
    pub video_service: Arc<VideoService>,
    pub cost_estimator_service: Arc<CostEstimatorService>,
    pub community_service: Arc<CommunityService>,
    pub tokens: TokenService,
    pub ws_server: Arc<WebSocketServer>,
    pub environment: String,
}

impl AppState {
    /// Wire repositories and services over one pool
    pub fn new(pool: sqlx::PgPool, config: &AppConfig) -> AppResult<Self> {
        let database = Database::new(pool.clone());

        let user_repo = Arc::new(UserRepository::new(pool.clone()));
        let provider_repo = Arc::new(ProviderRepository::new(pool.clone()));
        let wallet_repo = Arc::new(WalletRepository::new(pool.clone()));
        let booking_repo = Arc::new(BookingRepository::new(pool.clone()));
        let emergency_repo = Arc::new(EmergencyRepository::new(pool.clone()));
        let community_repo = Arc::new(CommunityRepository::new(pool.clone()));
        let video_repo = Arc::new(VideoRepository::new(pool.clone()));
        let cost_repo = Arc::new(CostRepository::new(pool));

        let audit = Arc::new(AuditTrailService::new(&config.audit_log_dir)?);
        let tokens = TokenService::new(&config.auth);
        let ws_server = Arc::new(WebSocketServer::new());

        let accounts = AccountGuard::new(Arc::clone(&user_repo));

        let wallet_service = Arc::new(WalletService::new(
            Arc::clone(&wallet_repo),
            accounts.clone(),
            Arc::clone(&audit),
        ));

        Ok(Self {
            auth_service: Arc::new(AuthService::new(
                Arc::clone(&user_repo),
                Arc::clone(&provider_repo),
                tokens.clone(),
            )),
            provider_service: Arc::new(ProviderService::new(Arc::clone(&provider_repo))),
            booking_service: Arc::new(BookingService::new(
                Arc::clone(&booking_repo),
                Arc::clone(&provider_repo),
                Arc::clone(&wallet_service),
                accounts.clone(),
                Arc::clone(&ws_server),
                Arc::clone(&audit),
            )),
            emergency_service: Arc::new(EmergencyService::new(
                Arc::clone(&emergency_repo),
                Arc::clone(&provider_repo),
                accounts.clone(),
                Arc::clone(&ws_server),
                Arc::clone(&audit),
            )),
            video_service: Arc::new(VideoService::new(
                Arc::clone(&video_repo),
                Arc::clone(&provider_repo),
                accounts.clone(),
                Arc::clone(&audit),
                config.auth.jwt_secret.clone(),
            )),
            cost_estimator_service: Arc::new(CostEstimatorService::new(Arc::clone(&cost_repo))),
            community_service: Arc::new(CommunityService::new(
                Arc::clone(&community_repo),
                Arc::clone(&wallet_service),
                accounts,
                Arc::clone(&ws_server),
                Arc::clone(&audit),
            )),
            wallet_service,
            database,
            user_repo,
            provider_repo,
            wallet_repo,
            booking_repo,
            emergency_repo,
            community_repo,
            video_repo,
            cost_repo,
            audit,
            tokens,
            ws_server,
            environment: config.environment.clone(),
        })
    }
}

/// HTTP application: `/health` plus every domain router under `/api`
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .nest("/auth", routes::auth::auth_routes())
        .nest("/services", routes::providers::provider_routes())
        .nest("/bookings", routes::bookings::booking_routes())
        .nest("/emergency", routes::emergency::emergency_routes())
        .nest("/wallet", routes::wallet::wallet_routes())
        .nest("/video-consultations", routes::video::video_routes())
        .nest("/cost-estimator", routes::cost_estimator::cost_estimator_routes())
        .nest("/community", routes::community::community_routes());

    Router::new()
        .route("/health", get(routes::health::health))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
