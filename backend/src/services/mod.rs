pub mod audit;
pub mod auth_service;
pub mod booking_service;
pub mod community_service;
pub mod cost_estimator_service;
pub mod emergency_service;
pub mod provider_service;
pub mod video_service;
pub mod wallet_service;

pub use audit::AuditTrailService;
pub use auth_service::AuthService;
pub use booking_service::BookingService;
pub use community_service::CommunityService;
pub use cost_estimator_service::CostEstimatorService;
pub use emergency_service::EmergencyService;
pub use provider_service::ProviderService;
pub use video_service::VideoService;
pub use wallet_service::WalletService;
