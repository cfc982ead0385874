pub mod booking_repository;
pub mod community_repository;
pub mod cost_repository;
pub mod emergency_repository;
pub mod provider_repository;
pub mod user_repository;
pub mod video_repository;
pub mod wallet_repository;

// Re-export all repositories for convenient access
pub use booking_repository::{BookingRepository, NewBooking};
pub use community_repository::{CommunityRepository, NewHelpRequest, NewVolunteer, VolunteerUpdate};
pub use cost_repository::CostRepository;
pub use emergency_repository::{EmergencyRepository, NewEmergency, TrackingNote};
pub use provider_repository::{
    NewProvider, ProviderAreaQuery, ProviderFilter, ProviderRepository, ProviderUpdate,
};
pub use user_repository::{NewUser, UserRepository, UserUpdate};
pub use video_repository::{NewConsultation, VideoRepository};
pub use wallet_repository::{WalletChange, WalletRepository};
