//! Domain models for the HelpHive backend.
//!
//! Every persisted entity lives here as a `FromRow` struct. Enumerated
//! columns are stored as TEXT and exposed through typed enums.

pub mod booking;
pub mod community;
pub mod cost;
pub mod emergency;
pub mod provider;
pub mod user;
pub mod video;
pub mod wallet;

pub use booking::{Booking, BookingActor, BookingStatus};
pub use community::{
    CommunityHelpRequest, CommunityVolunteer, HelpRequestStatus, NearbyVolunteer, Urgency,
};
pub use cost::{CostEstimate, CostFactor, CostTemplate};
pub use emergency::{
    EmergencyDetail, EmergencyPriority, EmergencyService, EmergencyStatus, EmergencyTrackingEntry,
    EmergencyType,
};
pub use provider::{NearbyProvider, ServiceCategory, ServiceProvider, ServiceType};
pub use user::{User, UserRole};
pub use video::{
    ArtifactKind, ConsultationArtifact, ConsultationStatus, ConsultationView, VideoConsultation,
};
pub use wallet::{TransactionType, Wallet, WalletTier, WalletTransaction};
