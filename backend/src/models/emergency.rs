use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::provider::ServiceType;
use crate::geo::GeoPoint;

/// Assumed average travel speed of a responder in km/h
pub const RESPONDER_SPEED_KMH: f64 = 30.0;
/// Lower bound for any quoted arrival time
pub const MIN_ETA_MINUTES: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmergencyType {
    Medical,
    Fire,
    Police,
    Accident,
    Plumbing,
    Electrical,
    Other,
}

impl EmergencyType {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "medical" => Ok(EmergencyType::Medical),
            "fire" => Ok(EmergencyType::Fire),
            "police" => Ok(EmergencyType::Police),
            "accident" => Ok(EmergencyType::Accident),
            "plumbing" => Ok(EmergencyType::Plumbing),
            "electrical" => Ok(EmergencyType::Electrical),
            "other" => Ok(EmergencyType::Other),
            _ => Err(format!("Invalid emergency type: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmergencyType::Medical => "medical",
            EmergencyType::Fire => "fire",
            EmergencyType::Police => "police",
            EmergencyType::Accident => "accident",
            EmergencyType::Plumbing => "plumbing",
            EmergencyType::Electrical => "electrical",
            EmergencyType::Other => "other",
        }
    }

    /// Provider service types that can respond to this emergency.
    /// Empty means any emergency provider will do.
    pub fn responder_types(&self) -> Vec<ServiceType> {
        match self {
            EmergencyType::Medical | EmergencyType::Accident => vec![
                ServiceType::Ambulance,
                ServiceType::DoctorVisit,
                ServiceType::Nursing,
            ],
            EmergencyType::Plumbing => vec![ServiceType::Plumbing],
            EmergencyType::Electrical => vec![ServiceType::Electrical],
            EmergencyType::Fire | EmergencyType::Police | EmergencyType::Other => vec![],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmergencyPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl EmergencyPriority {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "low" => Ok(EmergencyPriority::Low),
            "medium" => Ok(EmergencyPriority::Medium),
            "high" => Ok(EmergencyPriority::High),
            "critical" => Ok(EmergencyPriority::Critical),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmergencyPriority::Low => "low",
            EmergencyPriority::Medium => "medium",
            EmergencyPriority::High => "high",
            EmergencyPriority::Critical => "critical",
        }
    }
}

/// Emergency lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyStatus {
    Requested,
    Assigned,
    EnRoute,
    Arrived,
    InProgress,
    Resolved,
    Cancelled,
}

impl EmergencyStatus {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "requested" => Ok(EmergencyStatus::Requested),
            "assigned" => Ok(EmergencyStatus::Assigned),
            "en_route" | "en-route" => Ok(EmergencyStatus::EnRoute),
            "arrived" => Ok(EmergencyStatus::Arrived),
            "in_progress" | "in-progress" => Ok(EmergencyStatus::InProgress),
            "resolved" => Ok(EmergencyStatus::Resolved),
            "cancelled" => Ok(EmergencyStatus::Cancelled),
            _ => Err(format!("Invalid emergency status: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EmergencyStatus::Requested => "requested",
            EmergencyStatus::Assigned => "assigned",
            EmergencyStatus::EnRoute => "en_route",
            EmergencyStatus::Arrived => "arrived",
            EmergencyStatus::InProgress => "in_progress",
            EmergencyStatus::Resolved => "resolved",
            EmergencyStatus::Cancelled => "cancelled",
        }
    }

    /// Responder progress is strictly forward; cancellation only before arrival.
    pub fn can_transition_to(&self, next: EmergencyStatus) -> bool {
        use EmergencyStatus::*;
        matches!(
            (self, next),
            (Requested, Assigned)
                | (Assigned, EnRoute)
                | (EnRoute, Arrived)
                | (Arrived, InProgress)
                | (Arrived, Resolved)
                | (InProgress, Resolved)
                | (Requested, Cancelled)
                | (Assigned, Cancelled)
                | (EnRoute, Cancelled)
        )
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, EmergencyStatus::Resolved | EmergencyStatus::Cancelled)
    }
}

/// High-priority unscheduled service request
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyService {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider_id: Option<Uuid>,
    pub emergency_type: String,
    pub description: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub priority: String,
    pub status: String,
    pub estimated_arrival_minutes: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub resolved_at: Option<NaiveDateTime>,
}

impl EmergencyService {
    pub fn status_enum(&self) -> EmergencyStatus {
        EmergencyStatus::from_str(&self.status).unwrap_or(EmergencyStatus::Requested)
    }

    pub fn emergency_type_enum(&self) -> EmergencyType {
        EmergencyType::from_str(&self.emergency_type).unwrap_or(EmergencyType::Other)
    }

    pub fn location(&self) -> GeoPoint {
        GeoPoint {
            lat: self.latitude,
            lon: self.longitude,
        }
    }
}

/// One entry of an emergency's tracking log
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyTrackingEntry {
    pub id: Uuid,
    pub emergency_id: Uuid,
    pub status: String,
    pub note: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: NaiveDateTime,
}

/// Emergency with its tracking log, as returned by the detail endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyDetail {
    #[serde(flatten)]
    pub emergency: EmergencyService,
    pub tracking: Vec<EmergencyTrackingEntry>,
}

/// Estimated arrival time for a responder `distance_km` away
pub fn estimate_arrival_minutes(distance_km: f64) -> i32 {
    let minutes = (distance_km / RESPONDER_SPEED_KMH * 60.0).ceil() as i32;
    minutes.max(MIN_ETA_MINUTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eta_floor() {
        assert_eq!(estimate_arrival_minutes(0.1), MIN_ETA_MINUTES);
        assert_eq!(estimate_arrival_minutes(15.0), 30);
    }

    #[test]
    fn test_emergency_transitions() {
        use EmergencyStatus::*;
        assert!(Requested.can_transition_to(Assigned));
        assert!(EnRoute.can_transition_to(Arrived));
        assert!(!Requested.can_transition_to(Resolved));
        assert!(!Arrived.can_transition_to(Cancelled));
        assert!(!Resolved.can_transition_to(InProgress));
    }

    #[test]
    fn test_medical_responders() {
        let types = EmergencyType::Medical.responder_types();
        assert!(types.contains(&ServiceType::Ambulance));
        assert!(EmergencyType::Fire.responder_types().is_empty());
    }
}
