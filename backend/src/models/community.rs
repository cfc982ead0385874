use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::geo::GeoPoint;

/// Reward points a volunteer earns for each completed help request
pub const VOLUNTEER_REWARD_POINTS: i64 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HelpRequestStatus {
    Open,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
}

impl HelpRequestStatus {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "open" => Ok(HelpRequestStatus::Open),
            "accepted" => Ok(HelpRequestStatus::Accepted),
            "in_progress" | "in-progress" => Ok(HelpRequestStatus::InProgress),
            "completed" => Ok(HelpRequestStatus::Completed),
            "cancelled" => Ok(HelpRequestStatus::Cancelled),
            _ => Err(format!("Invalid help request status: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HelpRequestStatus::Open => "open",
            HelpRequestStatus::Accepted => "accepted",
            HelpRequestStatus::InProgress => "in_progress",
            HelpRequestStatus::Completed => "completed",
            HelpRequestStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, HelpRequestStatus::Completed | HelpRequestStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

impl Urgency {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Urgency::Low),
            "medium" => Ok(Urgency::Medium),
            "high" => Ok(Urgency::High),
            _ => Err(format!("Invalid urgency: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
        }
    }
}

/// Volunteer profile of a user in community mode
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CommunityVolunteer {
    pub id: Uuid,
    pub user_id: Uuid,
    pub skills: Vec<String>,
    pub bio: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
    pub is_available: bool,
    pub helps_completed: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl CommunityVolunteer {
    pub fn location(&self) -> GeoPoint {
        GeoPoint {
            lat: self.latitude,
            lon: self.longitude,
        }
    }

    /// Case-insensitive skill match
    pub fn has_skill(&self, skill: &str) -> bool {
        let wanted = skill.trim().to_lowercase();
        self.skills.iter().any(|s| s.to_lowercase() == wanted)
    }
}

/// Non-paid help request matched to volunteers
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CommunityHelpRequest {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub volunteer_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub skill_needed: String,
    pub urgency: String,
    pub address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
}

impl CommunityHelpRequest {
    pub fn status_enum(&self) -> HelpRequestStatus {
        HelpRequestStatus::from_str(&self.status).unwrap_or(HelpRequestStatus::Open)
    }

    pub fn location(&self) -> GeoPoint {
        GeoPoint {
            lat: self.latitude,
            lon: self.longitude,
        }
    }

    /// Best-effort pre-check before the conditional accept update
    pub fn check_acceptable(&self) -> Result<(), String> {
        if self.volunteer_id.is_some() {
            return Err("Help request already has a volunteer assigned".to_string());
        }
        if self.status_enum() != HelpRequestStatus::Open {
            return Err(format!("Help request is {}", self.status));
        }
        Ok(())
    }
}

/// Volunteer with distance from the request location
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyVolunteer {
    #[serde(flatten)]
    pub volunteer: CommunityVolunteer,
    pub distance_km: f64,
}
