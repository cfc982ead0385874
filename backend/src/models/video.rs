use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const MIN_CONSULTATION_MINUTES: i32 = 10;
pub const MAX_CONSULTATION_MINUTES: i32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    Missed,
}

impl ConsultationStatus {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "scheduled" => Ok(ConsultationStatus::Scheduled),
            "in_progress" | "in-progress" => Ok(ConsultationStatus::InProgress),
            "completed" => Ok(ConsultationStatus::Completed),
            "cancelled" => Ok(ConsultationStatus::Cancelled),
            "missed" => Ok(ConsultationStatus::Missed),
            _ => Err(format!("Invalid consultation status: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsultationStatus::Scheduled => "scheduled",
            ConsultationStatus::InProgress => "in_progress",
            ConsultationStatus::Completed => "completed",
            ConsultationStatus::Cancelled => "cancelled",
            ConsultationStatus::Missed => "missed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Prescription,
    Report,
    Image,
    Note,
    Recording,
}

impl ArtifactKind {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "prescription" => Ok(ArtifactKind::Prescription),
            "report" => Ok(ArtifactKind::Report),
            "image" => Ok(ArtifactKind::Image),
            "note" => Ok(ArtifactKind::Note),
            "recording" => Ok(ArtifactKind::Recording),
            _ => Err(format!("Invalid artifact kind: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Prescription => "prescription",
            ArtifactKind::Report => "report",
            ArtifactKind::Image => "image",
            ArtifactKind::Note => "note",
            ArtifactKind::Recording => "recording",
        }
    }
}

/// Scheduled video session between a user and a provider.
/// Session tokens are never serialized directly; see `ConsultationView`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct VideoConsultation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider_id: Uuid,
    pub topic: String,
    pub status: String,
    pub room_id: String,
    #[serde(skip_serializing, default)]
    pub user_token: String,
    #[serde(skip_serializing, default)]
    pub provider_token: String,
    pub scheduled_at: NaiveDateTime,
    pub duration_minutes: i32,
    pub actual_start: Option<NaiveDateTime>,
    pub actual_end: Option<NaiveDateTime>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl VideoConsultation {
    pub fn status_enum(&self) -> ConsultationStatus {
        ConsultationStatus::from_str(&self.status).unwrap_or(ConsultationStatus::Scheduled)
    }

    /// Actual call length in minutes once both timestamps are known
    pub fn actual_duration_minutes(&self) -> Option<i64> {
        match (self.actual_start, self.actual_end) {
            (Some(start), Some(end)) => Some((end - start).num_minutes()),
            _ => None,
        }
    }
}

/// File or note attached to a consultation
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationArtifact {
    pub id: Uuid,
    pub consultation_id: Uuid,
    pub kind: String,
    pub name: String,
    pub url: String,
    pub created_at: NaiveDateTime,
}

/// Consultation as seen by one participant, carrying only that participant's token
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultationView {
    #[serde(flatten)]
    pub consultation: VideoConsultation,
    pub session_token: Option<String>,
    pub actual_duration_minutes: Option<i64>,
    pub artifacts: Vec<ConsultationArtifact>,
}
