use crate::auth::{AccountGuard, AuthUser};
use crate::error::{AppError, AppResult};
use crate::models::video::{MAX_CONSULTATION_MINUTES, MIN_CONSULTATION_MINUTES};
use crate::models::{
    ArtifactKind, ConsultationArtifact, ConsultationStatus, ConsultationView, VideoConsultation,
};
use crate::repositories::{NewConsultation, ProviderRepository, VideoRepository};
use crate::services::AuditTrailService;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub const DEFAULT_CONSULTATION_MINUTES: i32 = 30;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleConsultationRequest {
    pub provider_id: Uuid,
    pub topic: String,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndConsultationRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddArtifactRequest {
    pub kind: String,
    pub name: String,
    pub url: String,
}

/// Per-participant session token: hex SHA-256 over room, participant and server secret
pub fn session_token(room_id: &str, participant_id: Uuid, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(room_id.as_bytes());
    hasher.update(b":");
    hasher.update(participant_id.as_bytes());
    hasher.update(b":");
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Validate scheduling input and return the duration to store
pub fn validate_schedule(
    req: &ScheduleConsultationRequest,
    now: NaiveDateTime,
) -> AppResult<i32> {
    if req.topic.trim().is_empty() {
        return Err(AppError::Validation("Topic is required".into()));
    }
    if req.scheduled_at.naive_utc() <= now {
        return Err(AppError::Validation(
            "Consultation must be scheduled in the future".into(),
        ));
    }
    let duration = req.duration_minutes.unwrap_or(DEFAULT_CONSULTATION_MINUTES);
    if !(MIN_CONSULTATION_MINUTES..=MAX_CONSULTATION_MINUTES).contains(&duration) {
        return Err(AppError::Validation(format!(
            "Duration must be between {} and {} minutes",
            MIN_CONSULTATION_MINUTES, MAX_CONSULTATION_MINUTES
        )));
    }
    Ok(duration)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Participant {
    Customer,
    Provider,
    Admin,
}

pub struct VideoService {
    video_repo: Arc<VideoRepository>,
    provider_repo: Arc<ProviderRepository>,
    accounts: AccountGuard,
    audit: Arc<AuditTrailService>,
    token_secret: String,
}

impl VideoService {
    pub fn new(
        video_repo: Arc<VideoRepository>,
        provider_repo: Arc<ProviderRepository>,
        accounts: AccountGuard,
        audit: Arc<AuditTrailService>,
        token_secret: String,
    ) -> Self {
        Self {
            video_repo,
            provider_repo,
            accounts,
            audit,
            token_secret,
        }
    }

    pub async fn schedule(
        &self,
        caller: &AuthUser,
        req: ScheduleConsultationRequest,
    ) -> AppResult<ConsultationView> {
        let duration = validate_schedule(&req, Utc::now().naive_utc())?;
        self.accounts.ensure_active(caller.id).await?;

        let provider = self
            .provider_repo
            .find_by_id(req.provider_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Provider not found".into()))?;
        if provider.user_id == caller.id {
            return Err(AppError::Validation(
                "You cannot book a consultation with yourself".into(),
            ));
        }

        let id = Uuid::new_v4();
        let room_id = format!("hh-{}", id.simple());
        let consultation = self
            .video_repo
            .create(&NewConsultation {
                id,
                user_id: caller.id,
                provider_id: provider.id,
                topic: req.topic.trim().to_string(),
                user_token: session_token(&room_id, caller.id, &self.token_secret),
                provider_token: session_token(&room_id, provider.user_id, &self.token_secret),
                room_id,
                scheduled_at: req.scheduled_at.naive_utc(),
                duration_minutes: duration,
            })
            .await?;

        info!(
            "Consultation {} scheduled: user={} provider={} at {}",
            consultation.id, caller.id, provider.id, consultation.scheduled_at
        );

        self.view(consultation, Participant::Customer).await
    }

    async fn load_for(
        &self,
        caller: &AuthUser,
        id: Uuid,
    ) -> AppResult<(VideoConsultation, Participant)> {
        let consultation = self
            .video_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Consultation not found".into()))?;

        if consultation.user_id == caller.id {
            return Ok((consultation, Participant::Customer));
        }
        let is_provider = self
            .provider_repo
            .find_by_user(caller.id)
            .await?
            .map_or(false, |p| p.id == consultation.provider_id);
        if is_provider {
            return Ok((consultation, Participant::Provider));
        }
        if caller.is_admin() {
            return Ok((consultation, Participant::Admin));
        }
        Err(AppError::Forbidden(
            "You are not a participant in this consultation".into(),
        ))
    }

    /// Attach artifacts and expose only the caller's own session token
    async fn view(
        &self,
        consultation: VideoConsultation,
        participant: Participant,
    ) -> AppResult<ConsultationView> {
        let artifacts = self.video_repo.artifacts(consultation.id).await?;
        let session_token = match participant {
            Participant::Customer => Some(consultation.user_token.clone()),
            Participant::Provider => Some(consultation.provider_token.clone()),
            Participant::Admin => None,
        };

        Ok(ConsultationView {
            actual_duration_minutes: consultation.actual_duration_minutes(),
            session_token,
            artifacts,
            consultation,
        })
    }

    pub async fn list_mine(&self, caller: &AuthUser) -> AppResult<Vec<VideoConsultation>> {
        let provider_id = self.provider_repo.find_by_user(caller.id).await?.map(|p| p.id);
        Ok(self
            .video_repo
            .find_for_participant(caller.id, provider_id)
            .await?)
    }

    pub async fn get(&self, caller: &AuthUser, id: Uuid) -> AppResult<ConsultationView> {
        let (consultation, participant) = self.load_for(caller, id).await?;
        self.view(consultation, participant).await
    }

    pub async fn start(&self, caller: &AuthUser, id: Uuid) -> AppResult<ConsultationView> {
        let (consultation, participant) = self.load_for(caller, id).await?;
        if consultation.status_enum() != ConsultationStatus::Scheduled {
            return Err(AppError::Conflict(format!(
                "Consultation is already {}",
                consultation.status
            )));
        }

        let started = self
            .video_repo
            .start(id)
            .await?
            .ok_or_else(|| AppError::Conflict("Consultation status changed concurrently".into()))?;
        self.audit
            .log_status_change("consultation", id, caller.id, "scheduled", "in_progress")
            .await;
        self.view(started, participant).await
    }

    pub async fn end(
        &self,
        caller: &AuthUser,
        id: Uuid,
        req: EndConsultationRequest,
    ) -> AppResult<ConsultationView> {
        let (consultation, participant) = self.load_for(caller, id).await?;
        if consultation.status_enum() != ConsultationStatus::InProgress {
            return Err(AppError::Conflict(
                "Only a consultation in progress can be ended".into(),
            ));
        }

        let ended = self
            .video_repo
            .end(id, req.notes.as_deref())
            .await?
            .ok_or_else(|| AppError::Conflict("Consultation status changed concurrently".into()))?;
        self.audit
            .log_status_change("consultation", id, caller.id, "in_progress", "completed")
            .await;
        info!(
            "Consultation {} completed after {:?} minutes",
            id,
            ended.actual_duration_minutes()
        );
        self.view(ended, participant).await
    }

    /// Cancel a consultation that has not started
    pub async fn cancel(&self, caller: &AuthUser, id: Uuid) -> AppResult<ConsultationView> {
        self.close_scheduled(caller, id, ConsultationStatus::Cancelled)
            .await
    }

    /// Provider (or admin) records that the customer never joined
    pub async fn mark_missed(&self, caller: &AuthUser, id: Uuid) -> AppResult<ConsultationView> {
        self.close_scheduled(caller, id, ConsultationStatus::Missed)
            .await
    }

    async fn close_scheduled(
        &self,
        caller: &AuthUser,
        id: Uuid,
        to: ConsultationStatus,
    ) -> AppResult<ConsultationView> {
        let (consultation, participant) = self.load_for(caller, id).await?;

        if to == ConsultationStatus::Missed {
            if participant == Participant::Customer {
                return Err(AppError::Forbidden(
                    "Only the provider can mark a consultation as missed".into(),
                ));
            }
            if consultation.scheduled_at > Utc::now().naive_utc() {
                return Err(AppError::Validation(
                    "Consultation has not started yet".into(),
                ));
            }
        }
        if consultation.status_enum() != ConsultationStatus::Scheduled {
            return Err(AppError::Conflict(format!(
                "Only scheduled consultations can be {}",
                to.as_str()
            )));
        }

        let closed = self
            .video_repo
            .close_scheduled(id, to)
            .await?
            .ok_or_else(|| AppError::Conflict("Consultation status changed concurrently".into()))?;
        self.audit
            .log_status_change("consultation", id, caller.id, "scheduled", to.as_str())
            .await;
        self.view(closed, participant).await
    }

    pub async fn add_artifact(
        &self,
        caller: &AuthUser,
        id: Uuid,
        req: AddArtifactRequest,
    ) -> AppResult<ConsultationArtifact> {
        let kind = ArtifactKind::from_str(&req.kind).map_err(AppError::Validation)?;
        if req.name.trim().is_empty() {
            return Err(AppError::Validation("Artifact name is required".into()));
        }
        let url = req.url.trim();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(AppError::Validation("Artifact url must be http(s)".into()));
        }

        let (consultation, participant) = self.load_for(caller, id).await?;
        if participant == Participant::Admin {
            return Err(AppError::Forbidden(
                "Only participants can attach artifacts".into(),
            ));
        }

        let artifact = self
            .video_repo
            .add_artifact(consultation.id, kind.as_str(), req.name.trim(), url)
            .await?;
        info!("Artifact {} added to consultation {}", artifact.id, id);
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(at: DateTime<Utc>) -> ScheduleConsultationRequest {
        ScheduleConsultationRequest {
            provider_id: Uuid::new_v4(),
            topic: "Knee pain follow-up".into(),
            scheduled_at: at,
            duration_minutes: None,
        }
    }

    #[test]
    fn test_session_tokens_differ_per_participant() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let ta = session_token("room-1", a, "secret");
        assert_eq!(ta.len(), 64);
        assert_eq!(ta, session_token("room-1", a, "secret"));
        assert_ne!(ta, session_token("room-1", b, "secret"));
        assert_ne!(ta, session_token("room-2", a, "secret"));
        assert_ne!(ta, session_token("room-1", a, "other"));
    }

    #[test]
    fn test_schedule_defaults_and_bounds() {
        let now = Utc::now();
        let later = now + chrono::Duration::hours(2);
        assert_eq!(
            validate_schedule(&request(later), now.naive_utc()).unwrap(),
            DEFAULT_CONSULTATION_MINUTES
        );

        let mut too_short = request(later);
        too_short.duration_minutes = Some(5);
        assert!(validate_schedule(&too_short, now.naive_utc()).is_err());

        let mut too_long = request(later);
        too_long.duration_minutes = Some(121);
        assert!(validate_schedule(&too_long, now.naive_utc()).is_err());
    }

    #[test]
    fn test_past_schedule_rejected() {
        let now = Utc::now();
        let earlier = now - chrono::Duration::minutes(1);
        assert!(validate_schedule(&request(earlier), now.naive_utc()).is_err());
    }
}
