use crate::models::{ConsultationArtifact, ConsultationStatus, VideoConsultation};
use chrono::NaiveDateTime;
use sqlx::{PgPool, Result as SqlxResult};
use uuid::Uuid;

/// Fields for scheduling a consultation
#[derive(Debug, Clone)]
pub struct NewConsultation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider_id: Uuid,
    pub topic: String,
    pub room_id: String,
    pub user_token: String,
    pub provider_token: String,
    pub scheduled_at: NaiveDateTime,
    pub duration_minutes: i32,
}

pub struct VideoRepository {
    pool: PgPool,
}

impl VideoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, c: &NewConsultation) -> SqlxResult<VideoConsultation> {
        sqlx::query_as::<_, VideoConsultation>(
            r#"
            INSERT INTO video_consultations
            (id, user_id, provider_id, topic, status, room_id, user_token, provider_token,
             scheduled_at, duration_minutes)
            VALUES ($1, $2, $3, $4, 'scheduled', $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(c.id)
        .bind(c.user_id)
        .bind(c.provider_id)
        .bind(&c.topic)
        .bind(&c.room_id)
        .bind(&c.user_token)
        .bind(&c.provider_token)
        .bind(c.scheduled_at)
        .bind(c.duration_minutes)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn find_by_id(&self, id: Uuid) -> SqlxResult<Option<VideoConsultation>> {
        sqlx::query_as::<_, VideoConsultation>("SELECT * FROM video_consultations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Consultations where the user is the patient/customer or, via `provider_id`, the provider
    pub async fn find_for_participant(
        &self,
        user_id: Uuid,
        provider_id: Option<Uuid>,
    ) -> SqlxResult<Vec<VideoConsultation>> {
        sqlx::query_as::<_, VideoConsultation>(
            r#"
            SELECT * FROM video_consultations
            WHERE user_id = $1 OR ($2::uuid IS NOT NULL AND provider_id = $2)
            ORDER BY scheduled_at DESC
            "#,
        )
        .bind(user_id)
        .bind(provider_id)
        .fetch_all(&self.pool)
        .await
    }

    /// `scheduled` -> `in_progress`
    pub async fn start(&self, id: Uuid) -> SqlxResult<Option<VideoConsultation>> {
        sqlx::query_as::<_, VideoConsultation>(
            r#"
            UPDATE video_consultations
            SET status = 'in_progress', actual_start = NOW() AT TIME ZONE 'utc',
                updated_at = NOW() AT TIME ZONE 'utc'
            WHERE id = $1 AND status = 'scheduled'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// `in_progress` -> `completed`
    pub async fn end(&self, id: Uuid, notes: Option<&str>) -> SqlxResult<Option<VideoConsultation>> {
        sqlx::query_as::<_, VideoConsultation>(
            r#"
            UPDATE video_consultations
            SET status = 'completed', actual_end = NOW() AT TIME ZONE 'utc',
                notes = COALESCE($2, notes), updated_at = NOW() AT TIME ZONE 'utc'
            WHERE id = $1 AND status = 'in_progress'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(notes)
        .fetch_optional(&self.pool)
        .await
    }

    /// Move a still-scheduled consultation to `cancelled` or `missed`
    pub async fn close_scheduled(
        &self,
        id: Uuid,
        to: ConsultationStatus,
    ) -> SqlxResult<Option<VideoConsultation>> {
        sqlx::query_as::<_, VideoConsultation>(
            r#"
            UPDATE video_consultations
            SET status = $2, updated_at = NOW() AT TIME ZONE 'utc'
            WHERE id = $1 AND status = 'scheduled'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn add_artifact(
        &self,
        consultation_id: Uuid,
        kind: &str,
        name: &str,
        url: &str,
    ) -> SqlxResult<ConsultationArtifact> {
        sqlx::query_as::<_, ConsultationArtifact>(
            r#"
            INSERT INTO consultation_artifacts (consultation_id, kind, name, url)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(consultation_id)
        .bind(kind)
        .bind(name)
        .bind(url)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn artifacts(&self, consultation_id: Uuid) -> SqlxResult<Vec<ConsultationArtifact>> {
        sqlx::query_as::<_, ConsultationArtifact>(
            "SELECT * FROM consultation_artifacts WHERE consultation_id = $1 ORDER BY created_at ASC",
        )
        .bind(consultation_id)
        .fetch_all(&self.pool)
        .await
    }
}
