use crate::models::{EmergencyService, EmergencyStatus, EmergencyTrackingEntry};
use sqlx::{PgConnection, PgPool, Result as SqlxResult};
use uuid::Uuid;

/// Fields required to raise an emergency
#[derive(Debug, Clone)]
pub struct NewEmergency {
    pub user_id: Uuid,
    pub emergency_type: String,
    pub description: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub priority: String,
}

/// Tracking log entry to append alongside a status change
#[derive(Debug, Clone, Default)]
pub struct TrackingNote {
    pub note: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Repository for emergencies and their tracking log
pub struct EmergencyRepository {
    pool: PgPool,
}

impl EmergencyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn append_tracking(
        conn: &mut PgConnection,
        emergency_id: Uuid,
        status: &str,
        note: &TrackingNote,
    ) -> SqlxResult<EmergencyTrackingEntry> {
        sqlx::query_as::<_, EmergencyTrackingEntry>(
            r#"
            INSERT INTO emergency_tracking (emergency_id, status, note, latitude, longitude)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(emergency_id)
        .bind(status)
        .bind(&note.note)
        .bind(note.latitude)
        .bind(note.longitude)
        .fetch_one(conn)
        .await
    }

    /// Insert a `requested` emergency with its first tracking entry
    pub async fn create(&self, e: &NewEmergency) -> SqlxResult<EmergencyService> {
        let mut tx = self.pool.begin().await?;

        let emergency = sqlx::query_as::<_, EmergencyService>(
            r#"
            INSERT INTO emergency_services
            (user_id, emergency_type, description, address, latitude, longitude, priority, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'requested')
            RETURNING *
            "#,
        )
        .bind(e.user_id)
        .bind(&e.emergency_type)
        .bind(&e.description)
        .bind(&e.address)
        .bind(e.latitude)
        .bind(e.longitude)
        .bind(&e.priority)
        .fetch_one(&mut *tx)
        .await?;

        let note = TrackingNote {
            note: Some("Emergency request received".to_string()),
            latitude: Some(e.latitude),
            longitude: Some(e.longitude),
        };
        Self::append_tracking(&mut *tx, emergency.id, EmergencyStatus::Requested.as_str(), &note)
            .await?;

        tx.commit().await?;
        Ok(emergency)
    }

    pub async fn find_by_id(&self, id: Uuid) -> SqlxResult<Option<EmergencyService>> {
        sqlx::query_as::<_, EmergencyService>("SELECT * FROM emergency_services WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Tracking log in chronological order
    pub async fn tracking(&self, emergency_id: Uuid) -> SqlxResult<Vec<EmergencyTrackingEntry>> {
        sqlx::query_as::<_, EmergencyTrackingEntry>(
            "SELECT * FROM emergency_tracking WHERE emergency_id = $1 ORDER BY created_at ASC",
        )
        .bind(emergency_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn find_by_user(&self, user_id: Uuid) -> SqlxResult<Vec<EmergencyService>> {
        sqlx::query_as::<_, EmergencyService>(
            "SELECT * FROM emergency_services WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn find_by_provider(&self, provider_id: Uuid) -> SqlxResult<Vec<EmergencyService>> {
        sqlx::query_as::<_, EmergencyService>(
            "SELECT * FROM emergency_services WHERE provider_id = $1 ORDER BY created_at DESC",
        )
        .bind(provider_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Emergencies that are neither resolved nor cancelled
    pub async fn find_active(&self) -> SqlxResult<Vec<EmergencyService>> {
        sqlx::query_as::<_, EmergencyService>(
            r#"
            SELECT * FROM emergency_services
            WHERE status NOT IN ('resolved', 'cancelled')
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }

    /// Assign a provider if nobody has been assigned yet. Returns `None` when
    /// another dispatch already won or the emergency is no longer requested.
    pub async fn assign_provider(
        &self,
        id: Uuid,
        provider_id: Uuid,
        eta_minutes: i32,
        note: &TrackingNote,
    ) -> SqlxResult<Option<EmergencyService>> {
        let mut tx = self.pool.begin().await?;

        let emergency = sqlx::query_as::<_, EmergencyService>(
            r#"
            UPDATE emergency_services
            SET provider_id = $2, status = 'assigned', estimated_arrival_minutes = $3,
                updated_at = NOW() AT TIME ZONE 'utc'
            WHERE id = $1 AND provider_id IS NULL AND status = 'requested'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(provider_id)
        .bind(eta_minutes)
        .fetch_optional(&mut *tx)
        .await?;

        if emergency.is_some() {
            Self::append_tracking(&mut *tx, id, EmergencyStatus::Assigned.as_str(), note).await?;
        }

        tx.commit().await?;
        Ok(emergency)
    }

    /// Conditional status change plus tracking entry
    pub async fn transition(
        &self,
        id: Uuid,
        from: EmergencyStatus,
        to: EmergencyStatus,
        note: &TrackingNote,
    ) -> SqlxResult<Option<EmergencyService>> {
        let mut tx = self.pool.begin().await?;

        let emergency = sqlx::query_as::<_, EmergencyService>(
            r#"
            UPDATE emergency_services
            SET status = $3,
                resolved_at = CASE WHEN $3 = 'resolved' THEN NOW() AT TIME ZONE 'utc' ELSE resolved_at END,
                updated_at = NOW() AT TIME ZONE 'utc'
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        if emergency.is_some() {
            Self::append_tracking(&mut *tx, id, to.as_str(), note).await?;
        }

        tx.commit().await?;
        Ok(emergency)
    }

    /// Log a note without changing status (e.g. "no providers found")
    pub async fn add_note(&self, id: Uuid, status: EmergencyStatus, note: &str) -> SqlxResult<()> {
        let mut conn = self.pool.acquire().await?;
        let note = TrackingNote {
            note: Some(note.to_string()),
            ..TrackingNote::default()
        };
        Self::append_tracking(&mut conn, id, status.as_str(), &note).await?;
        Ok(())
    }
}
