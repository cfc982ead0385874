use crate::models::{CommunityHelpRequest, CommunityVolunteer, HelpRequestStatus};
use sqlx::{PgPool, Result as SqlxResult};
use uuid::Uuid;

/// Fields for registering as a volunteer
#[derive(Debug, Clone)]
pub struct NewVolunteer {
    pub user_id: Uuid,
    pub skills: Vec<String>,
    pub bio: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
}

/// Partial volunteer update; `None` keeps the current value
#[derive(Debug, Clone, Default)]
pub struct VolunteerUpdate {
    pub skills: Option<Vec<String>>,
    pub bio: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius_km: Option<f64>,
    pub is_available: Option<bool>,
}

/// Fields for posting a help request
#[derive(Debug, Clone)]
pub struct NewHelpRequest {
    pub requester_id: Uuid,
    pub title: String,
    pub description: String,
    pub skill_needed: String,
    pub urgency: String,
    pub address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

/// Repository for volunteers and community help requests
pub struct CommunityRepository {
    pool: PgPool,
}

impl CommunityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Volunteers
    // =========================================================================

    pub async fn create_volunteer(&self, v: &NewVolunteer) -> SqlxResult<CommunityVolunteer> {
        sqlx::query_as::<_, CommunityVolunteer>(
            r#"
            INSERT INTO community_volunteers (user_id, skills, bio, latitude, longitude, radius_km)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(v.user_id)
        .bind(&v.skills)
        .bind(&v.bio)
        .bind(v.latitude)
        .bind(v.longitude)
        .bind(v.radius_km)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn find_volunteer(&self, id: Uuid) -> SqlxResult<Option<CommunityVolunteer>> {
        sqlx::query_as::<_, CommunityVolunteer>("SELECT * FROM community_volunteers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn find_volunteer_by_user(
        &self,
        user_id: Uuid,
    ) -> SqlxResult<Option<CommunityVolunteer>> {
        sqlx::query_as::<_, CommunityVolunteer>(
            "SELECT * FROM community_volunteers WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn update_volunteer(
        &self,
        id: Uuid,
        update: &VolunteerUpdate,
    ) -> SqlxResult<Option<CommunityVolunteer>> {
        sqlx::query_as::<_, CommunityVolunteer>(
            r#"
            UPDATE community_volunteers
            SET skills = COALESCE($2, skills),
                bio = COALESCE($3, bio),
                latitude = COALESCE($4, latitude),
                longitude = COALESCE($5, longitude),
                radius_km = COALESCE($6, radius_km),
                is_available = COALESCE($7, is_available),
                updated_at = NOW() AT TIME ZONE 'utc'
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.skills)
        .bind(&update.bio)
        .bind(update.latitude)
        .bind(update.longitude)
        .bind(update.radius_km)
        .bind(update.is_available)
        .fetch_optional(&self.pool)
        .await
    }

    /// Available volunteers inside a bounding box who list `skill` (case-insensitive)
    pub async fn volunteers_in_area(
        &self,
        skill: &str,
        min_lat: f64,
        max_lat: f64,
        min_lon: f64,
        max_lon: f64,
    ) -> SqlxResult<Vec<CommunityVolunteer>> {
        sqlx::query_as::<_, CommunityVolunteer>(
            r#"
            SELECT * FROM community_volunteers
            WHERE is_available = TRUE
              AND latitude BETWEEN $2 AND $3
              AND longitude BETWEEN $4 AND $5
              AND EXISTS (SELECT 1 FROM unnest(skills) AS s WHERE LOWER(s) = LOWER($1))
            "#,
        )
        .bind(skill.trim())
        .bind(min_lat)
        .bind(max_lat)
        .bind(min_lon)
        .bind(max_lon)
        .fetch_all(&self.pool)
        .await
    }

    // =========================================================================
    // Help Requests
    // =========================================================================

    pub async fn create_request(&self, r: &NewHelpRequest) -> SqlxResult<CommunityHelpRequest> {
        sqlx::query_as::<_, CommunityHelpRequest>(
            r#"
            INSERT INTO community_help_requests
            (requester_id, title, description, skill_needed, urgency, address, latitude, longitude)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(r.requester_id)
        .bind(&r.title)
        .bind(&r.description)
        .bind(&r.skill_needed)
        .bind(&r.urgency)
        .bind(&r.address)
        .bind(r.latitude)
        .bind(r.longitude)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn find_request(&self, id: Uuid) -> SqlxResult<Option<CommunityHelpRequest>> {
        sqlx::query_as::<_, CommunityHelpRequest>(
            "SELECT * FROM community_help_requests WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Open requests inside a bounding box, newest first
    pub async fn open_requests_in_area(
        &self,
        min_lat: f64,
        max_lat: f64,
        min_lon: f64,
        max_lon: f64,
    ) -> SqlxResult<Vec<CommunityHelpRequest>> {
        sqlx::query_as::<_, CommunityHelpRequest>(
            r#"
            SELECT * FROM community_help_requests
            WHERE status = 'open'
              AND latitude BETWEEN $1 AND $2
              AND longitude BETWEEN $3 AND $4
            ORDER BY created_at DESC
            "#,
        )
        .bind(min_lat)
        .bind(max_lat)
        .bind(min_lon)
        .bind(max_lon)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn requests_by_requester(
        &self,
        requester_id: Uuid,
    ) -> SqlxResult<Vec<CommunityHelpRequest>> {
        sqlx::query_as::<_, CommunityHelpRequest>(
            "SELECT * FROM community_help_requests WHERE requester_id = $1 ORDER BY created_at DESC",
        )
        .bind(requester_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn requests_by_volunteer(
        &self,
        volunteer_id: Uuid,
    ) -> SqlxResult<Vec<CommunityHelpRequest>> {
        sqlx::query_as::<_, CommunityHelpRequest>(
            "SELECT * FROM community_help_requests WHERE volunteer_id = $1 ORDER BY created_at DESC",
        )
        .bind(volunteer_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Claim an open request. Returns `None` if someone else got there first.
    pub async fn accept(
        &self,
        id: Uuid,
        volunteer_id: Uuid,
    ) -> SqlxResult<Option<CommunityHelpRequest>> {
        sqlx::query_as::<_, CommunityHelpRequest>(
            r#"
            UPDATE community_help_requests
            SET volunteer_id = $2, status = 'accepted', updated_at = NOW() AT TIME ZONE 'utc'
            WHERE id = $1 AND volunteer_id IS NULL AND status = 'open'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(volunteer_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Conditional status change; completion is handled by [`Self::complete`]
    pub async fn transition(
        &self,
        id: Uuid,
        from: HelpRequestStatus,
        to: HelpRequestStatus,
    ) -> SqlxResult<Option<CommunityHelpRequest>> {
        sqlx::query_as::<_, CommunityHelpRequest>(
            r#"
            UPDATE community_help_requests
            SET status = $3, updated_at = NOW() AT TIME ZONE 'utc'
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await
    }

    /// Mark a request completed and credit the volunteer's completed count
    pub async fn complete(
        &self,
        id: Uuid,
        from: HelpRequestStatus,
    ) -> SqlxResult<Option<CommunityHelpRequest>> {
        let mut tx = self.pool.begin().await?;

        let request = sqlx::query_as::<_, CommunityHelpRequest>(
            r#"
            UPDATE community_help_requests
            SET status = 'completed', completed_at = NOW() AT TIME ZONE 'utc',
                updated_at = NOW() AT TIME ZONE 'utc'
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(volunteer_id) = request.as_ref().and_then(|r| r.volunteer_id) {
            sqlx::query(
                r#"
                UPDATE community_volunteers
                SET helps_completed = helps_completed + 1, updated_at = NOW() AT TIME ZONE 'utc'
                WHERE id = $1
                "#,
            )
            .bind(volunteer_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(request)
    }
}
