use crate::models::{Booking, BookingStatus};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgPool, Result as SqlxResult};
use uuid::Uuid;

/// Fields required to create a booking
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: Uuid,
    pub provider_id: Uuid,
    pub service_type: String,
    pub description: Option<String>,
    pub address: String,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: String,
    pub duration_hours: i32,
    pub price_per_hour: Decimal,
    pub total_amount: Decimal,
}

/// Repository for bookings
pub struct BookingRepository {
    pool: PgPool,
}

impl BookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new pending booking
    pub async fn create(&self, b: &NewBooking) -> SqlxResult<Booking> {
        sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings
            (user_id, provider_id, service_type, description, address, scheduled_date,
             scheduled_time, duration_hours, price_per_hour, total_amount)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(b.user_id)
        .bind(b.provider_id)
        .bind(&b.service_type)
        .bind(&b.description)
        .bind(&b.address)
        .bind(b.scheduled_date)
        .bind(&b.scheduled_time)
        .bind(b.duration_hours)
        .bind(b.price_per_hour)
        .bind(b.total_amount)
        .fetch_one(&self.pool)
        .await
    }

    /// Find a booking by UUID
    pub async fn find_by_id(&self, id: Uuid) -> SqlxResult<Option<Booking>> {
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Bookings made by a user, newest first
    pub async fn find_by_user(&self, user_id: Uuid, status: Option<&str>) -> SqlxResult<Vec<Booking>> {
        sqlx::query_as::<_, Booking>(
            r#"
            SELECT * FROM bookings
            WHERE user_id = $1 AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await
    }

    /// Bookings assigned to a provider, soonest first
    pub async fn find_by_provider(
        &self,
        provider_id: Uuid,
        status: Option<&str>,
    ) -> SqlxResult<Vec<Booking>> {
        sqlx::query_as::<_, Booking>(
            r#"
            SELECT * FROM bookings
            WHERE provider_id = $1 AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY scheduled_date ASC, scheduled_time ASC
            "#,
        )
        .bind(provider_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await
    }

    /// Move a booking from `from` to `to`. Returns `None` when the booking is
    /// no longer in `from`, so concurrent updates cannot both apply.
    pub async fn transition(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
        reason: Option<&str>,
    ) -> SqlxResult<Option<Booking>> {
        sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET status = $3,
                cancellation_reason = COALESCE($4, cancellation_reason),
                updated_at = NOW() AT TIME ZONE 'utc'
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(reason)
        .fetch_optional(&self.pool)
        .await
    }

    /// Mark an in-progress booking completed and bump the provider's job count
    pub async fn complete(&self, id: Uuid) -> SqlxResult<Option<Booking>> {
        let mut tx = self.pool.begin().await?;

        let booking = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET status = 'completed',
                completed_at = NOW() AT TIME ZONE 'utc',
                updated_at = NOW() AT TIME ZONE 'utc'
            WHERE id = $1 AND status = 'in_progress'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(b) = &booking {
            sqlx::query(
                r#"
                UPDATE service_providers
                SET completed_jobs = completed_jobs + 1, updated_at = NOW() AT TIME ZONE 'utc'
                WHERE id = $1
                "#,
            )
            .bind(b.provider_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(booking)
    }

    /// Store a rating once and fold it into the provider's average.
    /// Returns `None` if the booking is not completed or already rated.
    pub async fn rate(&self, id: Uuid, rating: i32, review: Option<&str>) -> SqlxResult<Option<Booking>> {
        let mut tx = self.pool.begin().await?;

        let booking = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET rating = $2, review = $3, updated_at = NOW() AT TIME ZONE 'utc'
            WHERE id = $1 AND status = 'completed' AND rating IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(rating)
        .bind(review)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(b) = &booking {
            sqlx::query(
                r#"
                UPDATE service_providers
                SET rating_average = ROUND(
                        ((rating_average * rating_count + $2) / (rating_count + 1))::NUMERIC, 2
                    )::DOUBLE PRECISION,
                    rating_count = rating_count + 1,
                    updated_at = NOW() AT TIME ZONE 'utc'
                WHERE id = $1
                "#,
            )
            .bind(b.provider_id)
            .bind(rating as f64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(booking)
    }
}
