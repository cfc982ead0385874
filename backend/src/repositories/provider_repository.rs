use crate::error::RepositoryError;
use crate::models::ServiceProvider;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

/// Fields required to create a provider profile
#[derive(Debug, Clone)]
pub struct NewProvider {
    pub business_name: String,
    pub service_type: String,
    pub description: Option<String>,
    pub experience_years: i32,
    pub price_per_hour: Decimal,
    pub city: String,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub service_radius_km: f64,
    pub is_emergency_provider: bool,
}

/// Optional profile changes; `None` leaves the column untouched
#[derive(Debug, Clone, Default)]
pub struct ProviderUpdate {
    pub business_name: Option<String>,
    pub description: Option<String>,
    pub experience_years: Option<i32>,
    pub price_per_hour: Option<Decimal>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub service_radius_km: Option<f64>,
    pub is_emergency_provider: Option<bool>,
}

/// Listing filters
#[derive(Debug, Clone, Default)]
pub struct ProviderFilter {
    pub service_type: Option<String>,
    pub city: Option<String>,
    pub min_rating: Option<f64>,
    pub max_price: Option<Decimal>,
    pub available_only: bool,
    pub limit: i64,
    pub offset: i64,
}

/// Geographic candidate query: a bounding box plus flags
#[derive(Debug, Clone, Default)]
pub struct ProviderAreaQuery {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
    pub service_types: Vec<String>,
    pub emergency_only: bool,
    pub verified_only: bool,
}

/// Repository for service provider profiles
pub struct ProviderRepository {
    pool: PgPool,
}

impl ProviderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a provider profile on an existing connection (used inside
    /// the account-creation transaction)
    pub async fn insert(
        conn: &mut PgConnection,
        user_id: Uuid,
        p: &NewProvider,
    ) -> Result<ServiceProvider, RepositoryError> {
        let provider = sqlx::query_as::<_, ServiceProvider>(
            r#"
            INSERT INTO service_providers
            (user_id, business_name, service_type, description, experience_years, price_per_hour,
             city, address, latitude, longitude, service_radius_km, is_emergency_provider)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&p.business_name)
        .bind(&p.service_type)
        .bind(&p.description)
        .bind(p.experience_years)
        .bind(p.price_per_hour)
        .bind(&p.city)
        .bind(&p.address)
        .bind(p.latitude)
        .bind(p.longitude)
        .bind(p.service_radius_km)
        .bind(p.is_emergency_provider)
        .fetch_one(conn)
        .await?;

        Ok(provider)
    }

    /// Find a provider by UUID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<ServiceProvider>, RepositoryError> {
        let provider =
            sqlx::query_as::<_, ServiceProvider>("SELECT * FROM service_providers WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(provider)
    }

    /// Find the provider profile owned by a user
    pub async fn find_by_user(&self, user_id: Uuid) -> Result<Option<ServiceProvider>, RepositoryError> {
        let provider = sqlx::query_as::<_, ServiceProvider>(
            "SELECT * FROM service_providers WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(provider)
    }

    /// List providers matching the filter, best rated first
    pub async fn list(&self, filter: &ProviderFilter) -> Result<Vec<ServiceProvider>, RepositoryError> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT * FROM service_providers WHERE 1 = 1");

        if let Some(service_type) = &filter.service_type {
            qb.push(" AND service_type = ").push_bind(service_type.clone());
        }
        if let Some(city) = &filter.city {
            qb.push(" AND LOWER(city) = LOWER(").push_bind(city.clone()).push(")");
        }
        if let Some(min_rating) = filter.min_rating {
            qb.push(" AND rating_average >= ").push_bind(min_rating);
        }
        if let Some(max_price) = filter.max_price {
            qb.push(" AND price_per_hour <= ").push_bind(max_price);
        }
        if filter.available_only {
            qb.push(" AND is_available = TRUE");
        }

        qb.push(" ORDER BY rating_average DESC, completed_jobs DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        let providers = qb
            .build_query_as::<ServiceProvider>()
            .fetch_all(&self.pool)
            .await?;

        Ok(providers)
    }

    /// Available providers inside a bounding box. Exact distance filtering
    /// and ordering happen in the caller.
    pub async fn find_in_area(
        &self,
        area: &ProviderAreaQuery,
    ) -> Result<Vec<ServiceProvider>, RepositoryError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT * FROM service_providers WHERE is_available = TRUE \
             AND latitude IS NOT NULL AND longitude IS NOT NULL",
        );

        qb.push(" AND latitude BETWEEN ")
            .push_bind(area.min_lat)
            .push(" AND ")
            .push_bind(area.max_lat);
        qb.push(" AND longitude BETWEEN ")
            .push_bind(area.min_lon)
            .push(" AND ")
            .push_bind(area.max_lon);

        if !area.service_types.is_empty() {
            qb.push(" AND service_type = ANY(")
                .push_bind(area.service_types.clone())
                .push(")");
        }
        if area.emergency_only {
            qb.push(" AND is_emergency_provider = TRUE");
        }
        if area.verified_only {
            qb.push(" AND is_verified = TRUE");
        }

        let providers = qb
            .build_query_as::<ServiceProvider>()
            .fetch_all(&self.pool)
            .await?;

        Ok(providers)
    }

    /// Apply profile changes
    pub async fn update(
        &self,
        id: Uuid,
        u: &ProviderUpdate,
    ) -> Result<ServiceProvider, RepositoryError> {
        let provider = sqlx::query_as::<_, ServiceProvider>(
            r#"
            UPDATE service_providers
            SET business_name = COALESCE($2, business_name),
                description = COALESCE($3, description),
                experience_years = COALESCE($4, experience_years),
                price_per_hour = COALESCE($5, price_per_hour),
                city = COALESCE($6, city),
                address = COALESCE($7, address),
                latitude = COALESCE($8, latitude),
                longitude = COALESCE($9, longitude),
                service_radius_km = COALESCE($10, service_radius_km),
                is_emergency_provider = COALESCE($11, is_emergency_provider),
                updated_at = NOW() AT TIME ZONE 'utc'
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&u.business_name)
        .bind(&u.description)
        .bind(u.experience_years)
        .bind(u.price_per_hour)
        .bind(&u.city)
        .bind(&u.address)
        .bind(u.latitude)
        .bind(u.longitude)
        .bind(u.service_radius_km)
        .bind(u.is_emergency_provider)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::NotFound("Provider not found".to_string()))?;

        Ok(provider)
    }

    pub async fn set_availability(
        &self,
        id: Uuid,
        available: bool,
    ) -> Result<ServiceProvider, RepositoryError> {
        self.set_flag(id, "is_available", available).await
    }

    pub async fn set_verified(&self, id: Uuid, verified: bool) -> Result<ServiceProvider, RepositoryError> {
        self.set_flag(id, "is_verified", verified).await
    }

    async fn set_flag(
        &self,
        id: Uuid,
        column: &'static str,
        value: bool,
    ) -> Result<ServiceProvider, RepositoryError> {
        let sql = format!(
            "UPDATE service_providers SET {} = $2, updated_at = NOW() AT TIME ZONE 'utc' \
             WHERE id = $1 RETURNING *",
            column
        );
        let provider = sqlx::query_as::<_, ServiceProvider>(&sql)
            .bind(id)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::NotFound("Provider not found".to_string()))?;

        Ok(provider)
    }
}
