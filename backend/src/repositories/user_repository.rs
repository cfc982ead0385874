use crate::error::RepositoryError;
use crate::models::User;
use crate::repositories::provider_repository::{NewProvider, ProviderRepository};
use crate::repositories::wallet_repository::WalletRepository;
use crate::models::ServiceProvider;
use sqlx::PgPool;
use uuid::Uuid;

/// Fields required to create a user account
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub role: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Optional profile changes; `None` leaves the column untouched
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
}

/// Repository for user data access
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new UserRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a user together with its wallet and, for helpers, the provider
    /// profile. All rows are written in one transaction.
    pub async fn create_account(
        &self,
        user: &NewUser,
        provider: Option<&NewProvider>,
        signup_points: i64,
    ) -> Result<(User, Option<ServiceProvider>), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, phone, password_hash, role, address, city, latitude, longitude)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(&user.name)
        .bind(user.email.to_lowercase())
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(&user.address)
        .bind(&user.city)
        .bind(user.latitude)
        .bind(user.longitude)
        .fetch_one(&mut *tx)
        .await?;

        let profile = match provider {
            Some(p) => Some(ProviderRepository::insert(&mut *tx, created.id, p).await?),
            None => None,
        };

        WalletRepository::insert_wallet(&mut *tx, created.id, signup_points).await?;

        tx.commit().await?;

        Ok((created, profile))
    }

    /// Find a user by UUID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Whether the account is active; `None` when the user does not exist
    pub async fn is_active(&self, id: Uuid) -> Result<Option<bool>, RepositoryError> {
        let active = sqlx::query_scalar::<_, bool>("SELECT is_active FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(active)
    }

    /// Find a user by email (case-insensitive)
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Whether an account already uses this email
    pub async fn email_exists(&self, email: &str) -> Result<bool, RepositoryError> {
        Ok(self.find_by_email(email).await?.is_some())
    }

    /// Apply profile changes
    pub async fn update_profile(&self, id: Uuid, update: &UserUpdate) -> Result<User, RepositoryError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                phone = COALESCE($3, phone),
                address = COALESCE($4, address),
                city = COALESCE($5, city),
                updated_at = NOW() AT TIME ZONE 'utc'
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.phone)
        .bind(&update.address)
        .bind(&update.city)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::NotFound("User not found".to_string()))?;

        Ok(user)
    }

    /// Store the user's current coordinates
    pub async fn update_location(&self, id: Uuid, lat: f64, lon: f64) -> Result<User, RepositoryError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET latitude = $2, longitude = $3, updated_at = NOW() AT TIME ZONE 'utc'
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(lat)
        .bind(lon)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::NotFound("User not found".to_string()))?;

        Ok(user)
    }
}
