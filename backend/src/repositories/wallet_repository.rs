//! Repository for wallet balances and the transaction log

use crate::error::RepositoryError;
use crate::models::wallet::redemption_value;
use crate::models::{TransactionType, Wallet, WalletTier, WalletTransaction};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

/// One balance movement. Positive deltas credit, negative deltas debit.
#[derive(Debug, Clone)]
pub struct WalletChange {
    pub money_delta: Decimal,
    pub points_delta: i64,
    pub tx_type: TransactionType,
    pub reference_id: Option<Uuid>,
    pub description: Option<String>,
}

pub struct WalletRepository {
    pool: PgPool,
}

impl WalletRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a wallet on an existing connection, recording the signup bonus
    pub async fn insert_wallet(
        conn: &mut PgConnection,
        user_id: Uuid,
        bonus_points: i64,
    ) -> Result<Wallet, RepositoryError> {
        let wallet = sqlx::query_as::<_, Wallet>(
            r#"
            INSERT INTO wallets (user_id, money_balance, points_balance, lifetime_points, tier)
            VALUES ($1, 0, $2, $2, $3)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(bonus_points)
        .bind(WalletTier::from_points(bonus_points).as_str())
        .fetch_one(&mut *conn)
        .await?;

        if bonus_points > 0 {
            sqlx::query(
                r#"
                INSERT INTO wallet_transactions
                (wallet_id, transaction_type, amount, points, balance_before, balance_after,
                 points_before, points_after, description)
                VALUES ($1, $2, 0, $3, 0, 0, 0, $3, 'Signup bonus')
                "#,
            )
            .bind(wallet.id)
            .bind(TransactionType::PointsEarned.as_str())
            .bind(bonus_points)
            .execute(&mut *conn)
            .await?;
        }

        Ok(wallet)
    }

    // =========================================================================
    // Wallet Operations
    // =========================================================================

    /// Get a user's wallet
    pub async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Wallet>, RepositoryError> {
        let wallet = sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(wallet)
    }

    /// Get or create a user's wallet
    pub async fn get_or_create(&self, user_id: Uuid) -> Result<Wallet, RepositoryError> {
        if let Some(wallet) = self.find_by_user(user_id).await? {
            return Ok(wallet);
        }

        let wallet = sqlx::query_as::<_, Wallet>(
            r#"
            INSERT INTO wallets (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET updated_at = wallets.updated_at
            RETURNING *
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(wallet)
    }

    /// Apply a balance change and log it, all under a row lock.
    ///
    /// Rejects changes that would drive either balance negative. Earned points
    /// also raise `lifetime_points`, from which the tier is recomputed.
    pub async fn apply(&self, user_id: Uuid, change: &WalletChange) -> Result<Wallet, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Make sure the wallet row exists before locking it
        sqlx::query("INSERT INTO wallets (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let current = sqlx::query_as::<_, Wallet>(
            "SELECT * FROM wallets WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let balance_after = current.money_balance + change.money_delta;
        if balance_after < Decimal::ZERO {
            return Err(RepositoryError::BusinessRule(format!(
                "Insufficient balance: available {}, required {}",
                current.money_balance,
                -change.money_delta
            )));
        }

        let points_after = current.points_balance + change.points_delta;
        if points_after < 0 {
            return Err(RepositoryError::BusinessRule(format!(
                "Insufficient points: available {}, required {}",
                current.points_balance, -change.points_delta
            )));
        }

        let lifetime_after = current.lifetime_points + change.points_delta.max(0);
        let tier = WalletTier::from_points(lifetime_after);

        let updated = sqlx::query_as::<_, Wallet>(
            r#"
            UPDATE wallets
            SET money_balance = $2, points_balance = $3, lifetime_points = $4, tier = $5,
                updated_at = NOW() AT TIME ZONE 'utc'
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(current.id)
        .bind(balance_after)
        .bind(points_after)
        .bind(lifetime_after)
        .bind(tier.as_str())
        .fetch_one(&mut *tx)
        .await?;

        // Record transaction
        sqlx::query(
            r#"
            INSERT INTO wallet_transactions
            (wallet_id, transaction_type, amount, points, balance_before, balance_after,
             points_before, points_after, reference_id, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(current.id)
        .bind(change.tx_type.as_str())
        .bind(change.money_delta.abs())
        .bind(change.points_delta.abs())
        .bind(current.money_balance)
        .bind(balance_after)
        .bind(current.points_balance)
        .bind(points_after)
        .bind(change.reference_id)
        .bind(&change.description)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(updated)
    }

    /// Convert points into money. Validation runs against the locked balance
    /// so concurrent redemptions cannot overdraw.
    pub async fn redeem_points(&self, user_id: Uuid, points: i64) -> Result<(Wallet, Decimal), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, Wallet>(
            "SELECT * FROM wallets WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| RepositoryError::NotFound("Wallet not found".to_string()))?;

        let value = redemption_value(points, current.points_balance)
            .map_err(RepositoryError::InvalidInput)?;

        let balance_after = current.money_balance + value;
        let points_after = current.points_balance - points;

        let updated = sqlx::query_as::<_, Wallet>(
            r#"
            UPDATE wallets
            SET money_balance = $2, points_balance = $3, updated_at = NOW() AT TIME ZONE 'utc'
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(current.id)
        .bind(balance_after)
        .bind(points_after)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO wallet_transactions
            (wallet_id, transaction_type, amount, points, balance_before, balance_after,
             points_before, points_after, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(current.id)
        .bind(TransactionType::PointsRedeemed.as_str())
        .bind(value)
        .bind(points)
        .bind(current.money_balance)
        .bind(balance_after)
        .bind(current.points_balance)
        .bind(points_after)
        .bind(format!("Redeemed {} points", points))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((updated, value))
    }

    // =========================================================================
    // Transaction History
    // =========================================================================

    /// Get transaction history for a wallet, newest first
    pub async fn transactions(
        &self,
        wallet_id: Uuid,
        limit: i64,
    ) -> Result<Vec<WalletTransaction>, RepositoryError> {
        let transactions = sqlx::query_as::<_, WalletTransaction>(
            r#"
            SELECT * FROM wallet_transactions
            WHERE wallet_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(wallet_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(transactions)
    }
}
