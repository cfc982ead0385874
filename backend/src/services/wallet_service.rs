use crate::auth::AccountGuard;
use crate::error::{AppError, AppResult};
use crate::models::wallet::{MAX_TOP_UP, MIN_REDEEM_POINTS};
use crate::models::{TransactionType, Wallet, WalletTier, WalletTransaction};
use crate::repositories::{WalletChange, WalletRepository};
use crate::services::AuditTrailService;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct AddMoneyRequest {
    pub amount: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayRequest {
    pub amount: Decimal,
    pub reference_id: Option<Uuid>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedeemRequest {
    pub points: i64,
}

/// Wallet with derived tier progress
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSummary {
    #[serde(flatten)]
    pub wallet: Wallet,
    pub next_tier_at: Option<i64>,
    pub min_redeem_points: i64,
}

impl From<Wallet> for WalletSummary {
    fn from(wallet: Wallet) -> Self {
        Self {
            next_tier_at: wallet.tier_enum().next_threshold(),
            min_redeem_points: MIN_REDEEM_POINTS,
            wallet,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemResult {
    pub wallet: WalletSummary,
    pub points_redeemed: i64,
    pub amount_credited: Decimal,
}

/// Top-up amount must be positive and at most [`MAX_TOP_UP`]
pub fn validate_top_up(amount: Decimal) -> AppResult<()> {
    if amount <= Decimal::ZERO {
        return Err(AppError::Validation("Amount must be greater than 0".into()));
    }
    if amount > Decimal::from(MAX_TOP_UP) {
        return Err(AppError::Validation(format!(
            "Amount cannot exceed {}",
            MAX_TOP_UP
        )));
    }
    if amount.scale() > 2 {
        return Err(AppError::Validation(
            "Amount cannot have more than 2 decimal places".into(),
        ));
    }
    Ok(())
}

/// Money balance and reward points
pub struct WalletService {
    wallet_repo: Arc<WalletRepository>,
    accounts: AccountGuard,
    audit: Arc<AuditTrailService>,
}

impl WalletService {
    pub fn new(
        wallet_repo: Arc<WalletRepository>,
        accounts: AccountGuard,
        audit: Arc<AuditTrailService>,
    ) -> Self {
        Self {
            wallet_repo,
            accounts,
            audit,
        }
    }

    pub async fn get_wallet(&self, user_id: Uuid) -> AppResult<WalletSummary> {
        Ok(self.wallet_repo.get_or_create(user_id).await?.into())
    }

    pub async fn transactions(
        &self,
        user_id: Uuid,
        limit: Option<i64>,
    ) -> AppResult<Vec<WalletTransaction>> {
        let wallet = self.wallet_repo.get_or_create(user_id).await?;
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, 200);
        Ok(self.wallet_repo.transactions(wallet.id, limit).await?)
    }

    async fn apply(&self, user_id: Uuid, change: WalletChange) -> AppResult<Wallet> {
        let wallet = self.wallet_repo.apply(user_id, &change).await?;
        self.audit.log_wallet_change(user_id, &wallet, &change).await;
        Ok(wallet)
    }

    pub async fn add_money(&self, user_id: Uuid, amount: Decimal) -> AppResult<WalletSummary> {
        validate_top_up(amount)?;
        self.accounts.ensure_active(user_id).await?;

        let wallet = self
            .apply(
                user_id,
                WalletChange {
                    money_delta: amount,
                    points_delta: 0,
                    tx_type: TransactionType::Credit,
                    reference_id: None,
                    description: Some("Wallet top-up".into()),
                },
            )
            .await?;

        info!("User {} added {} to wallet", user_id, amount);
        Ok(wallet.into())
    }

    /// Debit the money balance; rejected with 422 when the balance is too low
    pub async fn pay(&self, user_id: Uuid, req: PayRequest) -> AppResult<WalletSummary> {
        if req.amount <= Decimal::ZERO {
            return Err(AppError::Validation("Amount must be greater than 0".into()));
        }
        self.accounts.ensure_active(user_id).await?;

        let wallet = self
            .apply(
                user_id,
                WalletChange {
                    money_delta: -req.amount,
                    points_delta: 0,
                    tx_type: TransactionType::Debit,
                    reference_id: req.reference_id,
                    description: req.description.or_else(|| Some("Payment".into())),
                },
            )
            .await?;

        Ok(wallet.into())
    }

    /// Credit money to a user, e.g. a provider's earnings for a completed booking
    pub async fn credit(
        &self,
        user_id: Uuid,
        amount: Decimal,
        reference_id: Option<Uuid>,
        description: &str,
    ) -> AppResult<Wallet> {
        self.apply(
            user_id,
            WalletChange {
                money_delta: amount,
                points_delta: 0,
                tx_type: TransactionType::Credit,
                reference_id,
                description: Some(description.to_string()),
            },
        )
        .await
    }

    /// Award reward points. Zero points is a no-op.
    pub async fn earn_points(
        &self,
        user_id: Uuid,
        points: i64,
        reference_id: Option<Uuid>,
        reason: &str,
    ) -> AppResult<Option<Wallet>> {
        if points < 0 {
            return Err(AppError::Validation("Points must not be negative".into()));
        }
        if points == 0 {
            return Ok(None);
        }

        let before = self.wallet_repo.find_by_user(user_id).await?.map(|w| w.tier_enum());
        let wallet = self
            .apply(
                user_id,
                WalletChange {
                    money_delta: Decimal::ZERO,
                    points_delta: points,
                    tx_type: TransactionType::PointsEarned,
                    reference_id,
                    description: Some(reason.to_string()),
                },
            )
            .await?;

        let after = wallet.tier_enum();
        if before.map_or(after != WalletTier::Bronze, |b| b != after) {
            info!("User {} reached {} tier", user_id, after.as_str());
        }
        Ok(Some(wallet))
    }

    /// Convert points into money: at least 100 points, never more than the balance
    pub async fn redeem_points(&self, user_id: Uuid, points: i64) -> AppResult<RedeemResult> {
        if points < MIN_REDEEM_POINTS {
            return Err(AppError::Validation(format!(
                "Minimum {} points required to redeem",
                MIN_REDEEM_POINTS
            )));
        }

        self.accounts.ensure_active(user_id).await?;
        let (wallet, value) = self.wallet_repo.redeem_points(user_id, points).await?;

        let change = WalletChange {
            money_delta: value,
            points_delta: -points,
            tx_type: TransactionType::PointsRedeemed,
            reference_id: None,
            description: Some(format!("Redeemed {} points", points)),
        };
        self.audit.log_wallet_change(user_id, &wallet, &change).await;
        info!("User {} redeemed {} points for {}", user_id, points, value);

        Ok(RedeemResult {
            wallet: wallet.into(),
            points_redeemed: points,
            amount_credited: value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_up_bounds() {
        assert!(validate_top_up(Decimal::new(500, 0)).is_ok());
        assert!(validate_top_up(Decimal::from(MAX_TOP_UP)).is_ok());
        assert!(validate_top_up(Decimal::ZERO).is_err());
        assert!(validate_top_up(Decimal::new(-5, 0)).is_err());
        assert!(validate_top_up(Decimal::from(MAX_TOP_UP + 1)).is_err());
        assert!(validate_top_up(Decimal::new(10001, 3)).is_err());
    }
}
