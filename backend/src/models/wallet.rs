//! Wallet, reward tier and transaction log models

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Smallest number of points that can be redeemed at once
pub const MIN_REDEEM_POINTS: i64 = 100;
/// Points exchanged for one currency unit on redemption
pub const POINTS_PER_CURRENCY_UNIT: i64 = 10;
/// Points credited to every new wallet
pub const SIGNUP_BONUS_POINTS: i64 = 50;
/// Upper bound for a single top-up
pub const MAX_TOP_UP: i64 = 50_000;

/// Reward tier derived from lifetime points
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl WalletTier {
    /// Fixed threshold table: silver at 1000, gold at 5000, platinum at 10000
    pub fn from_points(points: i64) -> Self {
        match points {
            p if p >= 10_000 => WalletTier::Platinum,
            p if p >= 5_000 => WalletTier::Gold,
            p if p >= 1_000 => WalletTier::Silver,
            _ => WalletTier::Bronze,
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "bronze" => Ok(WalletTier::Bronze),
            "silver" => Ok(WalletTier::Silver),
            "gold" => Ok(WalletTier::Gold),
            "platinum" => Ok(WalletTier::Platinum),
            _ => Err(format!("Invalid tier: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WalletTier::Bronze => "bronze",
            WalletTier::Silver => "silver",
            WalletTier::Gold => "gold",
            WalletTier::Platinum => "platinum",
        }
    }

    /// Points needed to reach the next tier, `None` at the top
    pub fn next_threshold(&self) -> Option<i64> {
        match self {
            WalletTier::Bronze => Some(1_000),
            WalletTier::Silver => Some(5_000),
            WalletTier::Gold => Some(10_000),
            WalletTier::Platinum => None,
        }
    }
}

/// Transaction types for wallet movements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Credit,
    Debit,
    PointsEarned,
    PointsRedeemed,
    Refund,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
            Self::PointsEarned => "points_earned",
            Self::PointsRedeemed => "points_redeemed",
            Self::Refund => "refund",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "credit" => Some(Self::Credit),
            "debit" => Some(Self::Debit),
            "points_earned" => Some(Self::PointsEarned),
            "points_redeemed" => Some(Self::PointsRedeemed),
            "refund" => Some(Self::Refund),
            _ => None,
        }
    }
}

/// Money and reward-points balance of a user
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub money_balance: Decimal,
    pub points_balance: i64,
    pub lifetime_points: i64,
    pub tier: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Wallet {
    pub fn tier_enum(&self) -> WalletTier {
        WalletTier::from_points(self.lifetime_points)
    }
}

/// Transaction record for the wallet log
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletTransaction {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub transaction_type: String,
    pub amount: Decimal,
    pub points: i64,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub points_before: i64,
    pub points_after: i64,
    pub reference_id: Option<Uuid>,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}

impl WalletTransaction {
    pub fn tx_type(&self) -> Option<TransactionType> {
        TransactionType::from_str(&self.transaction_type)
    }
}

/// Validate a redemption against the current points balance and
/// return the money it converts into.
pub fn redemption_value(points: i64, points_balance: i64) -> Result<Decimal, String> {
    if points < MIN_REDEEM_POINTS {
        return Err(format!("Minimum {} points required to redeem", MIN_REDEEM_POINTS));
    }
    if points > points_balance {
        return Err(format!(
            "Insufficient points: available {}, requested {}",
            points_balance, points
        ));
    }
    Ok(Decimal::from(points) / Decimal::from(POINTS_PER_CURRENCY_UNIT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_thresholds() {
        assert_eq!(WalletTier::from_points(0), WalletTier::Bronze);
        assert_eq!(WalletTier::from_points(999), WalletTier::Bronze);
        assert_eq!(WalletTier::from_points(1_000), WalletTier::Silver);
        assert_eq!(WalletTier::from_points(4_999), WalletTier::Silver);
        assert_eq!(WalletTier::from_points(5_000), WalletTier::Gold);
        assert_eq!(WalletTier::from_points(10_000), WalletTier::Platinum);
    }

    #[test]
    fn test_redeem_rules() {
        assert!(redemption_value(99, 1_000).is_err());
        assert!(redemption_value(500, 400).is_err());
        assert_eq!(redemption_value(250, 400).unwrap(), Decimal::new(25, 0));
    }
}
