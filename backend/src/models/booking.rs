use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const MIN_BOOKING_HOURS: i32 = 1;
pub const MAX_BOOKING_HOURS: i32 = 12;

/// Booking lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    Rejected,
}

impl BookingStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "in_progress" | "in-progress" => Ok(BookingStatus::InProgress),
            "completed" => Ok(BookingStatus::Completed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "rejected" => Ok(BookingStatus::Rejected),
            _ => Err(format!("Invalid booking status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Rejected => "rejected",
        }
    }

    /// Whether moving from `self` to `next` is allowed
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Rejected)
                | (Pending, Cancelled)
                | (Confirmed, InProgress)
                | (Confirmed, Cancelled)
                | (InProgress, Completed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::Rejected
        )
    }
}

/// Who is asking for a booking status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingActor {
    Customer,
    Provider,
    Admin,
}

impl BookingActor {
    /// Which target statuses each party may set
    pub fn may_set(&self, status: BookingStatus) -> bool {
        match self {
            BookingActor::Admin => true,
            BookingActor::Customer => status == BookingStatus::Cancelled,
            BookingActor::Provider => matches!(
                status,
                BookingStatus::Confirmed
                    | BookingStatus::Rejected
                    | BookingStatus::InProgress
                    | BookingStatus::Completed
                    | BookingStatus::Cancelled
            ),
        }
    }
}

/// A paid, scheduled service booking
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
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
    pub status: String,
    pub cancellation_reason: Option<String>,
    pub rating: Option<i32>,
    pub review: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
}

impl Booking {
    pub fn status_enum(&self) -> BookingStatus {
        BookingStatus::from_str(&self.status).unwrap_or(BookingStatus::Pending)
    }

    /// Check that this booking may receive a rating right now
    pub fn check_rateable(&self) -> Result<(), String> {
        if self.status_enum() != BookingStatus::Completed {
            return Err("Only completed bookings can be rated".to_string());
        }
        if self.rating.is_some() {
            return Err("Booking has already been rated".to_string());
        }
        Ok(())
    }
}

/// Total price for a booking
pub fn booking_total(price_per_hour: Decimal, duration_hours: i32) -> Decimal {
    (price_per_hour * Decimal::from(duration_hours)).round_dp(2)
}

/// Reward points the customer earns for a completed booking: one per ten currency units
pub fn reward_points_for(total: Decimal) -> i64 {
    use rust_decimal::prelude::ToPrimitive;
    (total / Decimal::from(10)).floor().to_i64().unwrap_or(0).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_transitions() {
        assert!(BookingStatus::Pending.can_transition_to(BookingStatus::Confirmed));
        assert!(BookingStatus::Confirmed.can_transition_to(BookingStatus::InProgress));
        assert!(BookingStatus::InProgress.can_transition_to(BookingStatus::Completed));
        assert!(!BookingStatus::Pending.can_transition_to(BookingStatus::Completed));
        assert!(!BookingStatus::Completed.can_transition_to(BookingStatus::Cancelled));
        assert!(!BookingStatus::InProgress.can_transition_to(BookingStatus::Cancelled));
    }

    #[test]
    fn test_customer_may_only_cancel() {
        assert!(BookingActor::Customer.may_set(BookingStatus::Cancelled));
        assert!(!BookingActor::Customer.may_set(BookingStatus::Completed));
        assert!(BookingActor::Provider.may_set(BookingStatus::Completed));
    }

    #[test]
    fn test_totals_and_points() {
        assert_eq!(booking_total(Decimal::new(35050, 2), 3), Decimal::new(105150, 2));
        assert_eq!(reward_points_for(Decimal::new(105150, 2)), 105);
        assert_eq!(reward_points_for(Decimal::new(9, 0)), 0);
    }
}
