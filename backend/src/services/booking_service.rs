use crate::auth::{AccountGuard, AuthUser};
use crate::error::{AppError, AppResult};
use crate::models::booking::{
    booking_total, reward_points_for, MAX_BOOKING_HOURS, MIN_BOOKING_HOURS,
};
use crate::models::{Booking, BookingActor, BookingStatus, ServiceProvider, ServiceType};
use crate::repositories::{BookingRepository, NewBooking, ProviderRepository};
use crate::services::{AuditTrailService, WalletService};
use crate::websocket::WebSocketServer;
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub provider_id: Uuid,
    pub service_type: Option<String>,
    pub description: Option<String>,
    pub address: String,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: String,
    pub duration_hours: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateBookingStatusRequest {
    pub status: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateBookingRequest {
    pub rating: i32,
    pub review: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListBookingsQuery {
    pub status: Option<String>,
}

/// `HH:MM` in 24-hour time
fn valid_time(value: &str) -> bool {
    chrono::NaiveTime::parse_from_str(value.trim(), "%H:%M").is_ok()
}

/// Check a booking request against the chosen provider and today's date
pub fn validate_booking(
    req: &CreateBookingRequest,
    provider: &ServiceProvider,
    today: NaiveDate,
) -> AppResult<ServiceType> {
    if !provider.is_available {
        return Err(AppError::BusinessLogic(
            "Provider is not accepting bookings right now".into(),
        ));
    }
    if req.address.trim().is_empty() {
        return Err(AppError::Validation("Address is required".into()));
    }
    if req.scheduled_date < today {
        return Err(AppError::Validation(
            "Scheduled date cannot be in the past".into(),
        ));
    }
    if !valid_time(&req.scheduled_time) {
        return Err(AppError::Validation(
            "scheduledTime must be in HH:MM format".into(),
        ));
    }
    if !(MIN_BOOKING_HOURS..=MAX_BOOKING_HOURS).contains(&req.duration_hours) {
        return Err(AppError::Validation(format!(
            "Duration must be between {} and {} hours",
            MIN_BOOKING_HOURS, MAX_BOOKING_HOURS
        )));
    }

    match req.service_type.as_deref() {
        Some(s) if !s.trim().is_empty() => {
            ServiceType::from_str(s).map_err(AppError::Validation)
        }
        _ => Ok(provider.service_type_enum()),
    }
}

/// Validate a rating value
pub fn validate_rating(rating: i32) -> AppResult<()> {
    if !(1..=5).contains(&rating) {
        return Err(AppError::Validation("Rating must be between 1 and 5".into()));
    }
    Ok(())
}

/// Booking lifecycle: creation, status transitions, completion payouts and ratings
pub struct BookingService {
    booking_repo: Arc<BookingRepository>,
    provider_repo: Arc<ProviderRepository>,
    wallet_service: Arc<WalletService>,
    accounts: AccountGuard,
    ws_server: Arc<WebSocketServer>,
    audit: Arc<AuditTrailService>,
}

impl BookingService {
    pub fn new(
        booking_repo: Arc<BookingRepository>,
        provider_repo: Arc<ProviderRepository>,
        wallet_service: Arc<WalletService>,
        accounts: AccountGuard,
        ws_server: Arc<WebSocketServer>,
        audit: Arc<AuditTrailService>,
    ) -> Self {
        Self {
            booking_repo,
            provider_repo,
            wallet_service,
            accounts,
            ws_server,
            audit,
        }
    }

    pub async fn create(&self, caller: &AuthUser, req: CreateBookingRequest) -> AppResult<Booking> {
        self.accounts.ensure_active(caller.id).await?;
        let provider = self
            .provider_repo
            .find_by_id(req.provider_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Provider not found".into()))?;

        if provider.user_id == caller.id {
            return Err(AppError::Validation("You cannot book your own service".into()));
        }

        let today = chrono::Utc::now().date_naive();
        let service_type = validate_booking(&req, &provider, today)?;

        let booking = self
            .booking_repo
            .create(&NewBooking {
                user_id: caller.id,
                provider_id: provider.id,
                service_type: service_type.as_str().to_string(),
                description: req.description,
                address: req.address.trim().to_string(),
                scheduled_date: req.scheduled_date,
                scheduled_time: req.scheduled_time.trim().to_string(),
                duration_hours: req.duration_hours,
                price_per_hour: provider.price_per_hour,
                total_amount: booking_total(provider.price_per_hour, req.duration_hours),
            })
            .await?;

        info!(
            "Booking {} created: user={} provider={} total={}",
            booking.id, caller.id, provider.id, booking.total_amount
        );

        self.ws_server
            .broadcast_booking_update(booking.id, &booking.status, &[provider.user_id])
            .await;

        Ok(booking)
    }

    /// Bookings the caller made, or for helpers the bookings made with them
    pub async fn list_mine(
        &self,
        caller: &AuthUser,
        query: &ListBookingsQuery,
    ) -> AppResult<Vec<Booking>> {
        let status = query
            .status
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(BookingStatus::from_str)
            .transpose()
            .map_err(AppError::Validation)?;
        let status = status.map(|s| s.as_str());

        if let Some(provider) = self.provider_repo.find_by_user(caller.id).await? {
            return Ok(self.booking_repo.find_by_provider(provider.id, status).await?);
        }
        Ok(self.booking_repo.find_by_user(caller.id, status).await?)
    }

    /// Load a booking and work out how the caller relates to it
    async fn load_for(&self, caller: &AuthUser, id: Uuid) -> AppResult<(Booking, BookingActor, Uuid)> {
        let booking = self
            .booking_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Booking not found".into()))?;

        let provider = self
            .provider_repo
            .find_by_id(booking.provider_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Provider not found".into()))?;

        let actor = if booking.user_id == caller.id {
            BookingActor::Customer
        } else if provider.user_id == caller.id {
            BookingActor::Provider
        } else if caller.is_admin() {
            BookingActor::Admin
        } else {
            return Err(AppError::Forbidden(
                "You are not a participant in this booking".into(),
            ));
        };

        Ok((booking, actor, provider.user_id))
    }

    pub async fn get(&self, caller: &AuthUser, id: Uuid) -> AppResult<Booking> {
        Ok(self.load_for(caller, id).await?.0)
    }

    pub async fn update_status(
        &self,
        caller: &AuthUser,
        id: Uuid,
        req: UpdateBookingStatusRequest,
    ) -> AppResult<Booking> {
        let next = BookingStatus::from_str(&req.status).map_err(AppError::Validation)?;
        let (booking, actor, provider_user_id) = self.load_for(caller, id).await?;
        let current = booking.status_enum();

        if !actor.may_set(next) {
            return Err(AppError::Forbidden(format!(
                "You cannot mark this booking as {}",
                next.as_str()
            )));
        }
        if !current.can_transition_to(next) {
            return Err(AppError::Validation(format!(
                "Cannot change booking from {} to {}",
                current.as_str(),
                next.as_str()
            )));
        }

        let updated = if next == BookingStatus::Completed {
            self.booking_repo.complete(id).await?
        } else {
            self.booking_repo
                .transition(id, current, next, req.reason.as_deref())
                .await?
        }
        .ok_or_else(|| AppError::Conflict("Booking status changed concurrently".into()))?;

        info!(
            "Booking {} {} -> {} by {}",
            id,
            current.as_str(),
            next.as_str(),
            caller.id
        );
        self.audit
            .log_status_change("booking", id, caller.id, current.as_str(), next.as_str())
            .await;

        if next == BookingStatus::Completed {
            self.settle_completed(&updated, provider_user_id).await;
        }

        self.ws_server
            .broadcast_booking_update(id, &updated.status, &[updated.user_id, provider_user_id])
            .await;

        Ok(updated)
    }

    /// Pay the provider and reward the customer. The booking is already
    /// completed; payout failures are logged rather than surfaced.
    async fn settle_completed(&self, booking: &Booking, provider_user_id: Uuid) {
        if let Err(e) = self
            .wallet_service
            .credit(
                provider_user_id,
                booking.total_amount,
                Some(booking.id),
                "Booking payout",
            )
            .await
        {
            warn!("Payout for booking {} failed: {}", booking.id, e);
        }

        let points = reward_points_for(booking.total_amount);
        if let Err(e) = self
            .wallet_service
            .earn_points(booking.user_id, points, Some(booking.id), "Completed booking")
            .await
        {
            warn!("Reward points for booking {} failed: {}", booking.id, e);
        }
    }

    /// Rate a completed booking once, as its customer
    pub async fn rate(
        &self,
        caller: &AuthUser,
        id: Uuid,
        req: RateBookingRequest,
    ) -> AppResult<Booking> {
        validate_rating(req.rating)?;

        let (booking, actor, _) = self.load_for(caller, id).await?;
        if actor != BookingActor::Customer {
            return Err(AppError::Forbidden(
                "Only the customer can rate a booking".into(),
            ));
        }

        if booking.rating.is_some() {
            return Err(AppError::Conflict("Booking has already been rated".into()));
        }
        booking.check_rateable().map_err(AppError::Validation)?;

        let rated = self
            .booking_repo
            .rate(id, req.rating, req.review.as_deref())
            .await?
            .ok_or_else(|| AppError::Conflict("Booking has already been rated".into()))?;

        info!("Booking {} rated {} by {}", id, req.rating, caller.id);
        Ok(rated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn provider() -> ServiceProvider {
        let now = chrono::Utc::now().naive_utc();
        ServiceProvider {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            business_name: "FixIt".into(),
            service_type: "electrical".into(),
            description: None,
            experience_years: 3,
            price_per_hour: Decimal::new(250, 0),
            city: "Pune".into(),
            address: None,
            latitude: None,
            longitude: None,
            service_radius_km: 10.0,
            is_available: true,
            is_verified: true,
            is_emergency_provider: false,
            rating_average: 0.0,
            rating_count: 0,
            completed_jobs: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn request(date: NaiveDate) -> CreateBookingRequest {
        CreateBookingRequest {
            provider_id: Uuid::new_v4(),
            service_type: None,
            description: None,
            address: "12 MG Road".into(),
            scheduled_date: date,
            scheduled_time: "10:30".into(),
            duration_hours: 2,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn test_valid_booking_uses_provider_service() {
        let kind = validate_booking(&request(today()), &provider(), today()).unwrap();
        assert_eq!(kind, ServiceType::Electrical);
    }

    #[test]
    fn test_past_date_rejected() {
        let yesterday = today().pred_opt().unwrap();
        let err = validate_booking(&request(yesterday), &provider(), today()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_duration_bounds() {
        for hours in [0, 13] {
            let mut req = request(today());
            req.duration_hours = hours;
            assert!(validate_booking(&req, &provider(), today()).is_err());
        }
    }

    #[test]
    fn test_unavailable_provider_rejected() {
        let mut p = provider();
        p.is_available = false;
        let err = validate_booking(&request(today()), &p, today()).unwrap_err();
        assert!(matches!(err, AppError::BusinessLogic(_)));
    }

    #[test]
    fn test_bad_time_rejected() {
        let mut req = request(today());
        req.scheduled_time = "25:99".into();
        assert!(validate_booking(&req, &provider(), today()).is_err());
    }

    #[test]
    fn test_rating_range() {
        assert!(validate_rating(1).is_ok());
        assert!(validate_rating(5).is_ok());
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(6).is_err());
    }
}
