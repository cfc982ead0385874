use helphive_backend::geo::{nearest_within, GeoPoint};
use helphive_backend::models::booking::{booking_total, reward_points_for};
use helphive_backend::models::cost::compute_estimate;
use helphive_backend::models::emergency::estimate_arrival_minutes;
use helphive_backend::models::wallet::redemption_value;
use helphive_backend::models::*;
use helphive_backend::services::auth_service::{validate_registration, RegisterRequest};
use rust_decimal::Decimal;

// ============================================================================
// Bookings
// ============================================================================

#[test]
fn test_booking_lifecycle_transitions() {
    use BookingStatus::*;

    assert!(Pending.can_transition_to(Confirmed));
    assert!(Pending.can_transition_to(Rejected));
    assert!(Confirmed.can_transition_to(InProgress));
    assert!(InProgress.can_transition_to(Completed));

    // No skipping ahead and no leaving terminal states
    assert!(!Pending.can_transition_to(Completed));
    assert!(!InProgress.can_transition_to(Cancelled));
    assert!(!Completed.can_transition_to(Pending));
    assert!(!Rejected.can_transition_to(Confirmed));
}

#[test]
fn test_customer_can_only_cancel() {
    assert!(BookingActor::Customer.may_set(BookingStatus::Cancelled));
    assert!(!BookingActor::Customer.may_set(BookingStatus::Confirmed));
    assert!(!BookingActor::Customer.may_set(BookingStatus::Completed));
    assert!(BookingActor::Provider.may_set(BookingStatus::Completed));
}

#[test]
fn test_booking_total_and_reward_points() {
    let total = booking_total(Decimal::new(500, 0), 3);
    assert_eq!(total, Decimal::new(1500, 0));
    assert_eq!(reward_points_for(total), 150);
    assert_eq!(reward_points_for(Decimal::new(1259, 1)), 12);
    assert_eq!(reward_points_for(Decimal::ZERO), 0);
}

// ============================================================================
// Wallet
// ============================================================================

#[test]
fn test_tier_thresholds() {
    assert_eq!(WalletTier::from_points(0), WalletTier::Bronze);
    assert_eq!(WalletTier::from_points(999), WalletTier::Bronze);
    assert_eq!(WalletTier::from_points(1_000), WalletTier::Silver);
    assert_eq!(WalletTier::from_points(5_000), WalletTier::Gold);
    assert_eq!(WalletTier::from_points(10_000), WalletTier::Platinum);
    assert_eq!(WalletTier::Platinum.next_threshold(), None);
}

#[test]
fn test_redemption_rules() {
    assert_eq!(redemption_value(100, 500).unwrap(), Decimal::new(10, 0));
    assert_eq!(redemption_value(250, 250).unwrap(), Decimal::new(25, 0));
    assert!(redemption_value(99, 500).is_err());
    assert!(redemption_value(600, 500).is_err());
}

// ============================================================================
// Cost estimates
// ============================================================================

#[test]
fn test_unknown_problem_uses_generic_estimate() {
    let estimate = compute_estimate(
        ServiceType::Plumbing,
        Some("mystery noise"),
        None,
        &["old_pipes".to_string()],
        false,
    )
    .unwrap();

    assert!(estimate.is_generic);
    assert!(estimate.applied_factors.is_empty());
    assert_eq!(estimate.estimated_price, estimate.base_price);
    assert!(estimate.min_price < estimate.estimated_price);
    assert!(estimate.max_price > estimate.estimated_price);
}

#[test]
fn test_urgent_surcharge() {
    let normal = compute_estimate(ServiceType::Electrical, None, None, &[], false).unwrap();
    let urgent = compute_estimate(ServiceType::Electrical, None, None, &[], true).unwrap();
    assert_eq!(
        urgent.estimated_price,
        normal.estimated_price * Decimal::new(15, 1)
    );
}

// ============================================================================
// Emergencies and geography
// ============================================================================

#[test]
fn test_emergency_cancellation_window() {
    use EmergencyStatus::*;

    assert!(Requested.can_transition_to(Cancelled));
    assert!(EnRoute.can_transition_to(Cancelled));
    assert!(!Arrived.can_transition_to(Cancelled));
    assert!(!Resolved.can_transition_to(InProgress));
}

#[test]
fn test_arrival_estimate() {
    assert_eq!(estimate_arrival_minutes(15.0), 30);
    assert_eq!(estimate_arrival_minutes(0.5), 5);
}

#[test]
fn test_nearest_within_sorts_and_filters() {
    let origin = GeoPoint::new(12.9716, 77.5946).unwrap();
    let points = vec![
        ("far", GeoPoint::new(13.2, 77.7).unwrap()),
        ("near", GeoPoint::new(12.975, 77.6).unwrap()),
        ("mid", GeoPoint::new(13.0, 77.6).unwrap()),
        ("mysore", GeoPoint::new(12.2958, 76.6394).unwrap()),
    ];

    let ranked = nearest_within(points, &origin, 30.0, 10, |(_, p)| Some(*p));
    let names: Vec<&str> = ranked.iter().map(|((n, _), _)| *n).collect();
    assert_eq!(names, vec!["near", "mid", "far"]);
    assert!(ranked.windows(2).all(|w| w[0].1 <= w[1].1));
}

// ============================================================================
// Registration
// ============================================================================

fn registration(role: &str) -> RegisterRequest {
    serde_json::from_value(serde_json::json!({
        "name": "Meera",
        "email": " Meera@Example.COM ",
        "password": "secret123",
        "role": role,
        "service": "nursing",
        "location": "Pune",
        "experience": 4,
        "pricePerHour": "350"
    }))
    .unwrap()
}

#[test]
fn test_helper_registration_builds_provider() {
    let (user, provider) = validate_registration(&registration("helper"), "hash".into()).unwrap();
    let provider = provider.expect("helpers get a provider profile");

    assert_eq!(user.email, "meera@example.com");
    assert_eq!(user.role, "helper");
    assert_eq!(provider.service_type, "nursing");
    assert_eq!(provider.city, "Pune");
    assert_eq!(provider.price_per_hour, Decimal::new(350, 0));
}

#[test]
fn test_customer_registration_has_no_provider() {
    let (_, provider) = validate_registration(&registration("user"), "hash".into()).unwrap();
    assert!(provider.is_none());
}

#[test]
fn test_helper_with_unknown_service_rejected() {
    let mut req = registration("helper");
    req.service = Some("astrology".into());
    assert!(validate_registration(&req, "hash".into()).is_err());
}
