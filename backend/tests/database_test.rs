//! Repository tests against a real PostgreSQL.
//!
//! Run with `DATABASE_URL` set and `--ignored`; each test gets a fresh
//! database with migrations applied.

mod helpers;

use chrono::Utc;
use helpers::*;
use helphive_backend::auth::AccountGuard;
use helphive_backend::error::AppError;
use helphive_backend::models::*;
use helphive_backend::repositories::*;
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use std::sync::Arc;

// ============================================================================
// Migrations
// ============================================================================

#[sqlx::test]
#[ignore = "requires PostgreSQL"]
async fn test_migrations_ran(pool: PgPool) {
    let tables = [
        "users",
        "service_providers",
        "bookings",
        "emergency_services",
        "emergency_tracking",
        "community_volunteers",
        "community_help_requests",
        "wallets",
        "wallet_transactions",
        "video_consultations",
        "consultation_artifacts",
        "cost_templates",
    ];

    for table in tables {
        let exists: bool = sqlx::query(
            "SELECT EXISTS (SELECT FROM information_schema.tables WHERE table_name = $1)",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap()
        .get(0);
        assert!(exists, "Table {} should exist", table);
    }
}

// ============================================================================
// Accounts
// ============================================================================

#[sqlx::test]
#[ignore = "requires PostgreSQL"]
async fn test_account_creation_writes_wallet_and_profile(pool: PgPool) {
    let db = TestDatabase::from_pool(pool);
    let fx = TestFixtures::create(&db).await;

    assert_eq!(fx.provider.user_id, fx.helper.id);
    assert!(fx.provider.is_available);

    let wallet = db.wallet_repo.find_by_user(fx.customer.id).await.unwrap().unwrap();
    assert_eq!(wallet.points_balance, 50);
    assert_eq!(wallet.lifetime_points, 50);
    assert_eq!(wallet.tier_enum(), WalletTier::Bronze);

    let history = db.wallet_repo.transactions(wallet.id, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].tx_type(), Some(TransactionType::PointsEarned));
}

#[sqlx::test]
#[ignore = "requires PostgreSQL"]
async fn test_duplicate_email_rejected(pool: PgPool) {
    let db = TestDatabase::from_pool(pool);
    let user = new_user("dup@example.com", UserRole::User);

    db.user_repo.create_account(&user, None, 0).await.unwrap();
    assert!(db.user_repo.email_exists("DUP@example.com").await.unwrap());
    assert!(db.user_repo.create_account(&user, None, 0).await.is_err());
}

#[sqlx::test]
#[ignore = "requires PostgreSQL"]
async fn test_deactivated_account_is_refused(pool: PgPool) {
    let db = TestDatabase::from_pool(pool.clone());
    let fx = TestFixtures::create(&db).await;
    let guard = AccountGuard::new(Arc::clone(&db.user_repo));

    assert!(guard.ensure_active(fx.customer.id).await.is_ok());

    sqlx::query("UPDATE users SET is_active = FALSE WHERE id = $1")
        .bind(fx.customer.id)
        .execute(&pool)
        .await
        .unwrap();

    assert!(matches!(
        guard.ensure_active(fx.customer.id).await,
        Err(AppError::Forbidden(_))
    ));
    assert!(matches!(
        guard.ensure_active(uuid::Uuid::new_v4()).await,
        Err(AppError::Unauthorized(_))
    ));
}

// ============================================================================
// Wallet
// ============================================================================

#[sqlx::test]
#[ignore = "requires PostgreSQL"]
async fn test_wallet_debit_cannot_overdraw(pool: PgPool) {
    let db = TestDatabase::from_pool(pool);
    let fx = TestFixtures::create(&db).await;

    let credit = WalletChange {
        money_delta: Decimal::new(100, 0),
        points_delta: 0,
        tx_type: TransactionType::Credit,
        reference_id: None,
        description: None,
    };
    let wallet = db.wallet_repo.apply(fx.customer.id, &credit).await.unwrap();
    assert_eq!(wallet.money_balance, Decimal::new(100, 0));

    let overdraw = WalletChange {
        money_delta: Decimal::new(-150, 0),
        tx_type: TransactionType::Debit,
        ..credit
    };
    assert!(db.wallet_repo.apply(fx.customer.id, &overdraw).await.is_err());

    let wallet = db.wallet_repo.find_by_user(fx.customer.id).await.unwrap().unwrap();
    assert_eq!(wallet.money_balance, Decimal::new(100, 0));
}

#[sqlx::test]
#[ignore = "requires PostgreSQL"]
async fn test_points_redemption_and_tier(pool: PgPool) {
    let db = TestDatabase::from_pool(pool);
    let fx = TestFixtures::create(&db).await;

    let earn = WalletChange {
        money_delta: Decimal::ZERO,
        points_delta: 1_000,
        tx_type: TransactionType::PointsEarned,
        reference_id: None,
        description: Some("bonus".into()),
    };
    let wallet = db.wallet_repo.apply(fx.customer.id, &earn).await.unwrap();
    assert_eq!(wallet.tier_enum(), WalletTier::Silver);

    let (wallet, value) = db.wallet_repo.redeem_points(fx.customer.id, 500).await.unwrap();
    assert_eq!(value, Decimal::new(50, 0));
    assert_eq!(wallet.points_balance, 550);
    assert_eq!(wallet.money_balance, Decimal::new(50, 0));
    // Redeeming never lowers the tier
    assert_eq!(wallet.lifetime_points, 1_050);
    assert_eq!(wallet.tier_enum(), WalletTier::Silver);

    assert!(db.wallet_repo.redeem_points(fx.customer.id, 5_000).await.is_err());
}

// ============================================================================
// Bookings
// ============================================================================

#[sqlx::test]
#[ignore = "requires PostgreSQL"]
async fn test_booking_complete_and_rate(pool: PgPool) {
    let db = TestDatabase::from_pool(pool);
    let fx = TestFixtures::create(&db).await;

    let booking = db
        .booking_repo
        .create(&NewBooking {
            user_id: fx.customer.id,
            provider_id: fx.provider.id,
            service_type: "plumbing".into(),
            description: Some("Leaking tap".into()),
            address: "12 MG Road".into(),
            scheduled_date: Utc::now().date_naive(),
            scheduled_time: "10:00".into(),
            duration_hours: 2,
            price_per_hour: fx.provider.price_per_hour,
            total_amount: fx.provider.price_per_hour * Decimal::from(2),
        })
        .await
        .unwrap();
    assert_eq!(booking.status_enum(), BookingStatus::Pending);

    // Stale transitions lose
    assert!(db
        .booking_repo
        .transition(booking.id, BookingStatus::Confirmed, BookingStatus::InProgress, None)
        .await
        .unwrap()
        .is_none());

    for (from, to) in [
        (BookingStatus::Pending, BookingStatus::Confirmed),
        (BookingStatus::Confirmed, BookingStatus::InProgress),
    ] {
        db.booking_repo
            .transition(booking.id, from, to, None)
            .await
            .unwrap()
            .expect("transition should apply");
    }

    let done = db.booking_repo.complete(booking.id).await.unwrap().unwrap();
    assert_eq!(done.status_enum(), BookingStatus::Completed);
    assert!(done.completed_at.is_some());

    let rated = db
        .booking_repo
        .rate(booking.id, 4, Some("Quick and tidy"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(rated.rating, Some(4));
    assert!(db.booking_repo.rate(booking.id, 5, None).await.unwrap().is_none());

    let provider = db.provider_repo.find_by_id(fx.provider.id).await.unwrap().unwrap();
    assert_eq!(provider.completed_jobs, 1);
    assert_eq!(provider.rating_count, 1);
    assert!((provider.rating_average - 4.0).abs() < f64::EPSILON);
}

// ============================================================================
// Emergencies
// ============================================================================

#[sqlx::test]
#[ignore = "requires PostgreSQL"]
async fn test_emergency_assignment_is_exclusive(pool: PgPool) {
    let db = TestDatabase::from_pool(pool);
    let fx = TestFixtures::create(&db).await;

    let emergency = db
        .emergency_repo
        .create(&NewEmergency {
            user_id: fx.customer.id,
            emergency_type: "plumbing".into(),
            description: "Burst pipe".into(),
            address: "12 MG Road".into(),
            latitude: 12.9716,
            longitude: 77.5946,
            priority: "high".into(),
        })
        .await
        .unwrap();
    assert_eq!(emergency.status_enum(), EmergencyStatus::Requested);

    let note = TrackingNote {
        note: Some("Provider assigned".into()),
        ..TrackingNote::default()
    };
    let first = db
        .emergency_repo
        .assign_provider(emergency.id, fx.provider.id, 7, &note)
        .await
        .unwrap();
    let second = db
        .emergency_repo
        .assign_provider(emergency.id, fx.provider.id, 9, &note)
        .await
        .unwrap();

    let assigned = first.expect("first dispatch wins");
    assert_eq!(assigned.provider_id, Some(fx.provider.id));
    assert_eq!(assigned.estimated_arrival_minutes, Some(7));
    assert!(second.is_none());

    let tracking = db.emergency_repo.tracking(emergency.id).await.unwrap();
    assert_eq!(tracking.len(), 2);
}

// ============================================================================
// Community
// ============================================================================

#[sqlx::test]
#[ignore = "requires PostgreSQL"]
async fn test_help_request_accepted_once(pool: PgPool) {
    let db = TestDatabase::from_pool(pool);
    let fx = TestFixtures::create(&db).await;

    let volunteer = db
        .community_repo
        .create_volunteer(&NewVolunteer {
            user_id: fx.helper.id,
            skills: vec!["errands".into()],
            bio: None,
            latitude: 12.975,
            longitude: 77.59,
            radius_km: 5.0,
        })
        .await
        .unwrap();

    let request = db
        .community_repo
        .create_request(&NewHelpRequest {
            requester_id: fx.customer.id,
            title: "Groceries".into(),
            description: "Pick up groceries".into(),
            skill_needed: "errands".into(),
            urgency: "medium".into(),
            address: None,
            latitude: 12.9716,
            longitude: 77.5946,
        })
        .await
        .unwrap();

    let nearby = db
        .community_repo
        .volunteers_in_area("Errands", 12.9, 13.1, 77.5, 77.7)
        .await
        .unwrap();
    assert_eq!(nearby.len(), 1);

    let accepted = db.community_repo.accept(request.id, volunteer.id).await.unwrap();
    assert!(accepted.is_some());
    assert!(db
        .community_repo
        .accept(request.id, volunteer.id)
        .await
        .unwrap()
        .is_none());

    let done = db
        .community_repo
        .complete(request.id, HelpRequestStatus::Accepted)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(done.status_enum(), HelpRequestStatus::Completed);

    let volunteer = db.community_repo.find_volunteer(volunteer.id).await.unwrap().unwrap();
    assert_eq!(volunteer.helps_completed, 1);
}

// ============================================================================
// Cost templates
// ============================================================================

#[sqlx::test]
#[ignore = "requires PostgreSQL"]
async fn test_seeded_templates_lookup(pool: PgPool) {
    let db = TestDatabase::from_pool(pool);

    let leak = db.cost_repo.find("plumbing", "LEAK").await.unwrap();
    let leak = leak.expect("seeded template");
    assert_eq!(leak.base_price, Decimal::new(350, 0));
    assert_eq!(leak.factors_vec().len(), 3);

    assert!(db.cost_repo.find("plumbing", "unknown").await.unwrap().is_none());
    assert!(!db.cost_repo.list(Some("electrical")).await.unwrap().is_empty());
}
