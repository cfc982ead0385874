mod helpers;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use helphive_backend::build_router;
use helphive_backend::models::UserRole;
use helpers::*;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn send(request: Request<Body>) -> (StatusCode, Value) {
    let app = build_router(offline_state());
    let response = app.oneshot(request).await.expect("request failed");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read body");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn json_request(method: Method, uri: &str, auth: Option<String>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("failed to build request")
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_always_ok() {
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "disconnected");
    assert_eq!(body["environment"], "development");
    assert!(body["timestamp"].is_string());
}

// ============================================================================
// Auth
// ============================================================================

#[tokio::test]
async fn test_register_helper_without_details_is_bad_request() {
    let request = json_request(
        Method::POST,
        "/api/auth/register",
        None,
        json!({
            "name": "Ravi",
            "email": "ravi@example.com",
            "password": "secret123",
            "role": "helper"
        }),
    );
    let (status, body) = send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("pricePerHour"));
}

#[tokio::test]
async fn test_register_short_password_rejected() {
    let request = json_request(
        Method::POST,
        "/api/auth/register",
        None,
        json!({"name": "Ravi", "email": "ravi@example.com", "password": "123"}),
    );
    let (status, _) = send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_self_registration_rejected() {
    let request = json_request(
        Method::POST,
        "/api/auth/register",
        None,
        json!({
            "name": "Mallory",
            "email": "mallory@example.com",
            "password": "secret123",
            "role": "admin"
        }),
    );
    let (status, _) = send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let request = Request::builder()
        .uri("/api/wallet/transactions")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_invalid_token_rejected() {
    let request = Request::builder()
        .uri("/api/auth/me")
        .header(header::AUTHORIZATION, "Bearer not.a.token")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Validation before any database access
// ============================================================================

#[tokio::test]
async fn test_redeem_below_minimum_rejected() {
    let state = offline_state();
    let auth = bearer(&state, UserRole::User);
    let request = json_request(
        Method::POST,
        "/api/wallet/redeem",
        Some(auth),
        json!({"points": 99}),
    );
    let response = build_router(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cost_template_creation_is_admin_only() {
    let state = offline_state();
    let auth = bearer(&state, UserRole::User);
    let request = json_request(
        Method::POST,
        "/api/cost-estimator/templates",
        Some(auth),
        json!({
            "serviceType": "plumbing",
            "problemType": "leak",
            "basePrice": "300"
        }),
    );
    let response = build_router(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_active_emergencies_are_admin_only() {
    let state = offline_state();
    let auth = bearer(&state, UserRole::Helper);
    let request = Request::builder()
        .uri("/api/emergency/active")
        .header(header::AUTHORIZATION, auth)
        .body(Body::empty())
        .unwrap();
    let response = build_router(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_emergency_with_bad_coordinates_rejected() {
    let state = offline_state();
    let auth = bearer(&state, UserRole::User);
    let request = json_request(
        Method::POST,
        "/api/emergency",
        Some(auth),
        json!({
            "emergencyType": "medical",
            "description": "Fainted",
            "address": "Park",
            "latitude": 123.0,
            "longitude": 77.0
        }),
    );
    let response = build_router(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_help_request_urgency_rejected() {
    let state = offline_state();
    let auth = bearer(&state, UserRole::User);
    let request = json_request(
        Method::POST,
        "/api/community/requests",
        Some(auth),
        json!({
            "title": "Groceries",
            "description": "Need someone to pick up groceries",
            "skillNeeded": "errands",
            "urgency": "whenever",
            "latitude": 12.97,
            "longitude": 77.59
        }),
    );
    let response = build_router(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_categories_are_public() {
    let request = Request::builder()
        .uri("/api/services/categories")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"].as_array().unwrap().len(), 13);
}

// ============================================================================
// Malformed input gets the JSON error envelope
// ============================================================================

#[tokio::test]
async fn test_missing_body_field_is_bad_request_envelope() {
    let state = offline_state();
    let auth = bearer(&state, UserRole::User);
    let request = json_request(
        Method::POST,
        "/api/bookings",
        Some(auth),
        json!({"address": "x"}),
    );
    let response = build_router(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).expect("error body should be JSON");
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("providerId"));
}

#[tokio::test]
async fn test_bad_path_id_is_bad_request_envelope() {
    let state = offline_state();
    let auth = bearer(&state, UserRole::User);
    let request = Request::builder()
        .uri("/api/bookings/not-a-uuid")
        .header(header::AUTHORIZATION, auth)
        .body(Body::empty())
        .unwrap();
    let response = build_router(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).expect("error body should be JSON");
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_bad_query_value_is_bad_request() {
    let (status, body) = send(
        Request::builder()
            .uri("/api/services/providers?page=abc")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_huge_provider_page_is_bad_request() {
    let (status, body) = send(
        Request::builder()
            .uri("/api/services/providers?page=9223372036854775807")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

// ============================================================================
// Emergency assignment only happens through dispatch
// ============================================================================

#[tokio::test]
async fn test_admin_cannot_set_emergency_assigned_by_hand() {
    let state = offline_state();
    let auth = bearer(&state, UserRole::Admin);
    let request = json_request(
        Method::PUT,
        &format!("/api/emergency/{}/status", uuid::Uuid::new_v4()),
        Some(auth),
        json!({"status": "assigned"}),
    );
    let response = build_router(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
