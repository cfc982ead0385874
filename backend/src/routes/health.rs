use super::SharedState;
use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

/// Liveness probe; always 200, database state reported in the body
pub async fn health(State(state): State<SharedState>) -> Json<Value> {
    let database = if state.database.is_healthy().await {
        "connected"
    } else {
        "disconnected"
    };

    Json(json!({
        "status": "ok",
        "database": database,
        "environment": state.environment,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
