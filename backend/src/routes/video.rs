use super::{ApiJson, ApiPath, ApiResult, CreatedResult, SharedState, created, ok};
use crate::auth::AuthUser;
use crate::models::{ConsultationArtifact, ConsultationView, VideoConsultation};
use crate::services::video_service::{
    AddArtifactRequest, EndConsultationRequest, ScheduleConsultationRequest,
};
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

pub fn video_routes() -> Router<SharedState> {
    Router::new()
        .route("/", post(schedule).get(list_mine))
        .route("/:id", get(get_consultation))
        .route("/:id/start", post(start))
        .route("/:id/end", post(end))
        .route("/:id/cancel", post(cancel))
        .route("/:id/missed", post(mark_missed))
        .route("/:id/artifacts", post(add_artifact))
}

async fn schedule(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiJson(req): ApiJson<ScheduleConsultationRequest>,
) -> CreatedResult<ConsultationView> {
    Ok(created(state.video_service.schedule(&user, req).await?))
}

async fn list_mine(
    State(state): State<SharedState>,
    user: AuthUser,
) -> ApiResult<Vec<VideoConsultation>> {
    Ok(ok(state.video_service.list_mine(&user).await?))
}

async fn get_consultation(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ConsultationView> {
    Ok(ok(state.video_service.get(&user, id).await?))
}

async fn start(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ConsultationView> {
    Ok(ok(state.video_service.start(&user, id).await?))
}

// Body is optional
async fn end(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    req: Option<Json<EndConsultationRequest>>,
) -> ApiResult<ConsultationView> {
    let req = req.map(|Json(r)| r).unwrap_or_default();
    Ok(ok(state.video_service.end(&user, id, req).await?))
}

async fn cancel(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ConsultationView> {
    Ok(ok(state.video_service.cancel(&user, id).await?))
}

async fn mark_missed(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<ConsultationView> {
    Ok(ok(state.video_service.mark_missed(&user, id).await?))
}

async fn add_artifact(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<AddArtifactRequest>,
) -> CreatedResult<ConsultationArtifact> {
    Ok(created(state.video_service.add_artifact(&user, id, req).await?))
}
