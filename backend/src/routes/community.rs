use super::{ApiJson, ApiPath, ApiQuery, ApiResult, CreatedResult, SharedState, created, ok};
use crate::auth::AuthUser;
use crate::models::{CommunityHelpRequest, CommunityVolunteer, NearbyVolunteer};
use crate::services::community_service::{
    CreateHelpRequestRequest, NearbyVolunteersQuery, OpenRequestsQuery, RegisterVolunteerRequest,
    UpdateHelpRequestStatusRequest, UpdateVolunteerRequest,
};
use axum::extract::State;
use axum::routing::{get, post, put};
use axum::Router;
use uuid::Uuid;

pub fn community_routes() -> Router<SharedState> {
    Router::new()
        .route("/volunteers", post(register_volunteer))
        .route("/volunteers/me", get(my_volunteer).put(update_volunteer))
        .route("/volunteers/nearby", get(nearby_volunteers))
        .route("/requests", post(create_request).get(open_requests))
        .route("/requests/mine", get(my_requests))
        .route("/requests/:id", get(get_request))
        .route("/requests/:id/accept", post(accept_request))
        .route("/requests/:id/status", put(update_request_status))
}

async fn register_volunteer(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiJson(req): ApiJson<RegisterVolunteerRequest>,
) -> CreatedResult<CommunityVolunteer> {
    Ok(created(
        state.community_service.register_volunteer(&user, req).await?,
    ))
}

async fn my_volunteer(
    State(state): State<SharedState>,
    user: AuthUser,
) -> ApiResult<CommunityVolunteer> {
    Ok(ok(state.community_service.my_volunteer_profile(&user).await?))
}

async fn update_volunteer(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiJson(req): ApiJson<UpdateVolunteerRequest>,
) -> ApiResult<CommunityVolunteer> {
    Ok(ok(state.community_service.update_volunteer(&user, req).await?))
}

async fn nearby_volunteers(
    State(state): State<SharedState>,
    _user: AuthUser,
    ApiQuery(query): ApiQuery<NearbyVolunteersQuery>,
) -> ApiResult<Vec<NearbyVolunteer>> {
    Ok(ok(state.community_service.find_nearby_volunteers(&query).await?))
}

async fn create_request(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateHelpRequestRequest>,
) -> CreatedResult<CommunityHelpRequest> {
    Ok(created(
        state.community_service.create_help_request(&user, req).await?,
    ))
}

async fn open_requests(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<OpenRequestsQuery>,
) -> ApiResult<Vec<CommunityHelpRequest>> {
    Ok(ok(state.community_service.list_open_requests(&query).await?))
}

async fn my_requests(
    State(state): State<SharedState>,
    user: AuthUser,
) -> ApiResult<Vec<CommunityHelpRequest>> {
    Ok(ok(state.community_service.list_my_requests(&user).await?))
}

async fn get_request(
    State(state): State<SharedState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<CommunityHelpRequest> {
    Ok(ok(state.community_service.get_help_request(id).await?))
}

async fn accept_request(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<CommunityHelpRequest> {
    Ok(ok(state.community_service.accept_help_request(&user, id).await?))
}

async fn update_request_status(
    State(state): State<SharedState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateHelpRequestStatusRequest>,
) -> ApiResult<CommunityHelpRequest> {
    Ok(ok(state
        .community_service
        .update_help_request_status(&user, id, req)
        .await?))
}
