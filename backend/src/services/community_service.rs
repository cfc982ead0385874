use crate::auth::{AccountGuard, AuthUser};
use crate::error::{AppError, AppResult};
use crate::geo::{nearest_within, GeoPoint};
use crate::models::community::VOLUNTEER_REWARD_POINTS;
use crate::models::{
    CommunityHelpRequest, CommunityVolunteer, HelpRequestStatus, NearbyVolunteer, Urgency,
};
use crate::repositories::{CommunityRepository, NewHelpRequest, NewVolunteer, VolunteerUpdate};
use crate::services::{AuditTrailService, WalletService};
use crate::websocket::{WebSocketServer, WsMessage};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub const DEFAULT_VOLUNTEER_RADIUS_KM: f64 = 5.0;
pub const MAX_VOLUNTEER_RADIUS_KM: f64 = 50.0;
pub const DEFAULT_VOLUNTEER_LIMIT: usize = 10;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterVolunteerRequest {
    pub skills: Vec<String>,
    pub bio: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVolunteerRequest {
    pub skills: Option<Vec<String>>,
    pub bio: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub radius_km: Option<f64>,
    pub is_available: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateHelpRequestRequest {
    pub title: String,
    pub description: String,
    pub skill_needed: String,
    pub urgency: Option<String>,
    pub address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyVolunteersQuery {
    pub request_id: Option<Uuid>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub skill: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenRequestsQuery {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub radius_km: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateHelpRequestStatusRequest {
    pub status: String,
}

/// Trim, lowercase and de-duplicate skills
pub fn normalize_skills(skills: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for skill in skills {
        let skill = skill.trim().to_lowercase();
        if !skill.is_empty() && !out.contains(&skill) {
            out.push(skill);
        }
    }
    out
}

fn validate_radius(radius_km: f64) -> AppResult<f64> {
    if !radius_km.is_finite() || radius_km <= 0.0 || radius_km > MAX_VOLUNTEER_RADIUS_KM {
        return Err(AppError::Validation(format!(
            "radiusKm must be between 0 and {}",
            MAX_VOLUNTEER_RADIUS_KM
        )));
    }
    Ok(radius_km)
}

/// Volunteers within their own service radius of `origin`, nearest first
pub fn rank_volunteers(
    volunteers: Vec<CommunityVolunteer>,
    origin: &GeoPoint,
    skill: &str,
    limit: usize,
) -> Vec<NearbyVolunteer> {
    let matching: Vec<CommunityVolunteer> = volunteers
        .into_iter()
        .filter(|v| v.is_available && v.has_skill(skill))
        .collect();

    nearest_within(matching, origin, MAX_VOLUNTEER_RADIUS_KM, usize::MAX, |v| {
        Some(v.location())
    })
    .into_iter()
    .filter(|(v, distance)| *distance <= v.radius_km)
    .take(limit)
    .map(|(volunteer, distance_km)| NearbyVolunteer {
        volunteer,
        distance_km: (distance_km * 100.0).round() / 100.0,
    })
    .collect()
}

/// Volunteer profiles and the unpaid help-request flow
pub struct CommunityService {
    community_repo: Arc<CommunityRepository>,
    wallet_service: Arc<WalletService>,
    accounts: AccountGuard,
    ws_server: Arc<WebSocketServer>,
    audit: Arc<AuditTrailService>,
}

impl CommunityService {
    pub fn new(
        community_repo: Arc<CommunityRepository>,
        wallet_service: Arc<WalletService>,
        accounts: AccountGuard,
        ws_server: Arc<WebSocketServer>,
        audit: Arc<AuditTrailService>,
    ) -> Self {
        Self {
            community_repo,
            wallet_service,
            accounts,
            ws_server,
            audit,
        }
    }

    // =========================================================================
    // Volunteers
    // =========================================================================

    pub async fn register_volunteer(
        &self,
        caller: &AuthUser,
        req: RegisterVolunteerRequest,
    ) -> AppResult<CommunityVolunteer> {
        let skills = normalize_skills(&req.skills);
        if skills.is_empty() {
            return Err(AppError::Validation("At least one skill is required".into()));
        }
        let point = GeoPoint::new(req.latitude, req.longitude).map_err(AppError::Validation)?;
        let radius_km = validate_radius(req.radius_km.unwrap_or(DEFAULT_VOLUNTEER_RADIUS_KM))?;

        if self
            .community_repo
            .find_volunteer_by_user(caller.id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "You are already registered as a volunteer".into(),
            ));
        }

        let volunteer = self
            .community_repo
            .create_volunteer(&NewVolunteer {
                user_id: caller.id,
                skills,
                bio: req.bio,
                latitude: point.lat,
                longitude: point.lon,
                radius_km,
            })
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                    AppError::Conflict("You are already registered as a volunteer".into())
                }
                other => AppError::Sqlx(other),
            })?;

        info!("User {} registered as volunteer {}", caller.id, volunteer.id);
        Ok(volunteer)
    }

    pub async fn my_volunteer_profile(&self, caller: &AuthUser) -> AppResult<CommunityVolunteer> {
        self.community_repo
            .find_volunteer_by_user(caller.id)
            .await?
            .ok_or_else(|| AppError::NotFound("You are not registered as a volunteer".into()))
    }

    pub async fn update_volunteer(
        &self,
        caller: &AuthUser,
        req: UpdateVolunteerRequest,
    ) -> AppResult<CommunityVolunteer> {
        let volunteer = self.my_volunteer_profile(caller).await?;

        let skills = match &req.skills {
            Some(s) => {
                let normalized = normalize_skills(s);
                if normalized.is_empty() {
                    return Err(AppError::Validation("At least one skill is required".into()));
                }
                Some(normalized)
            }
            None => None,
        };
        match (req.latitude, req.longitude) {
            (Some(lat), Some(lon)) => {
                GeoPoint::new(lat, lon).map_err(AppError::Validation)?;
            }
            (None, None) => {}
            _ => {
                return Err(AppError::Validation(
                    "latitude and longitude must be provided together".into(),
                ))
            }
        }
        let radius_km = req.radius_km.map(validate_radius).transpose()?;

        let update = VolunteerUpdate {
            skills,
            bio: req.bio,
            latitude: req.latitude,
            longitude: req.longitude,
            radius_km,
            is_available: req.is_available,
        };
        self.community_repo
            .update_volunteer(volunteer.id, &update)
            .await?
            .ok_or_else(|| AppError::NotFound("Volunteer not found".into()))
    }

    /// Volunteers near a help request (or an explicit point and skill)
    pub async fn find_nearby_volunteers(
        &self,
        query: &NearbyVolunteersQuery,
    ) -> AppResult<Vec<NearbyVolunteer>> {
        let (origin, skill) = match query.request_id {
            Some(request_id) => {
                let request = self
                    .community_repo
                    .find_request(request_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Help request not found".into()))?;
                (request.location(), request.skill_needed)
            }
            None => {
                let (lat, lon, skill) = match (query.lat, query.lon, query.skill.as_deref()) {
                    (Some(lat), Some(lon), Some(skill)) if !skill.trim().is_empty() => {
                        (lat, lon, skill.to_string())
                    }
                    _ => {
                        return Err(AppError::Validation(
                            "Provide requestId, or lat, lon and skill".into(),
                        ))
                    }
                };
                (
                    GeoPoint::new(lat, lon).map_err(AppError::Validation)?,
                    skill,
                )
            }
        };

        let limit = query.limit.unwrap_or(DEFAULT_VOLUNTEER_LIMIT).clamp(1, 50);
        self.volunteers_for(&origin, &skill, limit).await
    }

    async fn volunteers_for(
        &self,
        origin: &GeoPoint,
        skill: &str,
        limit: usize,
    ) -> AppResult<Vec<NearbyVolunteer>> {
        let (min_lat, max_lat, min_lon, max_lon) = origin.bounding_box(MAX_VOLUNTEER_RADIUS_KM);
        let candidates = self
            .community_repo
            .volunteers_in_area(skill, min_lat, max_lat, min_lon, max_lon)
            .await?;
        Ok(rank_volunteers(candidates, origin, skill, limit))
    }

    // =========================================================================
    // Help Requests
    // =========================================================================

    /// Post a request and notify matching volunteers in the background
    pub async fn create_help_request(
        self: &Arc<Self>,
        caller: &AuthUser,
        req: CreateHelpRequestRequest,
    ) -> AppResult<CommunityHelpRequest> {
        if req.title.trim().is_empty() || req.description.trim().is_empty() {
            return Err(AppError::Validation("Title and description are required".into()));
        }
        let skill = req.skill_needed.trim().to_lowercase();
        if skill.is_empty() {
            return Err(AppError::Validation("skillNeeded is required".into()));
        }
        let urgency = match req.urgency.as_deref() {
            Some(u) => Urgency::from_str(u).map_err(AppError::Validation)?,
            None => Urgency::Medium,
        };
        let point = GeoPoint::new(req.latitude, req.longitude).map_err(AppError::Validation)?;
        self.accounts.ensure_active(caller.id).await?;

        let request = self
            .community_repo
            .create_request(&NewHelpRequest {
                requester_id: caller.id,
                title: req.title.trim().to_string(),
                description: req.description.trim().to_string(),
                skill_needed: skill,
                urgency: urgency.as_str().to_string(),
                address: req.address,
                latitude: point.lat,
                longitude: point.lon,
            })
            .await?;

        info!("Help request {} posted by {}", request.id, caller.id);

        let service = Arc::clone(self);
        let posted = request.clone();
        tokio::spawn(async move {
            service.notify_matching_volunteers(&posted).await;
        });

        Ok(request)
    }

    async fn notify_matching_volunteers(&self, request: &CommunityHelpRequest) {
        let volunteers = match self
            .volunteers_for(&request.location(), &request.skill_needed, DEFAULT_VOLUNTEER_LIMIT)
            .await
        {
            Ok(v) => v,
            Err(e) => {
                warn!("Volunteer matching for request {} failed: {}", request.id, e);
                return;
            }
        };

        if volunteers.is_empty() {
            info!("No volunteers nearby for help request {}", request.id);
            return;
        }

        let message = WsMessage::HelpRequestUpdate {
            request_id: request.id.to_string(),
            status: request.status.clone(),
            volunteer_id: None,
            timestamp: chrono::Utc::now().timestamp(),
        };
        let mut delivered = 0;
        for nearby in volunteers
            .iter()
            .filter(|n| n.volunteer.user_id != request.requester_id)
        {
            delivered += self
                .ws_server
                .broadcast_to_user(nearby.volunteer.user_id, message.clone())
                .await;
        }
        info!(
            "Help request {} matched {} volunteers ({} online)",
            request.id,
            volunteers.len(),
            delivered
        );
    }

    /// Open requests, optionally only those near a point
    pub async fn list_open_requests(
        &self,
        query: &OpenRequestsQuery,
    ) -> AppResult<Vec<CommunityHelpRequest>> {
        let origin = match (query.lat, query.lon) {
            (Some(lat), Some(lon)) => GeoPoint::new(lat, lon).map_err(AppError::Validation)?,
            (None, None) => {
                return Ok(self
                    .community_repo
                    .open_requests_in_area(-90.0, 90.0, -180.0, 180.0)
                    .await?)
            }
            _ => {
                return Err(AppError::Validation(
                    "lat and lon must be provided together".into(),
                ))
            }
        };

        let radius = validate_radius(query.radius_km.unwrap_or(MAX_VOLUNTEER_RADIUS_KM))?;
        let (min_lat, max_lat, min_lon, max_lon) = origin.bounding_box(radius);
        let candidates = self
            .community_repo
            .open_requests_in_area(min_lat, max_lat, min_lon, max_lon)
            .await?;

        Ok(nearest_within(candidates, &origin, radius, usize::MAX, |r| {
            Some(r.location())
        })
        .into_iter()
        .map(|(request, _)| request)
        .collect())
    }

    /// Requests the caller posted, plus those they accepted as a volunteer
    pub async fn list_my_requests(&self, caller: &AuthUser) -> AppResult<Vec<CommunityHelpRequest>> {
        let mut requests = self.community_repo.requests_by_requester(caller.id).await?;
        if let Some(volunteer) = self.community_repo.find_volunteer_by_user(caller.id).await? {
            requests.extend(self.community_repo.requests_by_volunteer(volunteer.id).await?);
        }
        Ok(requests)
    }

    pub async fn get_help_request(&self, id: Uuid) -> AppResult<CommunityHelpRequest> {
        self.community_repo
            .find_request(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Help request not found".into()))
    }

    /// Claim a request as the calling volunteer; 409 if someone already has it
    pub async fn accept_help_request(
        &self,
        caller: &AuthUser,
        id: Uuid,
    ) -> AppResult<CommunityHelpRequest> {
        let volunteer = self.my_volunteer_profile(caller).await?;
        let request = self.get_help_request(id).await?;

        if request.requester_id == caller.id {
            return Err(AppError::Validation(
                "You cannot accept your own help request".into(),
            ));
        }
        request.check_acceptable().map_err(AppError::Conflict)?;

        let accepted = self
            .community_repo
            .accept(id, volunteer.id)
            .await?
            .ok_or_else(|| {
                AppError::Conflict("Help request already has a volunteer assigned".into())
            })?;

        info!("Help request {} accepted by volunteer {}", id, volunteer.id);
        self.audit
            .log_status_change("help_request", id, caller.id, "open", "accepted")
            .await;
        self.ws_server
            .broadcast_help_request_update(
                id,
                accepted.requester_id,
                &accepted.status,
                accepted.volunteer_id,
            )
            .await;

        Ok(accepted)
    }

    pub async fn update_help_request_status(
        &self,
        caller: &AuthUser,
        id: Uuid,
        req: UpdateHelpRequestStatusRequest,
    ) -> AppResult<CommunityHelpRequest> {
        let next = HelpRequestStatus::from_str(&req.status).map_err(AppError::Validation)?;
        let request = self.get_help_request(id).await?;
        let current = request.status_enum();

        let volunteer = self.community_repo.find_volunteer_by_user(caller.id).await?;
        let is_requester = request.requester_id == caller.id;
        let is_volunteer = match (&volunteer, request.volunteer_id) {
            (Some(v), Some(assigned)) => v.id == assigned,
            _ => false,
        };
        if !(is_requester || is_volunteer || caller.is_admin()) {
            return Err(AppError::Forbidden(
                "You are not part of this help request".into(),
            ));
        }

        if current.is_closed() {
            return Err(AppError::Conflict(format!(
                "Help request is already {}",
                current.as_str()
            )));
        }
        match next {
            HelpRequestStatus::Accepted => {
                return Err(AppError::Validation(
                    "Use the accept endpoint to take a request".into(),
                ))
            }
            HelpRequestStatus::Open => {
                return Err(AppError::Validation("A request cannot be reopened".into()))
            }
            HelpRequestStatus::InProgress | HelpRequestStatus::Completed
                if request.volunteer_id.is_none() =>
            {
                return Err(AppError::Validation(
                    "Help request has no volunteer yet".into(),
                ))
            }
            _ => {}
        }
        if next == current {
            return Ok(request);
        }

        let updated = if next == HelpRequestStatus::Completed {
            self.community_repo.complete(id, current).await?
        } else {
            self.community_repo.transition(id, current, next).await?
        }
        .ok_or_else(|| AppError::Conflict("Help request status changed concurrently".into()))?;

        info!(
            "Help request {} {} -> {} by {}",
            id,
            current.as_str(),
            next.as_str(),
            caller.id
        );
        self.audit
            .log_status_change("help_request", id, caller.id, current.as_str(), next.as_str())
            .await;

        if next == HelpRequestStatus::Completed {
            self.reward_volunteer(&updated).await;
        }

        self.ws_server
            .broadcast_help_request_update(
                id,
                updated.requester_id,
                &updated.status,
                updated.volunteer_id,
            )
            .await;

        Ok(updated)
    }

    async fn reward_volunteer(&self, request: &CommunityHelpRequest) {
        let Some(volunteer_id) = request.volunteer_id else {
            return;
        };
        let volunteer = match self.community_repo.find_volunteer(volunteer_id).await {
            Ok(Some(v)) => v,
            Ok(None) => return,
            Err(e) => {
                warn!("Could not load volunteer {}: {}", volunteer_id, e);
                return;
            }
        };

        if let Err(e) = self
            .wallet_service
            .earn_points(
                volunteer.user_id,
                VOLUNTEER_REWARD_POINTS,
                Some(request.id),
                "Community help completed",
            )
            .await
        {
            warn!("Volunteer reward for request {} failed: {}", request.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volunteer(lat: f64, lon: f64, radius_km: f64, skills: &[&str]) -> CommunityVolunteer {
        let now = chrono::Utc::now().naive_utc();
        CommunityVolunteer {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            skills: skills.iter().map(|s| s.to_string()).collect(),
            bio: None,
            latitude: lat,
            longitude: lon,
            radius_km,
            is_available: true,
            helps_completed: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_normalize_skills() {
        let skills = vec![" First Aid ".to_string(), "first aid".into(), "".into(), "Cooking".into()];
        assert_eq!(normalize_skills(&skills), vec!["first aid", "cooking"]);
    }

    #[test]
    fn test_rank_volunteers_respects_own_radius() {
        let origin = GeoPoint::new(12.97, 77.59).unwrap();
        // ~3.3 km north, willing to travel 5 km
        let near = volunteer(13.0, 77.59, 5.0, &["tutoring"]);
        // ~3.3 km north, only willing to travel 2 km
        let picky = volunteer(13.0, 77.59, 2.0, &["tutoring"]);
        // right here but different skill
        let other_skill = volunteer(12.97, 77.59, 5.0, &["cooking"]);

        let ranked = rank_volunteers(
            vec![near.clone(), picky, other_skill],
            &origin,
            "Tutoring",
            10,
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].volunteer.id, near.id);
    }

    #[test]
    fn test_rank_volunteers_orders_and_limits() {
        let origin = GeoPoint::new(12.97, 77.59).unwrap();
        let far = volunteer(13.01, 77.59, 10.0, &["errands"]);
        let close = volunteer(12.975, 77.59, 10.0, &["errands"]);
        let ranked = rank_volunteers(vec![far, close.clone()], &origin, "errands", 1);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].volunteer.id, close.id);
    }
}
