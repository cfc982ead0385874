//! Emergency requests and responder dispatch.
//!
//! Creating an emergency stores it as `requested` and hands the id to a
//! background dispatch task. Dispatch picks the nearest available, verified
//! emergency provider of a matching service type and assigns it with a
//! conditional update, so two concurrent dispatches can never both win.

use crate::auth::{AccountGuard, AuthUser};
use crate::error::{AppError, AppResult};
use crate::geo::{nearest_within, GeoPoint};
use crate::models::emergency::estimate_arrival_minutes;
use crate::models::{
    EmergencyDetail, EmergencyPriority, EmergencyService as Emergency, EmergencyStatus,
    EmergencyType, NearbyProvider, ServiceProvider,
};
use crate::repositories::{
    EmergencyRepository, NewEmergency, ProviderAreaQuery, ProviderRepository, TrackingNote,
};
use crate::services::AuditTrailService;
use crate::websocket::{WebSocketServer, WsMessage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const DISPATCH_RADIUS_KM: f64 = 25.0;
pub const DISPATCH_CANDIDATES: usize = 5;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEmergencyRequest {
    pub emergency_type: String,
    pub description: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub priority: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateEmergencyStatusRequest {
    pub status: String,
    pub note: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Outcome of one dispatch attempt
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum DispatchOutcome {
    Assigned {
        provider_id: Uuid,
        distance_km: f64,
        estimated_arrival_minutes: i32,
    },
    NoProviders,
    AlreadyAssigned,
}

/// Who is asking for an emergency status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EmergencyActor {
    Requester,
    Responder,
    Admin,
}

impl EmergencyActor {
    fn may_set(&self, status: EmergencyStatus) -> bool {
        match self {
            EmergencyActor::Admin => status != EmergencyStatus::Assigned,
            EmergencyActor::Requester => status == EmergencyStatus::Cancelled,
            EmergencyActor::Responder => matches!(
                status,
                EmergencyStatus::EnRoute
                    | EmergencyStatus::Arrived
                    | EmergencyStatus::InProgress
                    | EmergencyStatus::Resolved
            ),
        }
    }
}

/// Validate and normalize a new emergency
pub fn validate_emergency(req: &CreateEmergencyRequest, user_id: Uuid) -> AppResult<NewEmergency> {
    let emergency_type =
        EmergencyType::from_str(&req.emergency_type).map_err(AppError::Validation)?;
    let priority = match req.priority.as_deref() {
        Some(p) => EmergencyPriority::from_str(p).map_err(AppError::Validation)?,
        None => EmergencyPriority::High,
    };
    let point = GeoPoint::new(req.latitude, req.longitude).map_err(AppError::Validation)?;

    if req.description.trim().is_empty() {
        return Err(AppError::Validation("Description is required".into()));
    }
    if req.address.trim().is_empty() {
        return Err(AppError::Validation("Address is required".into()));
    }

    Ok(NewEmergency {
        user_id,
        emergency_type: emergency_type.as_str().to_string(),
        description: req.description.trim().to_string(),
        address: req.address.trim().to_string(),
        latitude: point.lat,
        longitude: point.lon,
        priority: priority.as_str().to_string(),
    })
}

pub struct EmergencyService {
    emergency_repo: Arc<EmergencyRepository>,
    provider_repo: Arc<ProviderRepository>,
    accounts: AccountGuard,
    ws_server: Arc<WebSocketServer>,
    audit: Arc<AuditTrailService>,
}

impl EmergencyService {
    pub fn new(
        emergency_repo: Arc<EmergencyRepository>,
        provider_repo: Arc<ProviderRepository>,
        accounts: AccountGuard,
        ws_server: Arc<WebSocketServer>,
        audit: Arc<AuditTrailService>,
    ) -> Self {
        Self {
            emergency_repo,
            provider_repo,
            accounts,
            ws_server,
            audit,
        }
    }

    /// Store the emergency and dispatch in the background
    pub async fn create(
        self: &Arc<Self>,
        caller: &AuthUser,
        req: CreateEmergencyRequest,
    ) -> AppResult<Emergency> {
        let new = validate_emergency(&req, caller.id)?;
        self.accounts.ensure_active(caller.id).await?;
        let emergency = self.emergency_repo.create(&new).await?;

        info!(
            "Emergency {} raised: type={} priority={} by {}",
            emergency.id, emergency.emergency_type, emergency.priority, caller.id
        );

        let service = Arc::clone(self);
        let emergency_id = emergency.id;
        tokio::spawn(async move {
            if let Err(e) = service.dispatch(emergency_id).await {
                error!("Dispatch for emergency {} failed: {}", emergency_id, e);
            }
        });

        Ok(emergency)
    }

    /// Nearest matching emergency providers, falling back to any emergency
    /// provider when none of the matching type is in range
    pub async fn find_responders(&self, emergency: &Emergency) -> AppResult<Vec<NearbyProvider>> {
        let origin = emergency.location();
        let types: Vec<String> = emergency
            .emergency_type_enum()
            .responder_types()
            .iter()
            .map(|t| t.as_str().to_string())
            .collect();

        let mut found = self.responders_near(&origin, types.clone()).await?;
        if found.is_empty() && !types.is_empty() {
            found = self.responders_near(&origin, vec![]).await?;
        }
        Ok(found)
    }

    async fn responders_near(
        &self,
        origin: &GeoPoint,
        service_types: Vec<String>,
    ) -> AppResult<Vec<NearbyProvider>> {
        let (min_lat, max_lat, min_lon, max_lon) = origin.bounding_box(DISPATCH_RADIUS_KM);
        let candidates: Vec<ServiceProvider> = self
            .provider_repo
            .find_in_area(&ProviderAreaQuery {
                min_lat,
                max_lat,
                min_lon,
                max_lon,
                service_types,
                emergency_only: true,
                verified_only: true,
            })
            .await?;

        Ok(
            nearest_within(candidates, origin, DISPATCH_RADIUS_KM, DISPATCH_CANDIDATES, |p| {
                p.location()
            })
            .into_iter()
            .map(|(provider, distance_km)| NearbyProvider {
                provider,
                distance_km,
            })
            .collect(),
        )
    }

    /// Assign the nearest responder to a still-unassigned emergency
    pub async fn dispatch(&self, emergency_id: Uuid) -> AppResult<DispatchOutcome> {
        let emergency = self
            .emergency_repo
            .find_by_id(emergency_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Emergency not found".into()))?;

        if emergency.provider_id.is_some() || emergency.status_enum() != EmergencyStatus::Requested
        {
            return Ok(DispatchOutcome::AlreadyAssigned);
        }

        let responders = self.find_responders(&emergency).await?;
        let Some(nearest) = responders.into_iter().next() else {
            warn!(
                "No emergency providers within {}km of emergency {}",
                DISPATCH_RADIUS_KM, emergency_id
            );
            self.emergency_repo
                .add_note(
                    emergency_id,
                    EmergencyStatus::Requested,
                    "No available providers nearby; awaiting dispatch",
                )
                .await?;
            self.ws_server
                .broadcast_emergency_update(
                    &emergency,
                    Some("No available providers nearby".into()),
                    None,
                )
                .await;
            return Ok(DispatchOutcome::NoProviders);
        };

        let eta = estimate_arrival_minutes(nearest.distance_km);
        let note = TrackingNote {
            note: Some(format!(
                "Assigned to {} ({:.1} km away, ETA {} min)",
                nearest.provider.business_name, nearest.distance_km, eta
            )),
            latitude: nearest.provider.latitude,
            longitude: nearest.provider.longitude,
        };

        let Some(assigned) = self
            .emergency_repo
            .assign_provider(emergency_id, nearest.provider.id, eta, &note)
            .await?
        else {
            info!("Emergency {} was assigned concurrently", emergency_id);
            return Ok(DispatchOutcome::AlreadyAssigned);
        };

        info!(
            "Emergency {} assigned to provider {} ({:.2} km, ETA {} min)",
            emergency_id, nearest.provider.id, nearest.distance_km, eta
        );
        self.audit
            .log_emergency_dispatched(&assigned, nearest.distance_km)
            .await;

        self.ws_server
            .broadcast_emergency_update(
                &assigned,
                note.note.clone(),
                nearest.provider.location().map(|p| (p.lat, p.lon)),
            )
            .await;
        self.ws_server
            .broadcast_to_user(
                nearest.provider.user_id,
                WsMessage::EmergencyUpdate {
                    emergency_id: assigned.id.to_string(),
                    status: assigned.status.clone(),
                    provider_id: Some(nearest.provider.id.to_string()),
                    estimated_arrival_minutes: Some(eta),
                    note: Some(format!("New emergency at {}", assigned.address)),
                    latitude: Some(assigned.latitude),
                    longitude: Some(assigned.longitude),
                    timestamp: chrono::Utc::now().timestamp(),
                },
            )
            .await;

        Ok(DispatchOutcome::Assigned {
            provider_id: nearest.provider.id,
            distance_km: nearest.distance_km,
            estimated_arrival_minutes: eta,
        })
    }

    /// Retry dispatch for an emergency nobody has picked up yet
    pub async fn redispatch(&self, caller: &AuthUser, id: Uuid) -> AppResult<DispatchOutcome> {
        let (emergency, _) = self.load_for(caller, id).await?;
        if emergency.status_enum() != EmergencyStatus::Requested {
            return Err(AppError::Conflict(format!(
                "Emergency is already {}",
                emergency.status
            )));
        }
        self.dispatch(id).await
    }

    async fn load_for(&self, caller: &AuthUser, id: Uuid) -> AppResult<(Emergency, EmergencyActor)> {
        let emergency = self
            .emergency_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Emergency not found".into()))?;

        if emergency.user_id == caller.id {
            return Ok((emergency, EmergencyActor::Requester));
        }
        if let Some(provider_id) = emergency.provider_id {
            let is_responder = self
                .provider_repo
                .find_by_user(caller.id)
                .await?
                .map_or(false, |p| p.id == provider_id);
            if is_responder {
                return Ok((emergency, EmergencyActor::Responder));
            }
        }
        if caller.is_admin() {
            return Ok((emergency, EmergencyActor::Admin));
        }
        Err(AppError::Forbidden(
            "You are not involved in this emergency".into(),
        ))
    }

    pub async fn get(&self, caller: &AuthUser, id: Uuid) -> AppResult<EmergencyDetail> {
        let (emergency, _) = self.load_for(caller, id).await?;
        let tracking = self.emergency_repo.tracking(id).await?;
        Ok(EmergencyDetail {
            emergency,
            tracking,
        })
    }

    /// Candidate responders for an emergency, nearest first
    pub async fn nearby_providers(
        &self,
        caller: &AuthUser,
        id: Uuid,
    ) -> AppResult<Vec<NearbyProvider>> {
        let (emergency, _) = self.load_for(caller, id).await?;
        self.find_responders(&emergency).await
    }

    pub async fn list_mine(&self, caller: &AuthUser) -> AppResult<Vec<Emergency>> {
        Ok(self.emergency_repo.find_by_user(caller.id).await?)
    }

    /// Emergencies assigned to the calling helper
    pub async fn list_assigned(&self, caller: &AuthUser) -> AppResult<Vec<Emergency>> {
        let provider = self
            .provider_repo
            .find_by_user(caller.id)
            .await?
            .ok_or_else(|| AppError::NotFound("No provider profile for this account".into()))?;
        Ok(self.emergency_repo.find_by_provider(provider.id).await?)
    }

    pub async fn list_active(&self) -> AppResult<Vec<Emergency>> {
        Ok(self.emergency_repo.find_active().await?)
    }

    pub async fn update_status(
        &self,
        caller: &AuthUser,
        id: Uuid,
        req: UpdateEmergencyStatusRequest,
    ) -> AppResult<Emergency> {
        let next = EmergencyStatus::from_str(&req.status).map_err(AppError::Validation)?;
        // Assignment sets the provider too, so it only happens through dispatch
        if next == EmergencyStatus::Assigned {
            return Err(AppError::Validation(
                "Emergencies are assigned through dispatch".into(),
            ));
        }
        let position = match (req.latitude, req.longitude) {
            (Some(lat), Some(lon)) => {
                Some(GeoPoint::new(lat, lon).map_err(AppError::Validation)?)
            }
            _ => None,
        };

        let (emergency, actor) = self.load_for(caller, id).await?;
        let current = emergency.status_enum();

        if !actor.may_set(next) {
            return Err(AppError::Forbidden(format!(
                "You cannot mark this emergency as {}",
                next.as_str()
            )));
        }
        if !current.can_transition_to(next) {
            return Err(AppError::Validation(format!(
                "Cannot change emergency from {} to {}",
                current.as_str(),
                next.as_str()
            )));
        }

        let note = TrackingNote {
            note: req.note.clone(),
            latitude: position.map(|p| p.lat),
            longitude: position.map(|p| p.lon),
        };
        let updated = self
            .emergency_repo
            .transition(id, current, next, &note)
            .await?
            .ok_or_else(|| AppError::Conflict("Emergency status changed concurrently".into()))?;

        info!(
            "Emergency {} {} -> {} by {}",
            id,
            current.as_str(),
            next.as_str(),
            caller.id
        );
        self.audit
            .log_status_change("emergency", id, caller.id, current.as_str(), next.as_str())
            .await;
        self.ws_server
            .broadcast_emergency_update(&updated, req.note, position.map(|p| (p.lat, p.lon)))
            .await;

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateEmergencyRequest {
        CreateEmergencyRequest {
            emergency_type: "medical".into(),
            description: "Chest pain".into(),
            address: "Flat 4B".into(),
            latitude: 19.07,
            longitude: 72.87,
            priority: None,
        }
    }

    #[test]
    fn test_default_priority_is_high() {
        let new = validate_emergency(&request(), Uuid::new_v4()).unwrap();
        assert_eq!(new.priority, "high");
        assert_eq!(new.emergency_type, "medical");
    }

    #[test]
    fn test_invalid_emergency_rejected() {
        let mut bad_type = request();
        bad_type.emergency_type = "alien".into();
        assert!(validate_emergency(&bad_type, Uuid::new_v4()).is_err());

        let mut bad_lat = request();
        bad_lat.latitude = 123.0;
        assert!(validate_emergency(&bad_lat, Uuid::new_v4()).is_err());

        let mut blank = request();
        blank.description = "  ".into();
        assert!(validate_emergency(&blank, Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_actor_permissions() {
        assert!(EmergencyActor::Requester.may_set(EmergencyStatus::Cancelled));
        assert!(!EmergencyActor::Requester.may_set(EmergencyStatus::Resolved));
        assert!(EmergencyActor::Responder.may_set(EmergencyStatus::EnRoute));
        assert!(!EmergencyActor::Responder.may_set(EmergencyStatus::Cancelled));
        assert!(EmergencyActor::Admin.may_set(EmergencyStatus::Cancelled));
        assert!(!EmergencyActor::Admin.may_set(EmergencyStatus::Assigned));
        assert!(!EmergencyActor::Responder.may_set(EmergencyStatus::Assigned));
    }
}
