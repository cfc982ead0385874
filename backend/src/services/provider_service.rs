use crate::error::{AppError, AppResult};
use crate::geo::{nearest_within, GeoPoint};
use crate::models::{NearbyProvider, ServiceCategory, ServiceProvider, ServiceType};
use crate::repositories::{ProviderAreaQuery, ProviderFilter, ProviderRepository, ProviderUpdate};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub const DEFAULT_SEARCH_RADIUS_KM: f64 = 10.0;
pub const MAX_SEARCH_RADIUS_KM: f64 = 100.0;
pub const DEFAULT_NEARBY_LIMIT: usize = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListProvidersQuery {
    pub service_type: Option<String>,
    pub city: Option<String>,
    pub min_rating: Option<f64>,
    pub max_price: Option<Decimal>,
    pub available_only: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyQuery {
    pub lat: f64,
    pub lon: f64,
    pub radius_km: Option<f64>,
    pub service_type: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProviderRequest {
    pub business_name: Option<String>,
    pub description: Option<String>,
    pub experience_years: Option<i32>,
    pub price_per_hour: Option<Decimal>,
    pub city: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub service_radius_km: Option<f64>,
    pub is_emergency_provider: Option<bool>,
}

/// Parse an optional service type filter; unknown values are a 400
pub fn parse_service_type(value: Option<&str>) -> AppResult<Option<ServiceType>> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| ServiceType::from_str(v).map_err(AppError::Validation))
        .transpose()
}

/// Validate a search radius, applying the default
pub fn search_radius(radius_km: Option<f64>) -> AppResult<f64> {
    let radius = radius_km.unwrap_or(DEFAULT_SEARCH_RADIUS_KM);
    if !radius.is_finite() || radius <= 0.0 || radius > MAX_SEARCH_RADIUS_KM {
        return Err(AppError::Validation(format!(
            "radiusKm must be between 0 and {}",
            MAX_SEARCH_RADIUS_KM
        )));
    }
    Ok(radius)
}

impl ListProvidersQuery {
    pub fn to_filter(&self) -> AppResult<ProviderFilter> {
        let limit = self.limit.unwrap_or(20).clamp(1, MAX_PAGE_SIZE);
        let page = self.page.unwrap_or(1).max(1);

        if matches!(self.min_rating, Some(r) if !(0.0..=5.0).contains(&r)) {
            return Err(AppError::Validation("minRating must be between 0 and 5".into()));
        }
        let offset = (page - 1)
            .checked_mul(limit)
            .ok_or_else(|| AppError::Validation("page is out of range".into()))?;

        Ok(ProviderFilter {
            service_type: parse_service_type(self.service_type.as_deref())?
                .map(|t| t.as_str().to_string()),
            city: self.city.clone().filter(|c| !c.trim().is_empty()),
            min_rating: self.min_rating,
            max_price: self.max_price,
            available_only: self.available_only.unwrap_or(false),
            limit,
            offset,
        })
    }
}

/// Provider directory and helper profile management
pub struct ProviderService {
    provider_repo: Arc<ProviderRepository>,
}

impl ProviderService {
    pub fn new(provider_repo: Arc<ProviderRepository>) -> Self {
        Self { provider_repo }
    }

    pub fn categories(&self) -> Vec<ServiceCategory> {
        ServiceType::ALL.iter().copied().map(ServiceCategory::from).collect()
    }

    pub async fn list(&self, query: &ListProvidersQuery) -> AppResult<Vec<ServiceProvider>> {
        let filter = query.to_filter()?;
        Ok(self.provider_repo.list(&filter).await?)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<ServiceProvider> {
        self.provider_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Provider not found".into()))
    }

    /// Nearest available providers within `radius_km`
    pub async fn find_nearby(&self, query: &NearbyQuery) -> AppResult<Vec<NearbyProvider>> {
        let origin = GeoPoint::new(query.lat, query.lon).map_err(AppError::Validation)?;
        let radius = search_radius(query.radius_km)?;
        let limit = query.limit.unwrap_or(DEFAULT_NEARBY_LIMIT).clamp(1, 50);
        let service_type = parse_service_type(query.service_type.as_deref())?;

        let (min_lat, max_lat, min_lon, max_lon) = origin.bounding_box(radius);
        let area = ProviderAreaQuery {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
            service_types: service_type
                .map(|t| vec![t.as_str().to_string()])
                .unwrap_or_default(),
            emergency_only: false,
            verified_only: false,
        };

        let candidates = self.provider_repo.find_in_area(&area).await?;
        debug!(
            "Nearby search at ({}, {}) r={}km: {} candidates",
            origin.lat,
            origin.lon,
            radius,
            candidates.len()
        );

        Ok(nearest_within(candidates, &origin, radius, limit, |p| p.location())
            .into_iter()
            .map(|(provider, distance_km)| NearbyProvider {
                provider,
                distance_km: (distance_km * 100.0).round() / 100.0,
            })
            .collect())
    }

    /// Provider profile owned by a helper account
    pub async fn profile_for_user(&self, user_id: Uuid) -> AppResult<ServiceProvider> {
        self.provider_repo
            .find_by_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("No provider profile for this account".into()))
    }

    pub async fn update_my_profile(
        &self,
        user_id: Uuid,
        req: UpdateProviderRequest,
    ) -> AppResult<ServiceProvider> {
        let provider = self.profile_for_user(user_id).await?;

        if matches!(req.price_per_hour, Some(p) if p <= Decimal::ZERO) {
            return Err(AppError::Validation("pricePerHour must be positive".into()));
        }
        if matches!(req.experience_years, Some(e) if e < 0) {
            return Err(AppError::Validation("experienceYears cannot be negative".into()));
        }
        if matches!(req.service_radius_km, Some(r) if !(r > 0.0 && r <= MAX_SEARCH_RADIUS_KM)) {
            return Err(AppError::Validation("serviceRadiusKm is out of range".into()));
        }
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

        let update = ProviderUpdate {
            business_name: req.business_name,
            description: req.description,
            experience_years: req.experience_years,
            price_per_hour: req.price_per_hour,
            city: req.city,
            address: req.address,
            latitude: req.latitude,
            longitude: req.longitude,
            service_radius_km: req.service_radius_km,
            is_emergency_provider: req.is_emergency_provider,
        };
        Ok(self.provider_repo.update(provider.id, &update).await?)
    }

    pub async fn set_availability(
        &self,
        user_id: Uuid,
        available: bool,
    ) -> AppResult<ServiceProvider> {
        let provider = self.profile_for_user(user_id).await?;
        let updated = self
            .provider_repo
            .set_availability(provider.id, available)
            .await?;
        info!("Provider {} availability set to {}", provider.id, available);
        Ok(updated)
    }

    pub async fn verify(&self, provider_id: Uuid, verified: bool) -> AppResult<ServiceProvider> {
        let updated = self.provider_repo.set_verified(provider_id, verified).await?;
        info!("Provider {} verification set to {}", provider_id, verified);
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paging_filter() {
        let query = ListProvidersQuery {
            page: Some(3),
            limit: Some(500),
            ..Default::default()
        };
        let filter = query.to_filter().unwrap();
        assert_eq!(filter.limit, MAX_PAGE_SIZE);
        assert_eq!(filter.offset, 2 * MAX_PAGE_SIZE);
    }

    #[test]
    fn test_page_out_of_range_rejected() {
        let query = ListProvidersQuery {
            page: Some(i64::MAX),
            ..Default::default()
        };
        assert!(matches!(query.to_filter(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_unknown_service_type_rejected() {
        let query = ListProvidersQuery {
            service_type: Some("astrology".into()),
            ..Default::default()
        };
        assert!(matches!(query.to_filter(), Err(AppError::Validation(_))));
        assert_eq!(parse_service_type(Some("")).unwrap(), None);
    }

    #[test]
    fn test_search_radius_bounds() {
        assert_eq!(search_radius(None).unwrap(), DEFAULT_SEARCH_RADIUS_KM);
        assert!(search_radius(Some(0.0)).is_err());
        assert!(search_radius(Some(500.0)).is_err());
    }
}
