use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::geo::GeoPoint;

/// Service categories offered on the marketplace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Plumbing,
    Electrical,
    Cleaning,
    Carpentry,
    Painting,
    ApplianceRepair,
    PestControl,
    Nursing,
    Physiotherapy,
    DoctorVisit,
    ElderlyCare,
    Ambulance,
    Other,
}

impl ServiceType {
    pub const ALL: [ServiceType; 13] = [
        ServiceType::Plumbing,
        ServiceType::Electrical,
        ServiceType::Cleaning,
        ServiceType::Carpentry,
        ServiceType::Painting,
        ServiceType::ApplianceRepair,
        ServiceType::PestControl,
        ServiceType::Nursing,
        ServiceType::Physiotherapy,
        ServiceType::DoctorVisit,
        ServiceType::ElderlyCare,
        ServiceType::Ambulance,
        ServiceType::Other,
    ];

    /// Convert from database string. Accepts `-` and spaces as separators.
    pub fn from_str(s: &str) -> Result<Self, String> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("Invalid service type: {}", s))
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Plumbing => "plumbing",
            ServiceType::Electrical => "electrical",
            ServiceType::Cleaning => "cleaning",
            ServiceType::Carpentry => "carpentry",
            ServiceType::Painting => "painting",
            ServiceType::ApplianceRepair => "appliance_repair",
            ServiceType::PestControl => "pest_control",
            ServiceType::Nursing => "nursing",
            ServiceType::Physiotherapy => "physiotherapy",
            ServiceType::DoctorVisit => "doctor_visit",
            ServiceType::ElderlyCare => "elderly_care",
            ServiceType::Ambulance => "ambulance",
            ServiceType::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ServiceType::Plumbing => "Plumbing",
            ServiceType::Electrical => "Electrical",
            ServiceType::Cleaning => "Home Cleaning",
            ServiceType::Carpentry => "Carpentry",
            ServiceType::Painting => "Painting",
            ServiceType::ApplianceRepair => "Appliance Repair",
            ServiceType::PestControl => "Pest Control",
            ServiceType::Nursing => "Home Nursing",
            ServiceType::Physiotherapy => "Physiotherapy",
            ServiceType::DoctorVisit => "Doctor Home Visit",
            ServiceType::ElderlyCare => "Elderly Care",
            ServiceType::Ambulance => "Ambulance",
            ServiceType::Other => "Other",
        }
    }

    /// Home-services vs. medical grouping shown in the category list
    pub fn group(&self) -> &'static str {
        match self {
            ServiceType::Nursing
            | ServiceType::Physiotherapy
            | ServiceType::DoctorVisit
            | ServiceType::ElderlyCare
            | ServiceType::Ambulance => "medical",
            _ => "home",
        }
    }
}

/// Category entry returned by the categories endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ServiceCategory {
    pub id: &'static str,
    pub label: &'static str,
    pub group: &'static str,
}

impl From<ServiceType> for ServiceCategory {
    fn from(t: ServiceType) -> Self {
        Self {
            id: t.as_str(),
            label: t.label(),
            group: t.group(),
        }
    }
}

/// Business profile of a helper
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ServiceProvider {
    pub id: Uuid,
    pub user_id: Uuid,
    pub business_name: String,
    pub service_type: String,
    pub description: Option<String>,
    pub experience_years: i32,
    pub price_per_hour: Decimal,
    pub city: String,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub service_radius_km: f64,
    pub is_available: bool,
    pub is_verified: bool,
    pub is_emergency_provider: bool,
    pub rating_average: f64,
    pub rating_count: i32,
    pub completed_jobs: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl ServiceProvider {
    pub fn service_type_enum(&self) -> ServiceType {
        ServiceType::from_str(&self.service_type).unwrap_or(ServiceType::Other)
    }

    pub fn location(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(GeoPoint { lat, lon }),
            _ => None,
        }
    }
}

/// Provider with its distance from the search origin
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NearbyProvider {
    #[serde(flatten)]
    pub provider: ServiceProvider,
    pub distance_km: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_type_parsing() {
        assert_eq!(ServiceType::from_str("Plumbing").unwrap(), ServiceType::Plumbing);
        assert_eq!(
            ServiceType::from_str("appliance-repair").unwrap(),
            ServiceType::ApplianceRepair
        );
        assert_eq!(
            ServiceType::from_str("doctor visit").unwrap(),
            ServiceType::DoctorVisit
        );
        assert!(ServiceType::from_str("astrology").is_err());
    }

    #[test]
    fn test_service_type_groups() {
        assert_eq!(ServiceType::Nursing.group(), "medical");
        assert_eq!(ServiceType::Carpentry.group(), "home");
    }
}
