//! Cost estimation templates and the estimate calculation

use chrono::NaiveDateTime;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use super::provider::ServiceType;

/// Multiplier applied on top of all factors for urgent jobs (x1.5)
pub fn urgency_multiplier() -> Decimal {
    Decimal::new(15, 1)
}

/// Single pricing condition, e.g. `{"name": "old_building", "multiplier": 1.2}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostFactor {
    pub name: String,
    pub multiplier: f64,
}

/// Pricing template for a service/problem pair
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CostTemplate {
    pub id: Uuid,
    pub service_type: String,
    pub problem_type: String,
    pub base_price: Decimal,
    pub factors: Value,
    pub unit: String,
    pub created_at: NaiveDateTime,
}

impl CostTemplate {
    /// Get factors as a typed list, skipping malformed entries
    pub fn factors_vec(&self) -> Vec<CostFactor> {
        match &self.factors {
            Value::Array(arr) => arr
                .iter()
                .filter_map(|v| serde_json::from_value(v.clone()).ok())
                .collect(),
            _ => vec![],
        }
    }
}

/// Result returned to the caller
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub service_type: String,
    pub problem_type: Option<String>,
    pub base_price: Decimal,
    pub estimated_price: Decimal,
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub applied_factors: Vec<CostFactor>,
    pub urgent: bool,
    pub is_generic: bool,
    pub unit: String,
}

/// Generic base price per service type, used when no template matches
pub fn generic_base_price(service_type: ServiceType) -> Decimal {
    let rupees: i64 = match service_type {
        ServiceType::Plumbing => 400,
        ServiceType::Electrical => 350,
        ServiceType::Cleaning => 500,
        ServiceType::Carpentry => 450,
        ServiceType::Painting => 1500,
        ServiceType::ApplianceRepair => 400,
        ServiceType::PestControl => 1200,
        ServiceType::Nursing => 800,
        ServiceType::Physiotherapy => 700,
        ServiceType::DoctorVisit => 1000,
        ServiceType::ElderlyCare => 900,
        ServiceType::Ambulance => 1500,
        ServiceType::Other => 500,
    };
    Decimal::from(rupees)
}

/// Compute an estimate. With a template the base price is multiplied by every
/// template factor named in `conditions`; without one the generic base is used.
/// Fails when the factors push the price out of `Decimal` range.
pub fn compute_estimate(
    service_type: ServiceType,
    problem_type: Option<&str>,
    template: Option<&CostTemplate>,
    conditions: &[String],
    urgent: bool,
) -> Result<CostEstimate, String> {
    let (base_price, unit, applied_factors) = match template {
        Some(t) => {
            let wanted: Vec<String> = conditions.iter().map(|c| c.trim().to_lowercase()).collect();
            let applied: Vec<CostFactor> = t
                .factors_vec()
                .into_iter()
                .filter(|f| wanted.contains(&f.name.to_lowercase()))
                .collect();
            (t.base_price, t.unit.clone(), applied)
        }
        None => (generic_base_price(service_type), "job".to_string(), vec![]),
    };

    let overflow = || "Estimate is out of range for the selected conditions".to_string();

    let mut estimate = base_price;
    for factor in &applied_factors {
        let multiplier = Decimal::from_f64(factor.multiplier).unwrap_or(Decimal::ONE);
        estimate = estimate.checked_mul(multiplier).ok_or_else(overflow)?;
    }
    if urgent {
        estimate = estimate
            .checked_mul(urgency_multiplier())
            .ok_or_else(overflow)?;
    }
    let estimate = estimate.round_dp(2);
    let max_price = estimate
        .checked_mul(Decimal::new(12, 1))
        .ok_or_else(overflow)?
        .round_dp(2);

    Ok(CostEstimate {
        service_type: service_type.as_str().to_string(),
        problem_type: problem_type.map(|p| p.to_string()),
        base_price,
        estimated_price: estimate,
        min_price: (estimate * Decimal::new(9, 1)).round_dp(2),
        max_price,
        applied_factors,
        urgent,
        is_generic: template.is_none(),
        unit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> CostTemplate {
        CostTemplate {
            id: Uuid::new_v4(),
            service_type: "plumbing".to_string(),
            problem_type: "leak".to_string(),
            base_price: Decimal::new(300, 0),
            factors: serde_json::json!([
                {"name": "old_pipes", "multiplier": 1.5},
                {"name": "night", "multiplier": 2.0},
                {"bogus": true}
            ]),
            unit: "visit".to_string(),
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    #[test]
    fn test_factors_skip_malformed() {
        assert_eq!(template().factors_vec().len(), 2);
    }

    #[test]
    fn test_estimate_with_template() {
        let t = template();
        let est = compute_estimate(
            ServiceType::Plumbing,
            Some("leak"),
            Some(&t),
            &["old_pipes".to_string(), "unknown".to_string()],
            false,
        )
        .unwrap();
        assert_eq!(est.estimated_price, Decimal::new(450, 0));
        assert_eq!(est.applied_factors.len(), 1);
        assert!(!est.is_generic);
        assert_eq!(est.unit, "visit");
    }

    #[test]
    fn test_urgent_multiplier() {
        let est = compute_estimate(ServiceType::Electrical, None, None, &[], true).unwrap();
        assert_eq!(est.estimated_price, Decimal::new(525, 0));
        assert!(est.is_generic);
    }

    #[test]
    fn test_huge_multipliers_are_an_error() {
        let mut t = template();
        t.base_price = Decimal::new(9_999_999_999, 0);
        t.factors = serde_json::json!([
            {"name": "a", "multiplier": 1e15},
            {"name": "b", "multiplier": 1e15}
        ]);
        let result = compute_estimate(
            ServiceType::Plumbing,
            Some("leak"),
            Some(&t),
            &["a".to_string(), "b".to_string()],
            true,
        );
        assert!(result.is_err());
    }
}
