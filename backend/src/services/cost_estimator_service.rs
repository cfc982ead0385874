use crate::error::{AppError, AppResult};
use crate::models::cost::compute_estimate;
use crate::models::{CostEstimate, CostFactor, CostTemplate, ServiceType};
use crate::repositories::CostRepository;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateRequest {
    pub service_type: String,
    pub problem_type: Option<String>,
    #[serde(default)]
    pub conditions: Vec<String>,
    #[serde(default)]
    pub urgent: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTemplateRequest {
    pub service_type: String,
    pub problem_type: String,
    pub base_price: Decimal,
    #[serde(default)]
    pub factors: Vec<CostFactor>,
    pub unit: Option<String>,
}

/// Largest multiplier a single template factor may carry
pub const MAX_FACTOR_MULTIPLIER: f64 = 100.0;

/// Validate factor multipliers and names
pub fn validate_factors(factors: &[CostFactor]) -> AppResult<()> {
    let mut seen = HashSet::new();
    for factor in factors {
        let name = factor.name.trim().to_lowercase();
        if name.is_empty() {
            return Err(AppError::Validation("Factor name is required".into()));
        }
        if !seen.insert(name) {
            return Err(AppError::Validation(format!(
                "Factor '{}' is listed more than once",
                factor.name
            )));
        }
        if !factor.multiplier.is_finite()
            || factor.multiplier <= 0.0
            || factor.multiplier > MAX_FACTOR_MULTIPLIER
        {
            return Err(AppError::Validation(format!(
                "Factor '{}' needs a multiplier above 0 and at most {}",
                factor.name, MAX_FACTOR_MULTIPLIER
            )));
        }
    }
    Ok(())
}

/// Template-driven price estimates with a generic fallback
pub struct CostEstimatorService {
    cost_repo: Arc<CostRepository>,
}

impl CostEstimatorService {
    pub fn new(cost_repo: Arc<CostRepository>) -> Self {
        Self { cost_repo }
    }

    pub async fn templates(&self, service_type: Option<&str>) -> AppResult<Vec<CostTemplate>> {
        let service_type = service_type
            .filter(|s| !s.trim().is_empty())
            .map(|s| ServiceType::from_str(s).map_err(AppError::Validation))
            .transpose()?;
        Ok(self
            .cost_repo
            .list(service_type.map(|t| t.as_str()))
            .await?)
    }

    pub async fn estimate(&self, req: &EstimateRequest) -> AppResult<CostEstimate> {
        let service_type =
            ServiceType::from_str(&req.service_type).map_err(AppError::Validation)?;
        let problem_type = req
            .problem_type
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty());

        let template = match problem_type {
            Some(problem) => self.cost_repo.find(service_type.as_str(), problem).await?,
            None => None,
        };

        if template.is_none() {
            debug!(
                "No template for {}/{:?}; using generic estimate",
                service_type.as_str(),
                problem_type
            );
        }

        compute_estimate(
            service_type,
            problem_type,
            template.as_ref(),
            &req.conditions,
            req.urgent,
        )
        .map_err(AppError::Validation)
    }

    pub async fn create_template(&self, req: CreateTemplateRequest) -> AppResult<CostTemplate> {
        let service_type =
            ServiceType::from_str(&req.service_type).map_err(AppError::Validation)?;
        let problem_type = req.problem_type.trim().to_lowercase();
        if problem_type.is_empty() {
            return Err(AppError::Validation("problemType is required".into()));
        }
        if req.base_price <= Decimal::ZERO {
            return Err(AppError::Validation("basePrice must be positive".into()));
        }
        validate_factors(&req.factors)?;

        let template = self
            .cost_repo
            .create(
                service_type.as_str(),
                &problem_type,
                req.base_price,
                &req.factors,
                req.unit.as_deref().unwrap_or("job"),
            )
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                    AppError::Conflict("A template for this problem already exists".into())
                }
                other => AppError::Sqlx(other),
            })?;

        info!(
            "Cost template created: {}/{}",
            template.service_type, template.problem_type
        );
        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factor_validation() {
        let ok = vec![CostFactor {
            name: "weekend".into(),
            multiplier: 1.1,
        }];
        assert!(validate_factors(&ok).is_ok());

        let zero = vec![CostFactor {
            name: "free".into(),
            multiplier: 0.0,
        }];
        assert!(validate_factors(&zero).is_err());

        let unnamed = vec![CostFactor {
            name: " ".into(),
            multiplier: 1.2,
        }];
        assert!(validate_factors(&unnamed).is_err());

        let huge = vec![CostFactor {
            name: "gold_plated".into(),
            multiplier: 1e15,
        }];
        assert!(validate_factors(&huge).is_err());

        let duplicated = vec![
            CostFactor {
                name: "night".into(),
                multiplier: 1.5,
            },
            CostFactor {
                name: "Night".into(),
                multiplier: 2.0,
            },
        ];
        assert!(validate_factors(&duplicated).is_err());
    }

    #[test]
    fn test_estimate_request_defaults() {
        let req: EstimateRequest =
            serde_json::from_str(r#"{"serviceType": "plumbing"}"#).unwrap();
        assert!(req.conditions.is_empty());
        assert!(!req.urgent);
        assert!(req.problem_type.is_none());
    }
}
