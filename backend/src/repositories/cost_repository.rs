use crate::models::{CostFactor, CostTemplate};
use rust_decimal::Decimal;
use sqlx::{PgPool, Result as SqlxResult};

pub struct CostRepository {
    pool: PgPool,
}

impl CostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All templates, optionally for one service type
    pub async fn list(&self, service_type: Option<&str>) -> SqlxResult<Vec<CostTemplate>> {
        sqlx::query_as::<_, CostTemplate>(
            r#"
            SELECT * FROM cost_templates
            WHERE $1::text IS NULL OR service_type = $1
            ORDER BY service_type, problem_type
            "#,
        )
        .bind(service_type)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn find(
        &self,
        service_type: &str,
        problem_type: &str,
    ) -> SqlxResult<Option<CostTemplate>> {
        sqlx::query_as::<_, CostTemplate>(
            "SELECT * FROM cost_templates WHERE service_type = $1 AND LOWER(problem_type) = LOWER($2)",
        )
        .bind(service_type)
        .bind(problem_type)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn create(
        &self,
        service_type: &str,
        problem_type: &str,
        base_price: Decimal,
        factors: &[CostFactor],
        unit: &str,
    ) -> SqlxResult<CostTemplate> {
        sqlx::query_as::<_, CostTemplate>(
            r#"
            INSERT INTO cost_templates (service_type, problem_type, base_price, factors, unit)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(service_type)
        .bind(problem_type)
        .bind(base_price)
        .bind(sqlx::types::Json(factors))
        .bind(unit)
        .fetch_one(&self.pool)
        .await
    }
}
