//! Plan repository implementation

use chrono::{DateTime, Utc};
use kulipa_core::{
    models::{Plan, PlanStatus, UsageAmounts},
    traits::PlanRepository,
    AppError, AppResult,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{debug, error, instrument};

use crate::PgStore;

#[async_trait]
impl PlanRepository for PgStore {
    #[instrument(skip(self))]
    async fn find_plan(&self, id: i32) -> AppResult<Option<Plan>> {
        debug!("Finding plan by id: {}", id);

        let result = sqlx::query_as::<sqlx::Postgres, PlanRow>(
            r#"
            SELECT
                id, name, base_price,
                call_allowance, sms_allowance, data_allowance,
                call_overage_rate, sms_overage_rate, data_overage_rate,
                status, created_at, updated_at
            FROM plans
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding plan {}: {}", id, e);
            AppError::Database(format!("Failed to find plan: {}", e))
        })?;

        Ok(result.map(Into::into))
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct PlanRow {
    id: i32,
    name: String,
    base_price: Decimal,
    call_allowance: Decimal,
    sms_allowance: Decimal,
    data_allowance: Decimal,
    call_overage_rate: Decimal,
    sms_overage_rate: Decimal,
    data_overage_rate: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PlanRow> for Plan {
    fn from(row: PlanRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            base_price: row.base_price,
            allowance: UsageAmounts::new(row.call_allowance, row.sms_allowance, row.data_allowance),
            overage_rate: UsageAmounts::new(
                row.call_overage_rate,
                row.sms_overage_rate,
                row.data_overage_rate,
            ),
            // Unknown status values are never billable
            status: PlanStatus::from_str(&row.status).unwrap_or(PlanStatus::Inactive),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
