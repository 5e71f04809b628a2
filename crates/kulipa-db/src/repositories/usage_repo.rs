//! Usage ledger repository implementation

use chrono::{DateTime, Utc};
use kulipa_core::{
    models::{NewUsageRecord, UsageRecord, UsageType},
    traits::UsageRepository,
    AppError, AppResult,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgExecutor;
use tracing::{debug, error, instrument};
use uuid::Uuid;

use super::decode_column;
use crate::PgStore;

/// Flip unbilled records to billed for `bill_id`
///
/// Returns the number of records claimed. Records already billed, or owned
/// by another customer, are left untouched and not counted.
pub(crate) async fn claim_usage<'e, E: PgExecutor<'e>>(
    executor: E,
    customer_id: i32,
    bill_id: Uuid,
    usage_ids: &[i64],
) -> AppResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE usage_records
        SET billed = TRUE, bill_id = $2
        WHERE id = ANY($1)
          AND customer_id = $3
          AND billed = FALSE
        "#,
    )
    .bind(usage_ids)
    .bind(bill_id)
    .bind(customer_id)
    .execute(executor)
    .await
    .map_err(|e| {
        error!("Database error claiming usage for bill {}: {}", bill_id, e);
        AppError::Database(format!("Failed to mark usage billed: {}", e))
    })?;

    Ok(result.rows_affected())
}

#[async_trait]
impl UsageRepository for PgStore {
    #[instrument(skip(self, record), fields(customer_id = record.customer_id))]
    async fn append_usage(&self, record: &NewUsageRecord) -> AppResult<UsageRecord> {
        record.validate().map_err(AppError::Validation)?;

        let row = sqlx::query_as::<sqlx::Postgres, UsageRow>(
            r#"
            INSERT INTO usage_records (customer_id, plan_id, usage_type, quantity, recorded_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, customer_id, plan_id, usage_type, quantity, recorded_at, billed, bill_id
            "#,
        )
        .bind(record.customer_id)
        .bind(record.plan_id)
        .bind(record.usage_type.to_string())
        .bind(record.quantity)
        .bind(record.recorded_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error appending usage: {}", e);
            AppError::Database(format!("Failed to append usage: {}", e))
        })?;

        row.try_into()
    }

    #[instrument(skip(self))]
    async fn find_unbilled(&self, customer_id: i32) -> AppResult<Vec<UsageRecord>> {
        debug!("Finding unbilled usage for customer {}", customer_id);

        let rows = sqlx::query_as::<sqlx::Postgres, UsageRow>(
            r#"
            SELECT id, customer_id, plan_id, usage_type, quantity, recorded_at, billed, bill_id
            FROM usage_records
            WHERE customer_id = $1 AND billed = FALSE
            ORDER BY recorded_at, id
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding unbilled usage: {}", e);
            AppError::Database(format!("Failed to fetch unbilled usage: {}", e))
        })?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    #[instrument(skip(self))]
    async fn find_usage_for_bill(&self, bill_id: Uuid) -> AppResult<Vec<UsageRecord>> {
        let rows = sqlx::query_as::<sqlx::Postgres, UsageRow>(
            r#"
            SELECT id, customer_id, plan_id, usage_type, quantity, recorded_at, billed, bill_id
            FROM usage_records
            WHERE bill_id = $1
            ORDER BY recorded_at, id
            "#,
        )
        .bind(bill_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding usage for bill {}: {}", bill_id, e);
            AppError::Database(format!("Failed to fetch bill usage: {}", e))
        })?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UsageRow {
    id: i64,
    customer_id: i32,
    plan_id: i32,
    usage_type: String,
    quantity: Decimal,
    recorded_at: DateTime<Utc>,
    billed: bool,
    bill_id: Option<Uuid>,
}

impl TryFrom<UsageRow> for UsageRecord {
    type Error = AppError;

    fn try_from(row: UsageRow) -> AppResult<Self> {
        Ok(Self {
            id: row.id,
            customer_id: row.customer_id,
            plan_id: row.plan_id,
            usage_type: decode_column(
                UsageType::from_str(&row.usage_type),
                "usage_type",
                &row.usage_type,
            )?,
            quantity: row.quantity,
            recorded_at: row.recorded_at,
            billed: row.billed,
            bill_id: row.bill_id,
        })
    }
}
