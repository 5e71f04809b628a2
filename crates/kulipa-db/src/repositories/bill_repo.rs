//! Bill repository implementation
//!
//! Bill issuance is the one multi-table write in the ledger: the bill, its
//! first invoice and the usage claim commit together or not at all.

use chrono::{DateTime, Utc};
use kulipa_core::{
    models::{Bill, BillPaymentStatus, BillSnapshot, Invoice},
    traits::BillRepository,
    AppError, AppResult,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{types::Json, PgExecutor};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::{decode_column, invoice_repo::insert_invoice_with, usage_repo::claim_usage};
use crate::store::commit;
use crate::PgStore;

pub(crate) async fn fetch_bill<'e, E: PgExecutor<'e>>(executor: E, id: Uuid) -> AppResult<Option<Bill>> {
    let row = sqlx::query_as::<sqlx::Postgres, BillRow>(
        r#"
        SELECT id, customer_id, plan_id, snapshot, total_amount, payment_status, created_at
        FROM bills
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await
    .map_err(|e| {
        error!("Database error finding bill {}: {}", id, e);
        AppError::Database(format!("Failed to find bill: {}", e))
    })?;

    row.map(TryInto::try_into).transpose()
}

/// Set a bill's payment status, only if it is currently `from`
pub(crate) async fn set_bill_status<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
    from: &[BillPaymentStatus],
    to: BillPaymentStatus,
) -> AppResult<bool> {
    let from: Vec<String> = from.iter().map(ToString::to_string).collect();

    let result = sqlx::query(
        r#"
        UPDATE bills
        SET payment_status = $3
        WHERE id = $1 AND payment_status = ANY($2)
        "#,
    )
    .bind(id)
    .bind(from)
    .bind(to.to_string())
    .execute(executor)
    .await
    .map_err(|e| {
        error!("Database error updating bill {} status: {}", id, e);
        AppError::Database(format!("Failed to update bill status: {}", e))
    })?;

    Ok(result.rows_affected() > 0)
}

#[async_trait]
impl BillRepository for PgStore {
    #[instrument(skip(self, bill, invoice, usage_ids), fields(bill_id = %bill.id, customer_id = bill.customer_id))]
    async fn persist_issuance(
        &self,
        bill: &Bill,
        invoice: &Invoice,
        usage_ids: &[i64],
    ) -> AppResult<()> {
        let mut tx = self.begin().await?;

        // Serializes issuance per customer
        let locked: Option<(i32,)> =
            sqlx::query_as("SELECT id FROM customers WHERE id = $1 FOR UPDATE")
                .bind(bill.customer_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| {
                    error!("Failed to lock customer {}: {}", bill.customer_id, e);
                    AppError::Database(format!("Failed to lock customer: {}", e))
                })?;

        if locked.is_none() {
            return Err(AppError::CustomerNotFound(bill.customer_id.to_string()));
        }

        sqlx::query(
            r#"
            INSERT INTO bills (id, customer_id, plan_id, snapshot, total_amount, payment_status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(bill.id)
        .bind(bill.customer_id)
        .bind(bill.plan_id)
        .bind(Json(&bill.snapshot))
        .bind(bill.total_amount)
        .bind(bill.payment_status.to_string())
        .bind(bill.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            error!("Database error inserting bill {}: {}", bill.id, e);
            AppError::Database(format!("Failed to create bill: {}", e))
        })?;

        insert_invoice_with(&mut *tx, invoice).await?;

        let claimed = claim_usage(&mut *tx, bill.customer_id, bill.id, usage_ids).await?;
        if claimed != usage_ids.len() as u64 {
            // Dropping the transaction rolls back the bill and invoice
            warn!(
                claimed,
                expected = usage_ids.len(),
                "Usage already claimed by a concurrent issuance"
            );
            return Err(AppError::UsageAlreadyClaimed(format!(
                "{} of {} records for customer {} were billed concurrently",
                usage_ids.len() as u64 - claimed,
                usage_ids.len(),
                bill.customer_id
            )));
        }

        commit(tx).await?;

        info!(
            invoice_number = %invoice.invoice_number,
            records = usage_ids.len(),
            "Bill issued"
        );
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_bill(&self, id: Uuid) -> AppResult<Option<Bill>> {
        debug!("Finding bill by id: {}", id);
        fetch_bill(&self.pool, id).await
    }

    #[instrument(skip(self))]
    async fn find_latest_bill(&self, customer_id: i32) -> AppResult<Option<Bill>> {
        let row = sqlx::query_as::<sqlx::Postgres, BillRow>(
            r#"
            SELECT id, customer_id, plan_id, snapshot, total_amount, payment_status, created_at
            FROM bills
            WHERE customer_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding latest bill for {}: {}", customer_id, e);
            AppError::Database(format!("Failed to find latest bill: {}", e))
        })?;

        row.map(TryInto::try_into).transpose()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BillRow {
    id: Uuid,
    customer_id: i32,
    plan_id: i32,
    snapshot: Json<BillSnapshot>,
    total_amount: Decimal,
    payment_status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<BillRow> for Bill {
    type Error = AppError;

    fn try_from(row: BillRow) -> AppResult<Self> {
        Ok(Self {
            id: row.id,
            customer_id: row.customer_id,
            plan_id: row.plan_id,
            snapshot: row.snapshot.0,
            total_amount: row.total_amount,
            payment_status: decode_column(
                BillPaymentStatus::from_str(&row.payment_status),
                "bill payment_status",
                &row.payment_status,
            )?,
            created_at: row.created_at,
        })
    }
}
