//! Invoice repository implementation

use chrono::{DateTime, Utc};
use kulipa_core::{
    models::{Invoice, InvoiceStatus},
    traits::InvoiceRepository,
    AppError, AppResult,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgExecutor;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::decode_column;
use crate::store::violates_unique;
use crate::PgStore;

const INVOICE_NUMBER_KEY: &str = "invoices_invoice_number_key";

pub(crate) async fn insert_invoice_with<'e, E: PgExecutor<'e>>(
    executor: E,
    invoice: &Invoice,
) -> AppResult<Invoice> {
    let row = sqlx::query_as::<sqlx::Postgres, InvoiceRow>(
        r#"
        INSERT INTO invoices (
            id, bill_id, customer_id, invoice_number,
            issue_date, due_date, amount_due, status, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING
            id, bill_id, customer_id, invoice_number,
            issue_date, due_date, amount_due, status, updated_at
        "#,
    )
    .bind(invoice.id)
    .bind(invoice.bill_id)
    .bind(invoice.customer_id)
    .bind(&invoice.invoice_number)
    .bind(invoice.issue_date)
    .bind(invoice.due_date)
    .bind(invoice.amount_due)
    .bind(invoice.status.to_string())
    .bind(invoice.updated_at)
    .fetch_one(executor)
    .await
    .map_err(|e| {
        if violates_unique(&e, INVOICE_NUMBER_KEY) {
            warn!("Invoice number collision: {}", invoice.invoice_number);
            return AppError::DuplicateInvoiceNumber(invoice.invoice_number.clone());
        }
        error!("Database error inserting invoice: {}", e);
        AppError::Database(format!("Failed to create invoice: {}", e))
    })?;

    row.try_into()
}

pub(crate) async fn fetch_invoice<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
) -> AppResult<Option<Invoice>> {
    let row = sqlx::query_as::<sqlx::Postgres, InvoiceRow>(
        r#"
        SELECT
            id, bill_id, customer_id, invoice_number,
            issue_date, due_date, amount_due, status, updated_at
        FROM invoices
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await
    .map_err(|e| {
        error!("Database error finding invoice {}: {}", id, e);
        AppError::Database(format!("Failed to find invoice: {}", e))
    })?;

    row.map(TryInto::try_into).transpose()
}

/// Mark every open invoice of a bill paid
///
/// A bill can carry re-issued invoices; once it is paid none of them may
/// stay open. Returns the number of invoices settled.
pub(crate) async fn settle_bill_invoices<'e, E: PgExecutor<'e>>(
    executor: E,
    bill_id: Uuid,
) -> AppResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE invoices
        SET status = 'paid', updated_at = NOW()
        WHERE bill_id = $1 AND status IN ('pending', 'overdue')
        "#,
    )
    .bind(bill_id)
    .execute(executor)
    .await
    .map_err(|e| {
        error!("Database error settling invoices of bill {}: {}", bill_id, e);
        AppError::Database(format!("Failed to settle invoices: {}", e))
    })?;

    Ok(result.rows_affected())
}

#[async_trait]
impl InvoiceRepository for PgStore {
    #[instrument(skip(self, invoice), fields(invoice_number = %invoice.invoice_number))]
    async fn insert_invoice(&self, invoice: &Invoice) -> AppResult<Invoice> {
        insert_invoice_with(&self.pool, invoice).await
    }

    #[instrument(skip(self))]
    async fn find_invoice(&self, id: Uuid) -> AppResult<Option<Invoice>> {
        debug!("Finding invoice by id: {}", id);
        fetch_invoice(&self.pool, id).await
    }

    #[instrument(skip(self))]
    async fn find_invoices_for_bill(&self, bill_id: Uuid) -> AppResult<Vec<Invoice>> {
        let rows = sqlx::query_as::<sqlx::Postgres, InvoiceRow>(
            r#"
            SELECT
                id, bill_id, customer_id, invoice_number,
                issue_date, due_date, amount_due, status, updated_at
            FROM invoices
            WHERE bill_id = $1
            ORDER BY issue_date DESC, id DESC
            "#,
        )
        .bind(bill_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding invoices for bill {}: {}", bill_id, e);
            AppError::Database(format!("Failed to fetch invoices: {}", e))
        })?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    #[instrument(skip(self))]
    async fn update_invoice_status(
        &self,
        id: Uuid,
        from: InvoiceStatus,
        to: InvoiceStatus,
    ) -> AppResult<Option<Invoice>> {
        let row = sqlx::query_as::<sqlx::Postgres, InvoiceRow>(
            r#"
            UPDATE invoices
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING
                id, bill_id, customer_id, invoice_number,
                issue_date, due_date, amount_due, status, updated_at
            "#,
        )
        .bind(id)
        .bind(from.to_string())
        .bind(to.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error updating invoice {}: {}", id, e);
            AppError::Database(format!("Failed to update invoice status: {}", e))
        })?;

        row.map(TryInto::try_into).transpose()
    }

    #[instrument(skip(self))]
    async fn mark_overdue(&self, as_of: DateTime<Utc>) -> AppResult<Vec<Invoice>> {
        let rows = sqlx::query_as::<sqlx::Postgres, InvoiceRow>(
            r#"
            UPDATE invoices
            SET status = 'overdue', updated_at = NOW()
            WHERE status = 'pending' AND due_date < $1
            RETURNING
                id, bill_id, customer_id, invoice_number,
                issue_date, due_date, amount_due, status, updated_at
            "#,
        )
        .bind(as_of)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error marking invoices overdue: {}", e);
            AppError::Database(format!("Failed to mark invoices overdue: {}", e))
        })?;

        if !rows.is_empty() {
            info!("Marked {} invoices overdue", rows.len());
        }

        rows.into_iter().map(TryInto::try_into).collect()
    }

    #[instrument(skip(self))]
    async fn outstanding_total(&self) -> AppResult<Decimal> {
        let total: (Decimal,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(amount_due), 0)
            FROM invoices
            WHERE status IN ('pending', 'overdue')
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error summing outstanding invoices: {}", e);
            AppError::Database(format!("Failed to sum outstanding invoices: {}", e))
        })?;

        Ok(total.0)
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: Uuid,
    bill_id: Uuid,
    customer_id: i32,
    invoice_number: String,
    issue_date: DateTime<Utc>,
    due_date: DateTime<Utc>,
    amount_due: Decimal,
    status: String,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = AppError;

    fn try_from(row: InvoiceRow) -> AppResult<Self> {
        Ok(Self {
            id: row.id,
            bill_id: row.bill_id,
            customer_id: row.customer_id,
            invoice_number: row.invoice_number,
            issue_date: row.issue_date,
            due_date: row.due_date,
            amount_due: row.amount_due,
            status: decode_column(
                InvoiceStatus::from_str(&row.status),
                "invoice status",
                &row.status,
            )?,
            updated_at: row.updated_at,
        })
    }
}
