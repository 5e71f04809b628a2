//! Payment repository implementation
//!
//! Payment writes carry their bill and invoice side effects in the same
//! transaction. Status changes are conditional on `status = 'pending'`, so
//! of two racing terminal transitions exactly one updates a row.

use chrono::{DateTime, Utc};
use kulipa_core::{
    models::{BillPaymentStatus, Payment, PaymentInsert, PaymentStatus},
    traits::{PaymentRepository, PaymentTransition},
    AppError, AppResult,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgExecutor};
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use super::bill_repo::{fetch_bill, set_bill_status};
use super::decode_column;
use super::invoice_repo::{fetch_invoice, settle_bill_invoices};
use crate::store::commit;
use crate::PgStore;

const PAYMENT_COLUMNS: &str = r#"
    id, customer_id, bill_id, invoice_id, amount, method,
    receipt_number, phone_number, status, created_at, updated_at
"#;

async fn fetch_payment_by_id<'e, E: PgExecutor<'e>>(
    executor: E,
    id: Uuid,
) -> AppResult<Option<Payment>> {
    let sql = format!("SELECT {} FROM payments WHERE id = $1", PAYMENT_COLUMNS);

    let row = sqlx::query_as::<sqlx::Postgres, PaymentRow>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(|e| {
            error!("Database error finding payment {}: {}", id, e);
            AppError::Database(format!("Failed to find payment: {}", e))
        })?;

    row.map(TryInto::try_into).transpose()
}

async fn fetch_payment_by_receipt<'e, E: PgExecutor<'e>>(
    executor: E,
    receipt: &str,
) -> AppResult<Option<Payment>> {
    let sql = format!(
        "SELECT {} FROM payments WHERE receipt_number = $1",
        PAYMENT_COLUMNS
    );

    let row = sqlx::query_as::<sqlx::Postgres, PaymentRow>(&sql)
        .bind(receipt)
        .fetch_optional(executor)
        .await
        .map_err(|e| {
            error!("Database error finding payment by receipt {}: {}", receipt, e);
            AppError::Database(format!("Failed to find payment: {}", e))
        })?;

    row.map(TryInto::try_into).transpose()
}

/// Apply a completed payment to its bill and every open invoice of it
async fn settle(conn: &mut PgConnection, payment: &Payment) -> AppResult<()> {
    set_bill_status(
        &mut *conn,
        payment.bill_id,
        &[BillPaymentStatus::Unpaid, BillPaymentStatus::Pending],
        BillPaymentStatus::Paid,
    )
    .await?;

    let settled = settle_bill_invoices(&mut *conn, payment.bill_id).await?;
    debug!(bill_id = %payment.bill_id, settled, "Invoices settled");

    Ok(())
}

#[async_trait]
impl PaymentRepository for PgStore {
    #[instrument(skip(self, payment), fields(receipt = %payment.receipt_number, bill_id = %payment.bill_id))]
    async fn insert_payment(&self, payment: &Payment) -> AppResult<PaymentInsert> {
        let mut tx = self.begin().await?;

        let inserted = sqlx::query_as::<sqlx::Postgres, PaymentRow>(
            r#"
            INSERT INTO payments (
                id, customer_id, bill_id, invoice_id, amount, method,
                receipt_number, phone_number, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (receipt_number) DO NOTHING
            RETURNING
                id, customer_id, bill_id, invoice_id, amount, method,
                receipt_number, phone_number, status, created_at, updated_at
            "#,
        )
        .bind(payment.id)
        .bind(payment.customer_id)
        .bind(payment.bill_id)
        .bind(payment.invoice_id)
        .bind(payment.amount)
        .bind(&payment.method)
        .bind(&payment.receipt_number)
        .bind(&payment.phone_number)
        .bind(payment.status.to_string())
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            error!("Database error inserting payment: {}", e);
            AppError::Database(format!("Failed to create payment: {}", e))
        })?;

        let Some(row) = inserted else {
            let existing = fetch_payment_by_receipt(&mut *tx, &payment.receipt_number).await?;
            return match existing {
                Some(existing) => {
                    debug!("Receipt {} already recorded", payment.receipt_number);
                    Ok(PaymentInsert::Duplicate(existing))
                }
                None => Err(AppError::Internal(format!(
                    "receipt {} conflicted but no payment holds it",
                    payment.receipt_number
                ))),
            };
        };

        let created: Payment = row.try_into()?;
        match created.status {
            PaymentStatus::Pending => {
                set_bill_status(
                    &mut *tx,
                    created.bill_id,
                    &[BillPaymentStatus::Unpaid],
                    BillPaymentStatus::Pending,
                )
                .await?;
            }
            PaymentStatus::Completed => settle(&mut *tx, &created).await?,
            PaymentStatus::Failed => {}
        }

        commit(tx).await?;

        info!(payment_id = %created.id, status = %created.status, "Payment recorded");
        Ok(PaymentInsert::Created(created))
    }

    #[instrument(skip(self))]
    async fn find_payment(&self, id: Uuid) -> AppResult<Option<Payment>> {
        fetch_payment_by_id(&self.pool, id).await
    }

    #[instrument(skip(self))]
    async fn find_payment_by_receipt(&self, receipt: &str) -> AppResult<Option<Payment>> {
        fetch_payment_by_receipt(&self.pool, receipt).await
    }

    #[instrument(skip(self))]
    async fn transition_payment(
        &self,
        id: Uuid,
        to: PaymentStatus,
    ) -> AppResult<PaymentTransition> {
        if !to.is_terminal() {
            return Err(AppError::Validation(format!(
                "payments can only move to a terminal status, got {}",
                to
            )));
        }

        let mut tx = self.begin().await?;

        let updated = sqlx::query_as::<sqlx::Postgres, PaymentRow>(
            r#"
            UPDATE payments
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING
                id, customer_id, bill_id, invoice_id, amount, method,
                receipt_number, phone_number, status, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(to.to_string())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            error!("Database error updating payment {}: {}", id, e);
            AppError::Database(format!("Failed to update payment status: {}", e))
        })?;

        let Some(row) = updated else {
            return match fetch_payment_by_id(&mut *tx, id).await? {
                Some(current) => Ok(PaymentTransition::NotPending(current)),
                None => Err(AppError::PaymentNotFound(id.to_string())),
            };
        };

        let payment: Payment = row.try_into()?;
        match payment.status {
            PaymentStatus::Completed => settle(&mut *tx, &payment).await?,
            PaymentStatus::Failed => {
                let reverted = sqlx::query(
                    r#"
                    UPDATE bills
                    SET payment_status = 'unpaid'
                    WHERE id = $1
                      AND payment_status = 'pending'
                      AND NOT EXISTS (
                          SELECT 1 FROM payments WHERE bill_id = $1 AND status = 'pending'
                      )
                    "#,
                )
                .bind(payment.bill_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    error!("Database error reverting bill {}: {}", payment.bill_id, e);
                    AppError::Database(format!("Failed to revert bill status: {}", e))
                })?;
                if reverted.rows_affected() > 0 {
                    debug!("Bill {} returned to unpaid", payment.bill_id);
                }
            }
            PaymentStatus::Pending => {}
        }

        let bill = fetch_bill(&mut *tx, payment.bill_id)
            .await?
            .ok_or_else(|| AppError::BillNotFound(payment.bill_id.to_string()))?;
        let invoice = match payment.invoice_id {
            Some(invoice_id) => fetch_invoice(&mut *tx, invoice_id).await?,
            None => None,
        };

        commit(tx).await?;

        info!(payment_id = %payment.id, status = %payment.status, "Payment status updated");
        Ok(PaymentTransition::Applied {
            payment,
            bill,
            invoice,
        })
    }

    #[instrument(skip(self))]
    async fn completed_revenue(&self) -> AppResult<Decimal> {
        let total: (Decimal,) = sqlx::query_as(
            "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE status = 'completed'",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error summing revenue: {}", e);
            AppError::Database(format!("Failed to sum revenue: {}", e))
        })?;

        Ok(total.0)
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    customer_id: i32,
    bill_id: Uuid,
    invoice_id: Option<Uuid>,
    amount: Decimal,
    method: String,
    receipt_number: String,
    phone_number: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = AppError;

    fn try_from(row: PaymentRow) -> AppResult<Self> {
        Ok(Self {
            id: row.id,
            customer_id: row.customer_id,
            bill_id: row.bill_id,
            invoice_id: row.invoice_id,
            amount: row.amount,
            method: row.method,
            receipt_number: row.receipt_number,
            phone_number: row.phone_number,
            status: decode_column(
                PaymentStatus::from_str(&row.status),
                "payment status",
                &row.status,
            )?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
