//! Bill and invoice issuance
//!
//! `issue_bill` rates the unbilled usage, then hands the bill, its invoice
//! and the consumed record ids to the store in one atomic write. The store
//! claims only records that are still unbilled, so of two concurrent
//! issuances over the same usage exactly one commits and the other gets a
//! `Conflict`.

use chrono::{DateTime, Utc};
use kulipa_core::{
    models::{round_currency, Bill, BillingEvent, ChargeBreakdown, Forecast, Invoice},
    traits::{BillingStore, CacheService, EventSink},
    AppError, AppResult, BillingConfig,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::catalog::NoCache;
use crate::constants::NOTHING_TO_BILL;
use crate::rating::RatingEngine;

/// A freshly issued bill with its first invoice
#[derive(Debug, Clone, Serialize)]
pub struct IssuedBill {
    pub bill: Bill,
    pub invoice: Invoice,
    /// Full-precision breakdown the bill was issued from
    pub breakdown: ChargeBreakdown,
}

/// Request for an invoice against an existing bill
///
/// The bill is taken from `bill_id`, or else is the most recent bill of
/// `customer_id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OneOffInvoice {
    pub bill_id: Option<Uuid>,
    pub customer_id: Option<i32>,
    pub due_date: Option<DateTime<Utc>>,
    pub amount_due: Option<Decimal>,
}

pub struct BillIssuer<S, K = NoCache> {
    store: Arc<S>,
    rating: Arc<RatingEngine<S, K>>,
    config: BillingConfig,
    events: Arc<dyn EventSink>,
}

impl<S: BillingStore, K: CacheService> BillIssuer<S, K> {
    pub fn new(
        store: Arc<S>,
        rating: Arc<RatingEngine<S, K>>,
        config: BillingConfig,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            store,
            rating,
            config,
            events,
        }
    }

    /// Rate and bill all unbilled usage of a customer
    #[instrument(skip(self))]
    pub async fn issue_bill(&self, customer_id: i32) -> AppResult<IssuedBill> {
        let rated = self.rating.compute_charges(customer_id).await?;

        if rated.consumed.is_empty() {
            warn!("Nothing to bill for customer {}", customer_id);
            return Err(AppError::Conflict(format!(
                "{} for customer {}",
                NOTHING_TO_BILL, customer_id
            )));
        }

        let now = Utc::now();
        let bill = Bill::new(
            customer_id,
            rated.plan.id,
            rated.breakdown.clone(),
            &rated.consumed,
            now,
        );
        let invoice = Invoice::for_bill(
            &bill,
            &self.config.invoice_prefix,
            1,
            now,
            Invoice::default_due_date(now, self.config.invoice_grace_days),
            bill.total_amount,
        );

        self.store
            .persist_issuance(&bill, &invoice, &rated.consumed_ids())
            .await?;

        info!(
            bill_id = %bill.id,
            invoice_number = %invoice.invoice_number,
            total = %bill.total_amount,
            "Issued bill for customer {}",
            customer_id
        );

        self.events.publish(BillingEvent::InvoiceIssued {
            bill: bill.clone(),
            invoice: invoice.clone(),
        });

        Ok(IssuedBill {
            bill,
            invoice,
            breakdown: rated.breakdown,
        })
    }

    /// Project the current period's charges to the end of the month
    ///
    /// Read-only: nothing is persisted and no usage is claimed.
    #[instrument(skip(self))]
    pub async fn forecast(&self, customer_id: i32, as_of: DateTime<Utc>) -> AppResult<Forecast> {
        let rated = self.rating.compute_charges(customer_id).await?;

        Forecast::project(
            customer_id,
            rated.breakdown,
            as_of,
            self.config.forecast_high_confidence_day,
        )
    }

    /// Issue another invoice for an existing bill without re-rating
    #[instrument(skip(self))]
    pub async fn issue_invoice_for_bill(&self, request: OneOffInvoice) -> AppResult<Invoice> {
        let bill = match (request.bill_id, request.customer_id) {
            (Some(bill_id), _) => self
                .store
                .find_bill(bill_id)
                .await?
                .ok_or_else(|| AppError::BillNotFound(bill_id.to_string()))?,
            (None, Some(customer_id)) => self
                .store
                .find_latest_bill(customer_id)
                .await?
                .ok_or_else(|| {
                    AppError::BillNotFound(format!("no bills for customer {}", customer_id))
                })?,
            (None, None) => {
                return Err(AppError::Validation(
                    "either a bill id or a customer id is required".to_string(),
                ))
            }
        };

        if let Some(customer_id) = request.customer_id {
            if customer_id != bill.customer_id {
                return Err(AppError::Validation(format!(
                    "bill {} does not belong to customer {}",
                    bill.id, customer_id
                )));
            }
        }

        if bill.is_paid() {
            return Err(AppError::InvalidState(format!(
                "bill {} is already paid",
                bill.id
            )));
        }

        let amount_due = round_currency(request.amount_due.unwrap_or(bill.total_amount));
        if amount_due < Decimal::ZERO {
            return Err(AppError::InvalidAmount(format!(
                "amount due cannot be negative: {}",
                amount_due
            )));
        }

        let now = Utc::now();
        let due_date = request
            .due_date
            .unwrap_or_else(|| Invoice::default_due_date(now, self.config.invoice_grace_days));
        if due_date < now {
            return Err(AppError::Validation(format!(
                "due date {} precedes issue date {}",
                due_date, now
            )));
        }

        // A concurrent re-issue picks the same sequence and fails on the
        // unique invoice number
        let sequence = self.store.find_invoices_for_bill(bill.id).await?.len() as u32 + 1;
        let invoice = Invoice::for_bill(
            &bill,
            &self.config.invoice_prefix,
            sequence,
            now,
            due_date,
            amount_due,
        );
        let invoice = self.store.insert_invoice(&invoice).await?;

        info!(
            bill_id = %bill.id,
            invoice_number = %invoice.invoice_number,
            "Issued one-off invoice"
        );

        self.events.publish(BillingEvent::InvoiceIssued {
            bill,
            invoice: invoice.clone(),
        });

        Ok(invoice)
    }
}
