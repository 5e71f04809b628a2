//! Invoice desk
//!
//! Read and maintain issued invoices: the detail view, the manual status
//! override and the overdue sweep run by an external scheduler. Bill
//! payment status is never touched here; only payment reconciliation
//! changes it.

use chrono::{DateTime, Utc};
use kulipa_core::{
    models::{Bill, BillingEvent, ChargeBreakdown, Invoice, InvoiceStatus, UsageSummary},
    traits::{BillRepository, EventSink, InvoiceRepository},
    AppError, AppResult,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Invoice together with the charges it collects
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDetail {
    pub invoice: Invoice,
    pub bill: Bill,
    /// Breakdown read from the bill snapshot, rounded for presentation
    pub breakdown: ChargeBreakdown,
    pub usage: Vec<UsageSummary>,
}

pub struct InvoiceDesk<S> {
    store: Arc<S>,
    events: Arc<dyn EventSink>,
}

impl<S: BillRepository + InvoiceRepository> InvoiceDesk<S> {
    pub fn new(store: Arc<S>, events: Arc<dyn EventSink>) -> Self {
        Self { store, events }
    }

    async fn invoice(&self, id: Uuid) -> AppResult<Invoice> {
        self.store
            .find_invoice(id)
            .await?
            .ok_or_else(|| AppError::InvoiceNotFound(id.to_string()))
    }

    /// Invoice detail with subtotal, tax and total taken from the bill
    #[instrument(skip(self))]
    pub async fn invoice_detail(&self, id: Uuid) -> AppResult<InvoiceDetail> {
        let invoice = self.invoice(id).await?;
        let bill = self
            .store
            .find_bill(invoice.bill_id)
            .await?
            .ok_or_else(|| AppError::BillNotFound(invoice.bill_id.to_string()))?;

        Ok(InvoiceDetail {
            breakdown: bill.snapshot.breakdown.rounded(),
            usage: bill.snapshot.usage.clone(),
            invoice,
            bill,
        })
    }

    /// Manually move an invoice to `to`
    ///
    /// Moving to the current status is a no-op. Paid and cancelled
    /// invoices are final.
    #[instrument(skip(self))]
    pub async fn override_status(&self, id: Uuid, to: InvoiceStatus) -> AppResult<Invoice> {
        let current = self.invoice(id).await?;
        if current.status == to {
            return Ok(current);
        }
        if !current.status.can_transition_to(to) {
            warn!("Rejected invoice {} override {} -> {}", id, current.status, to);
            return Err(AppError::IllegalTransition {
                from: current.status.to_string(),
                to: to.to_string(),
            });
        }

        match self
            .store
            .update_invoice_status(id, current.status, to)
            .await?
        {
            Some(updated) => {
                info!("Invoice {} moved {} -> {}", id, current.status, to);
                self.events.publish(BillingEvent::InvoiceStatusChanged {
                    invoice: updated.clone(),
                    from: current.status,
                });
                Ok(updated)
            }
            None => {
                // Lost a race; judge the request against the winner's state
                let latest = self.invoice(id).await?;
                if latest.status == to {
                    Ok(latest)
                } else {
                    Err(AppError::IllegalTransition {
                        from: latest.status.to_string(),
                        to: to.to_string(),
                    })
                }
            }
        }
    }

    /// Flip every pending invoice due before `as_of` to overdue
    #[instrument(skip(self))]
    pub async fn mark_overdue(&self, as_of: DateTime<Utc>) -> AppResult<usize> {
        let flipped = self.store.mark_overdue(as_of).await?;
        let count = flipped.len();

        for invoice in flipped {
            self.events.publish(BillingEvent::InvoiceStatusChanged {
                invoice,
                from: InvoiceStatus::Pending,
            });
        }

        if count > 0 {
            info!("{} invoices now overdue", count);
        }
        Ok(count)
    }
}
