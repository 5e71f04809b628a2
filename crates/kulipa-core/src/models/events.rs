//! Billing lifecycle events
//!
//! Published after the state change they describe has been committed.
//! The payload is the post-transition entity state.

use serde::{Deserialize, Serialize};

use super::{Bill, Invoice, InvoiceStatus, Payment};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum BillingEvent {
    InvoiceIssued { bill: Bill, invoice: Invoice },
    InvoiceStatusChanged { invoice: Invoice, from: InvoiceStatus },
    PaymentRecorded { payment: Payment },
    PaymentCompleted { payment: Payment, bill: Bill, invoice: Option<Invoice> },
    PaymentFailed { payment: Payment },
}

impl BillingEvent {
    /// Stable event name, matches the serialized tag
    pub fn name(&self) -> &'static str {
        match self {
            BillingEvent::InvoiceIssued { .. } => "invoice_issued",
            BillingEvent::InvoiceStatusChanged { .. } => "invoice_status_changed",
            BillingEvent::PaymentRecorded { .. } => "payment_recorded",
            BillingEvent::PaymentCompleted { .. } => "payment_completed",
            BillingEvent::PaymentFailed { .. } => "payment_failed",
        }
    }

    /// Customer the event concerns
    pub fn customer_id(&self) -> i32 {
        match self {
            BillingEvent::InvoiceIssued { invoice, .. }
            | BillingEvent::InvoiceStatusChanged { invoice, .. } => invoice.customer_id,
            BillingEvent::PaymentRecorded { payment }
            | BillingEvent::PaymentCompleted { payment, .. }
            | BillingEvent::PaymentFailed { payment } => payment.customer_id,
        }
    }
}
