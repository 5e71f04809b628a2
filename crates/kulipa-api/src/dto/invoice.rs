//! Invoice DTOs

use super::common::non_negative;
use chrono::{DateTime, Utc};
use kulipa_core::models::{ChargeBreakdown, Invoice, UsageSummary};
use kulipa_core::AppError;
use kulipa_services::{InvoiceDetail, OneOffInvoice};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Request for an additional invoice against an existing bill
///
/// Either `bill_id` or `customer_id` must be given; with only a customer
/// the most recent bill is used.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct InvoiceCreateRequest {
    pub bill_id: Option<Uuid>,

    #[validate(range(min = 1))]
    pub customer_id: Option<i32>,

    pub due_date: Option<DateTime<Utc>>,

    #[validate(custom(function = "non_negative"))]
    pub amount_due: Option<Decimal>,
}

impl InvoiceCreateRequest {
    pub fn to_one_off(&self) -> Result<OneOffInvoice, AppError> {
        if self.bill_id.is_none() && self.customer_id.is_none() {
            return Err(AppError::Validation(
                "Either bill_id or customer_id is required".to_string(),
            ));
        }

        Ok(OneOffInvoice {
            bill_id: self.bill_id,
            customer_id: self.customer_id,
            due_date: self.due_date,
            amount_due: self.amount_due,
        })
    }
}

/// Invoice with its charges, as shown to the customer
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDetailResponse {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub bill_status: String,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub breakdown: ChargeBreakdown,
    pub usage: Vec<UsageSummary>,
}

impl From<InvoiceDetail> for InvoiceDetailResponse {
    fn from(detail: InvoiceDetail) -> Self {
        Self {
            bill_status: detail.bill.payment_status.to_string(),
            subtotal: detail.breakdown.subtotal,
            tax_rate: detail.breakdown.tax_rate,
            tax: detail.breakdown.tax,
            total: detail.breakdown.total,
            invoice: detail.invoice,
            breakdown: detail.breakdown,
            usage: detail.usage,
        }
    }
}

/// Outcome of an overdue sweep
#[derive(Debug, Clone, Serialize)]
pub struct OverdueSweepResponse {
    pub as_of: DateTime<Utc>,
    pub marked_overdue: usize,
}
