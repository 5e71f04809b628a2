//! Payment DTOs
//!
//! Direct payment creation and the mobile-money settlement callback.

use super::common::positive;
use kulipa_core::models::{NewPayment, PaymentStatus, SettlementNotice};
use kulipa_core::AppError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Payment creation request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PaymentCreateRequest {
    pub bill_id: Uuid,

    #[validate(range(min = 1))]
    pub customer_id: i32,

    #[validate(custom(function = "positive"))]
    pub amount: Decimal,

    #[validate(length(min = 1, max = 50, message = "Payment method is required"))]
    pub method: String,

    pub invoice_id: Option<Uuid>,

    /// Generated when absent
    #[validate(length(min = 1, max = 64))]
    pub receipt_number: Option<String>,

    #[validate(length(max = 20))]
    pub phone_number: Option<String>,

    /// pending (default) or completed
    pub status: Option<String>,
}

impl PaymentCreateRequest {
    pub fn to_new_payment(&self) -> Result<NewPayment, AppError> {
        let status = match self.status.as_deref() {
            None => PaymentStatus::Pending,
            Some(s) => PaymentStatus::from_str(s.trim())
                .ok_or_else(|| AppError::Validation(format!("Invalid payment status: {}", s)))?,
        };

        Ok(NewPayment {
            bill_id: self.bill_id,
            customer_id: self.customer_id,
            amount: self.amount,
            method: self.method.trim().to_string(),
            invoice_id: self.invoice_id,
            receipt_number: self.receipt_number.clone(),
            phone_number: self.phone_number.clone(),
            status,
        })
    }
}

/// Mobile-money settlement callback
///
/// Field names follow the provider's payload; snake_case is accepted too.
#[derive(Debug, Clone, Deserialize)]
pub struct SettlementCallbackRequest {
    #[serde(rename = "MpesaReceiptNumber", alias = "receipt_number")]
    pub receipt_number: String,

    #[serde(rename = "Amount", alias = "amount")]
    pub amount: Decimal,

    #[serde(rename = "BillRefNumber", alias = "bill_reference")]
    pub bill_reference: String,

    #[serde(rename = "MSISDN", alias = "phone_number", default)]
    pub phone_number: Option<String>,
}

impl From<SettlementCallbackRequest> for SettlementNotice {
    fn from(req: SettlementCallbackRequest) -> Self {
        SettlementNotice {
            receipt_number: req.receipt_number,
            amount: req.amount,
            bill_reference: req.bill_reference,
            phone_number: req.phone_number,
        }
    }
}

/// Acknowledgement returned to the settlement provider
#[derive(Debug, Clone, Serialize)]
pub struct SettlementAck {
    pub payment_id: Uuid,
    pub receipt_number: String,
    pub duplicate: bool,
}
