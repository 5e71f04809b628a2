//! Payment models
//!
//! Payments settle bills. A payment starts `pending` (or `completed` when
//! the caller already holds a settlement confirmation) and moves forward
//! exactly once.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Awaiting settlement
    #[default]
    Pending,
    /// Funds received
    Completed,
    /// Settlement failed
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Completed => write!(f, "completed"),
            PaymentStatus::Failed => write!(f, "failed"),
        }
    }
}

impl PaymentStatus {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(PaymentStatus::Pending),
            "completed" => Some(PaymentStatus::Completed),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }

    /// Completed and failed payments never move again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    /// Only pending -> completed and pending -> failed are legal
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(self, PaymentStatus::Pending) && next.is_terminal()
    }
}

/// Payment entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub customer_id: i32,
    pub bill_id: Uuid,
    pub invoice_id: Option<Uuid>,
    pub amount: Decimal,
    pub method: String,

    /// Provider receipt or reference number, unique across payments
    pub receipt_number: String,

    /// Paying MSISDN for mobile-money settlements
    pub phone_number: Option<String>,

    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to record a payment against a bill
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayment {
    pub bill_id: Uuid,
    pub customer_id: i32,
    pub amount: Decimal,
    pub method: String,
    pub invoice_id: Option<Uuid>,
    pub receipt_number: Option<String>,
    pub phone_number: Option<String>,
    #[serde(default)]
    pub status: PaymentStatus,
}

impl NewPayment {
    pub fn validate(&self) -> Result<(), String> {
        if self.amount <= Decimal::ZERO {
            return Err(format!("payment amount must be positive, got {}", self.amount));
        }
        if self.method.trim().is_empty() {
            return Err("payment method is required".to_string());
        }
        if matches!(self.status, PaymentStatus::Failed) {
            return Err("a payment cannot be recorded as failed".to_string());
        }
        if let Some(receipt) = &self.receipt_number {
            if receipt.trim().is_empty() {
                return Err("receipt number must not be blank".to_string());
            }
        }
        Ok(())
    }

    /// Materialise the payment, generating a receipt number when absent
    ///
    /// Generated receipts embed the payment id, so they never collide.
    pub fn into_payment(self, now: DateTime<Utc>) -> Payment {
        let id = Uuid::now_v7();
        let receipt_number = self
            .receipt_number
            .map(|r| r.trim().to_string())
            .unwrap_or_else(|| format!("REC-{}", id.simple()));

        Payment {
            id,
            customer_id: self.customer_id,
            bill_id: self.bill_id,
            invoice_id: self.invoice_id,
            amount: self.amount,
            method: self.method,
            receipt_number,
            phone_number: self.phone_number,
            status: self.status,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Inbound settlement confirmation from a payment provider
///
/// Untrusted input: the bill reference may be malformed or unknown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementNotice {
    pub receipt_number: String,
    pub amount: Decimal,
    pub bill_reference: String,
    pub phone_number: Option<String>,
}

impl SettlementNotice {
    pub fn validate(&self) -> Result<(), String> {
        if self.receipt_number.trim().is_empty() {
            return Err("settlement receipt number is required".to_string());
        }
        if self.bill_reference.trim().is_empty() {
            return Err("settlement bill reference is required".to_string());
        }
        if self.amount <= Decimal::ZERO {
            return Err(format!("settlement amount must be positive, got {}", self.amount));
        }
        Ok(())
    }
}

/// Outcome of inserting a payment under a unique receipt number
#[derive(Debug, Clone)]
pub enum PaymentInsert {
    /// Row created
    Created(Payment),
    /// A payment with the same receipt number already existed
    Duplicate(Payment),
}

impl PaymentInsert {
    pub fn payment(&self) -> &Payment {
        match self {
            PaymentInsert::Created(p) | PaymentInsert::Duplicate(p) => p,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, PaymentInsert::Duplicate(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request() -> NewPayment {
        NewPayment {
            bill_id: Uuid::now_v7(),
            customer_id: 1,
            amount: dec!(17.40),
            method: "mobile_money".to_string(),
            invoice_id: None,
            receipt_number: None,
            phone_number: None,
            status: PaymentStatus::Pending,
        }
    }

    #[test]
    fn test_terminal_states_are_final() {
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Completed));
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Failed));
        assert!(!PaymentStatus::Pending.can_transition_to(PaymentStatus::Pending));
        assert!(!PaymentStatus::Completed.can_transition_to(PaymentStatus::Pending));
        assert!(!PaymentStatus::Completed.can_transition_to(PaymentStatus::Failed));
        assert!(!PaymentStatus::Failed.can_transition_to(PaymentStatus::Completed));
    }

    #[test]
    fn test_validate_rejects_bad_amounts() {
        let mut req = request();
        req.amount = dec!(0);
        assert!(req.validate().is_err());
        req.amount = dec!(-5);
        assert!(req.validate().is_err());
        req.amount = dec!(5);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_failed_on_creation() {
        let mut req = request();
        req.status = PaymentStatus::Failed;
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_receipt_number_fallback() {
        let now = Utc::now();
        let payment = request().into_payment(now);
        assert_eq!(
            payment.receipt_number,
            format!("REC-{}", payment.id.simple())
        );

        let other = request().into_payment(now);
        assert_ne!(payment.receipt_number, other.receipt_number);

        let mut req = request();
        req.receipt_number = Some(" QKX12AB ".to_string());
        assert_eq!(req.into_payment(now).receipt_number, "QKX12AB");
    }

    #[test]
    fn test_settlement_notice_validation() {
        let notice = SettlementNotice {
            receipt_number: "QKX12AB".to_string(),
            amount: dec!(17.40),
            bill_reference: " ".to_string(),
            phone_number: None,
        };
        assert!(notice.validate().is_err());
    }
}
