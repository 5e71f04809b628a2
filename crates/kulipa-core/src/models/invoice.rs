//! Invoice model
//!
//! An invoice is the payable document derived from a bill. Status moves
//! are restricted: `paid` and `cancelled` are terminal.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::Bill;

/// Invoice status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    #[default]
    Pending,
    Paid,
    Overdue,
    Cancelled,
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvoiceStatus::Pending => write!(f, "pending"),
            InvoiceStatus::Paid => write!(f, "paid"),
            InvoiceStatus::Overdue => write!(f, "overdue"),
            InvoiceStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl InvoiceStatus {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(InvoiceStatus::Pending),
            "paid" => Some(InvoiceStatus::Paid),
            "overdue" => Some(InvoiceStatus::Overdue),
            "cancelled" | "canceled" => Some(InvoiceStatus::Cancelled),
            _ => None,
        }
    }

    /// Invoice still expects money
    pub fn is_open(&self) -> bool {
        matches!(self, InvoiceStatus::Pending | InvoiceStatus::Overdue)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_open()
    }

    /// Whether a manual override may move an invoice from `self` to `next`
    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        self.is_open() && *self != next
    }
}

/// Invoice entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    /// Unique identifier (UUID v7)
    pub id: Uuid,

    /// Bill this invoice collects
    pub bill_id: Uuid,

    /// Customer owning the bill
    pub customer_id: i32,

    /// Globally unique, traceable to the bill
    pub invoice_number: String,

    pub issue_date: DateTime<Utc>,

    pub due_date: DateTime<Utc>,

    /// Amount the customer owes, currency precision
    pub amount_due: Decimal,

    pub status: InvoiceStatus,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Build an unpersisted invoice for a bill
    ///
    /// `sequence` numbers the invoices of one bill, starting at 1.
    pub fn for_bill(
        bill: &Bill,
        prefix: &str,
        sequence: u32,
        issue_date: DateTime<Utc>,
        due_date: DateTime<Utc>,
        amount_due: Decimal,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            bill_id: bill.id,
            customer_id: bill.customer_id,
            invoice_number: Self::number_for(prefix, bill.id, sequence),
            issue_date,
            due_date,
            amount_due,
            status: InvoiceStatus::Pending,
            updated_at: issue_date,
        }
    }

    /// Derive an invoice number from the bill id and the invoice sequence
    ///
    /// The tail of a v7 UUID is its random part, so two bills never share
    /// the bill component; invoices of one bill differ by sequence.
    pub fn number_for(prefix: &str, bill_id: Uuid, sequence: u32) -> String {
        let hex = bill_id.simple().to_string();
        let tail = &hex[hex.len() - 12..];
        format!("{}-{}-{:03}", prefix, tail.to_uppercase(), sequence)
    }

    /// Due date for an invoice issued at `issue_date` with `grace_days`
    pub fn default_due_date(issue_date: DateTime<Utc>, grace_days: i64) -> DateTime<Utc> {
        issue_date + Duration::days(grace_days)
    }

    /// Open and past its due date at `as_of`
    pub fn is_past_due(&self, as_of: DateTime<Utc>) -> bool {
        matches!(self.status, InvoiceStatus::Pending) && self.due_date < as_of
    }
}
