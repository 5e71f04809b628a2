//! Bill model
//!
//! A bill is the persisted outcome of one rating computation. Its snapshot
//! keeps the breakdown and the consumed usage so the bill reads the same
//! even after the ledger or the plan change.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{round_currency, ChargeBreakdown, UsageRecord, UsageSummary};

/// Bill payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BillPaymentStatus {
    /// No payment has been recorded
    #[default]
    Unpaid,
    /// A payment is awaiting settlement
    Pending,
    /// A completed payment settled the bill
    Paid,
}

impl fmt::Display for BillPaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BillPaymentStatus::Unpaid => write!(f, "unpaid"),
            BillPaymentStatus::Pending => write!(f, "pending"),
            BillPaymentStatus::Paid => write!(f, "paid"),
        }
    }
}

impl BillPaymentStatus {
    /// Parse from string (case-insensitive, tolerant of stray whitespace)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "unpaid" => Some(BillPaymentStatus::Unpaid),
            "pending" => Some(BillPaymentStatus::Pending),
            "paid" => Some(BillPaymentStatus::Paid),
            _ => None,
        }
    }
}

/// Historical record of what a bill charged for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillSnapshot {
    /// Breakdown at full precision, as rated
    pub breakdown: ChargeBreakdown,

    /// The usage records the bill consumed
    pub usage: Vec<UsageSummary>,
}

/// Bill entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    /// Unique identifier (UUID v7)
    pub id: Uuid,

    /// Billed customer
    pub customer_id: i32,

    /// Plan the usage was rated against
    pub plan_id: i32,

    /// Rating snapshot
    pub snapshot: BillSnapshot,

    /// Total rounded to currency precision
    pub total_amount: Decimal,

    /// Payment status, changed only by payment reconciliation
    pub payment_status: BillPaymentStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Bill {
    /// Build an unpersisted bill from a rating result
    pub fn new(
        customer_id: i32,
        plan_id: i32,
        breakdown: ChargeBreakdown,
        consumed: &[UsageRecord],
        created_at: DateTime<Utc>,
    ) -> Self {
        let total_amount = round_currency(breakdown.total);

        Self {
            id: Uuid::now_v7(),
            customer_id,
            plan_id,
            snapshot: BillSnapshot {
                breakdown,
                usage: consumed.iter().map(UsageRecord::summary).collect(),
            },
            total_amount,
            payment_status: BillPaymentStatus::Unpaid,
            created_at,
        }
    }

    /// Ids of the usage records this bill consumed
    pub fn consumed_usage_ids(&self) -> Vec<i64> {
        self.snapshot.usage.iter().map(|u| u.id).collect()
    }

    pub fn is_paid(&self) -> bool {
        matches!(self.payment_status, BillPaymentStatus::Paid)
    }
}
