//! Usage ledger models
//!
//! Usage records are appended by metering collaborators and claimed exactly
//! once by bill issuance.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Usage type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageType {
    /// Voice call, measured in minutes
    Call,
    /// Text message, measured in messages
    Sms,
    /// Data session, measured in plan data units
    Data,
}

impl UsageType {
    /// Every usage type, in rating order
    pub const ALL: [UsageType; 3] = [UsageType::Call, UsageType::Sms, UsageType::Data];

    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "call" => Some(UsageType::Call),
            "sms" => Some(UsageType::Sms),
            "data" => Some(UsageType::Data),
            _ => None,
        }
    }

    /// Unit the quantity of this usage type is expressed in
    pub fn unit(&self) -> &'static str {
        match self {
            UsageType::Call => "minutes",
            UsageType::Sms => "messages",
            UsageType::Data => "units",
        }
    }
}

impl fmt::Display for UsageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UsageType::Call => write!(f, "call"),
            UsageType::Sms => write!(f, "sms"),
            UsageType::Data => write!(f, "data"),
        }
    }
}

/// One decimal amount per usage type
///
/// Used for aggregated totals, plan allowances, overage rates and charges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageAmounts {
    pub call: Decimal,
    pub sms: Decimal,
    pub data: Decimal,
}

impl UsageAmounts {
    pub fn new(call: Decimal, sms: Decimal, data: Decimal) -> Self {
        Self { call, sms, data }
    }

    #[inline]
    pub fn get(&self, usage_type: UsageType) -> Decimal {
        match usage_type {
            UsageType::Call => self.call,
            UsageType::Sms => self.sms,
            UsageType::Data => self.data,
        }
    }

    pub fn get_mut(&mut self, usage_type: UsageType) -> &mut Decimal {
        match usage_type {
            UsageType::Call => &mut self.call,
            UsageType::Sms => &mut self.sms,
            UsageType::Data => &mut self.data,
        }
    }

    /// Sum across all usage types
    pub fn sum(&self) -> Decimal {
        self.call + self.sms + self.data
    }

    /// Build a new set by applying `f` to each usage type
    pub fn from_fn(mut f: impl FnMut(UsageType) -> Decimal) -> Self {
        Self {
            call: f(UsageType::Call),
            sms: f(UsageType::Sms),
            data: f(UsageType::Data),
        }
    }
}

/// Usage record entity
///
/// `billed` flips to true exactly once, when a bill claims the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Unique identifier
    pub id: i64,

    /// Customer the usage belongs to
    pub customer_id: i32,

    /// Plan the customer was on when the usage was metered
    pub plan_id: i32,

    /// Kind of usage
    pub usage_type: UsageType,

    /// Quantity in the unit of `usage_type`
    pub quantity: Decimal,

    /// When the usage happened
    pub recorded_at: DateTime<Utc>,

    /// Whether a bill has consumed this record
    pub billed: bool,

    /// Bill that consumed this record
    pub bill_id: Option<Uuid>,
}

impl UsageRecord {
    /// Snapshot entry stored on the consuming bill
    pub fn summary(&self) -> UsageSummary {
        UsageSummary {
            id: self.id,
            usage_type: self.usage_type,
            quantity: self.quantity,
            recorded_at: self.recorded_at,
        }
    }
}

/// Immutable copy of a usage record kept on a bill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub id: i64,
    pub usage_type: UsageType,
    pub quantity: Decimal,
    pub recorded_at: DateTime<Utc>,
}

/// Largest quantity a single usage record may carry, as stored by `NUMERIC(18, 4)`
pub const MAX_USAGE_QUANTITY: Decimal =
    Decimal::from_parts(2_808_348_671, 232_830_643, 0, false, 4);

/// Usage record as supplied by a metering collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUsageRecord {
    pub customer_id: i32,
    pub plan_id: i32,
    pub usage_type: UsageType,
    pub quantity: Decimal,
    pub recorded_at: DateTime<Utc>,
}

impl NewUsageRecord {
    pub fn new(customer_id: i32, plan_id: i32, usage_type: UsageType, quantity: Decimal) -> Self {
        Self {
            customer_id,
            plan_id,
            usage_type,
            quantity,
            recorded_at: Utc::now(),
        }
    }

    /// Validate metered quantity
    pub fn validate(&self) -> Result<(), String> {
        if self.quantity < Decimal::ZERO {
            return Err(format!(
                "Usage quantity cannot be negative: {} {}",
                self.quantity,
                self.usage_type.unit()
            ));
        }
        if self.quantity > MAX_USAGE_QUANTITY {
            return Err(format!(
                "Usage quantity exceeds {}: {} {}",
                MAX_USAGE_QUANTITY,
                self.quantity,
                self.usage_type.unit()
            ));
        }

        Ok(())
    }
}
