//! Plan model
//!
//! Plans carry the monthly base price, the allowance included per usage
//! type, and the per-unit overage rate charged beyond that allowance.
//! The billing engine only ever reads them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{UsageAmounts, UsageType};

/// Plan status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    #[default]
    Active,
    Inactive,
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStatus::Active => write!(f, "active"),
            PlanStatus::Inactive => write!(f, "inactive"),
        }
    }
}

impl PlanStatus {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(PlanStatus::Active),
            "inactive" => Some(PlanStatus::Inactive),
            _ => None,
        }
    }
}

/// Plan model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Unique plan ID
    pub id: i32,

    /// Human-readable plan name (e.g., "Basic Plan")
    pub name: String,

    /// Monthly base price
    pub base_price: Decimal,

    /// Quantity included per usage type before overage applies
    pub allowance: UsageAmounts,

    /// Per-unit price of usage beyond the allowance
    pub overage_rate: UsageAmounts,

    /// Whether the plan can be billed against
    pub status: PlanStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Plan {
    /// Check if plan is valid for billing
    pub fn is_active(&self) -> bool {
        matches!(self.status, PlanStatus::Active)
    }

    /// Included allowance for a usage type
    #[inline]
    pub fn allowance_for(&self, usage_type: UsageType) -> Decimal {
        self.allowance.get(usage_type).max(Decimal::ZERO)
    }

    /// Overage rate for a usage type, never negative
    #[inline]
    pub fn rate_for(&self, usage_type: UsageType) -> Decimal {
        self.overage_rate.get(usage_type).max(Decimal::ZERO)
    }

    /// Validate plan configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Plan name cannot be empty".to_string());
        }

        if self.base_price < Decimal::ZERO {
            return Err("Base price cannot be negative".to_string());
        }

        for usage_type in UsageType::ALL {
            if self.allowance.get(usage_type) < Decimal::ZERO {
                return Err(format!("{} allowance cannot be negative", usage_type));
            }
            if self.overage_rate.get(usage_type) < Decimal::ZERO {
                return Err(format!("{} overage rate cannot be negative", usage_type));
            }
        }

        Ok(())
    }
}

impl Default for Plan {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            base_price: Decimal::ZERO,
            allowance: UsageAmounts::default(),
            overage_rate: UsageAmounts::default(),
            status: PlanStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn create_test_plan() -> Plan {
        Plan {
            id: 1,
            name: "Basic Plan".to_string(),
            base_price: dec!(10),
            allowance: UsageAmounts::new(dec!(100), dec!(50), dec!(1024)),
            overage_rate: UsageAmounts::new(dec!(0.1), dec!(0.05), dec!(0.01)),
            ..Default::default()
        }
    }

    #[test]
    fn test_plan_validation() {
        let plan = create_test_plan();
        assert!(plan.validate().is_ok());
        assert!(plan.is_active());
    }

    #[test]
    fn test_negative_rate_rejected_and_clamped() {
        let mut plan = create_test_plan();
        plan.overage_rate.sms = dec!(-0.5);
        assert!(plan.validate().is_err());
        assert_eq!(plan.rate_for(UsageType::Sms), Decimal::ZERO);
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut plan = create_test_plan();
        plan.name = "  ".to_string();
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_plan_status_parse() {
        assert_eq!(PlanStatus::from_str("Inactive"), Some(PlanStatus::Inactive));
        assert_eq!(PlanStatus::from_str("retired"), None);
    }
}
