//! Usage and billing DTOs
//!
//! Request and response types for usage intake, charge previews and bill
//! issuance.

use super::common::non_negative;
use chrono::{DateTime, Utc};
use kulipa_core::models::{
    Bill, ChargeBreakdown, Forecast, Invoice, NewUsageRecord, UsageRecord, UsageType,
};
use kulipa_core::AppError;
use kulipa_services::{IssuedBill, RatedUsage};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Metered usage submitted by a metering collaborator
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UsageCreateRequest {
    #[validate(range(min = 1))]
    pub customer_id: i32,

    #[validate(range(min = 1))]
    pub plan_id: i32,

    /// call, sms or data
    pub usage_type: String,

    /// Quantity in the unit of the usage type
    #[validate(custom(function = "non_negative"))]
    pub quantity: Decimal,

    /// When the usage happened (defaults to now)
    pub recorded_at: Option<DateTime<Utc>>,
}

impl UsageCreateRequest {
    pub fn to_record(&self) -> Result<NewUsageRecord, AppError> {
        let usage_type = UsageType::from_str(self.usage_type.trim()).ok_or_else(|| {
            AppError::Validation(format!("Invalid usage type: {}", self.usage_type))
        })?;

        Ok(NewUsageRecord {
            customer_id: self.customer_id,
            plan_id: self.plan_id,
            usage_type,
            quantity: self.quantity,
            recorded_at: self.recorded_at.unwrap_or_else(Utc::now),
        })
    }
}

/// Usage record response
#[derive(Debug, Clone, Serialize)]
pub struct UsageResponse {
    pub id: i64,
    pub customer_id: i32,
    pub usage_type: UsageType,
    pub quantity: Decimal,
    pub unit: &'static str,
    pub recorded_at: DateTime<Utc>,
    pub billed: bool,
}

impl From<UsageRecord> for UsageResponse {
    fn from(record: UsageRecord) -> Self {
        Self {
            id: record.id,
            customer_id: record.customer_id,
            usage_type: record.usage_type,
            quantity: record.quantity,
            unit: record.usage_type.unit(),
            recorded_at: record.recorded_at,
            billed: record.billed,
        }
    }
}

/// Charge preview for the current unbilled usage
#[derive(Debug, Clone, Serialize)]
pub struct ChargesResponse {
    pub customer_id: i32,
    pub plan_id: i32,
    pub plan_name: String,
    pub unbilled_records: usize,
    pub breakdown: ChargeBreakdown,
}

impl From<RatedUsage> for ChargesResponse {
    fn from(rated: RatedUsage) -> Self {
        Self {
            customer_id: rated.customer.id,
            plan_id: rated.plan.id,
            plan_name: rated.plan.name,
            unbilled_records: rated.consumed.len(),
            breakdown: rated.breakdown.rounded(),
        }
    }
}

/// Result of a bill issuance
#[derive(Debug, Clone, Serialize)]
pub struct IssuedBillResponse {
    pub bill: Bill,
    pub invoice: Invoice,
    pub breakdown: ChargeBreakdown,
}

impl From<IssuedBill> for IssuedBillResponse {
    fn from(issued: IssuedBill) -> Self {
        Self {
            bill: issued.bill,
            invoice: issued.invoice,
            breakdown: issued.breakdown.rounded(),
        }
    }
}

/// Month-end forecast response
#[derive(Debug, Clone, Serialize)]
pub struct ForecastResponse {
    #[serde(flatten)]
    pub forecast: Forecast,
}

impl From<Forecast> for ForecastResponse {
    fn from(forecast: Forecast) -> Self {
        Self {
            forecast: Forecast {
                current: forecast.current.rounded(),
                projected: forecast.projected.rounded(),
                ..forecast
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn usage_request(usage_type: &str, quantity: Decimal) -> UsageCreateRequest {
        UsageCreateRequest {
            customer_id: 1,
            plan_id: 1,
            usage_type: usage_type.to_string(),
            quantity,
            recorded_at: None,
        }
    }

    #[test]
    fn test_usage_request_validation() {
        assert!(usage_request("call", dec!(12.5)).validate().is_ok());
        assert!(usage_request("call", dec!(-1)).validate().is_err());

        let mut req = usage_request("sms", dec!(1));
        req.customer_id = 0;
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_usage_request_to_record() {
        let record = usage_request(" DATA ", dec!(2048)).to_record().unwrap();
        assert_eq!(record.usage_type, UsageType::Data);
        assert_eq!(record.quantity, dec!(2048));

        assert!(usage_request("fax", dec!(1)).to_record().is_err());
    }
}
