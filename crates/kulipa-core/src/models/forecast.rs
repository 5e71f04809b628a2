//! Month-end forecast
//!
//! A linear projection of the current partial-period charges to the full
//! calendar month. Pure reporting: nothing is persisted or claimed.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::charges::checked;
use super::{round_currency, ChargeBreakdown};
use crate::AppResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastConfidence {
    Medium,
    High,
}

impl fmt::Display for ForecastConfidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForecastConfidence::Medium => write!(f, "medium"),
            ForecastConfidence::High => write!(f, "high"),
        }
    }
}

/// Projected full-period amounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub base_price: Decimal,
    pub usage_charges: Decimal,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl Projection {
    pub fn rounded(&self) -> Self {
        Self {
            base_price: round_currency(self.base_price),
            usage_charges: round_currency(self.usage_charges),
            subtotal: round_currency(self.subtotal),
            tax: round_currency(self.tax),
            total: round_currency(self.total),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast {
    pub customer_id: i32,
    pub as_of: DateTime<Utc>,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub days_elapsed: u32,
    pub days_in_period: u32,
    /// Charges accrued so far
    pub current: ChargeBreakdown,
    pub projected: Projection,
    pub confidence: ForecastConfidence,
}

/// Number of days in a calendar month
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    match (
        NaiveDate::from_ymd_opt(year, month, 1),
        NaiveDate::from_ymd_opt(next_year, next_month, 1),
    ) {
        (Some(start), Some(next)) => (next - start).num_days() as u32,
        _ => 30,
    }
}

impl Forecast {
    /// Project `current` to the end of the calendar month containing `as_of`
    ///
    /// `projected usage = usage_charges * days_in_period / days_elapsed`;
    /// the base price is charged once per period and is not scaled.
    pub fn project(
        customer_id: i32,
        current: ChargeBreakdown,
        as_of: DateTime<Utc>,
        high_confidence_after_day: u32,
    ) -> AppResult<Self> {
        let date = as_of.date_naive();
        let days_in_period = days_in_month(date.year(), date.month());
        let days_elapsed = date.day().max(1);

        let usage_charges = checked(
            current
                .usage_charges
                .checked_mul(Decimal::from(days_in_period))
                .and_then(|scaled| scaled.checked_div(Decimal::from(days_elapsed))),
            "projected usage charges",
        )?;
        let subtotal = checked(current.base_price.checked_add(usage_charges), "projected subtotal")?;
        let tax = checked(subtotal.checked_mul(current.tax_rate), "projected tax")?;
        let total = checked(subtotal.checked_add(tax), "projected total")?;

        let confidence = if days_elapsed > high_confidence_after_day {
            ForecastConfidence::High
        } else {
            ForecastConfidence::Medium
        };

        let period_start = date.with_day(1).unwrap_or(date);
        let period_end = date.with_day(days_in_period).unwrap_or(date);

        Ok(Self {
            customer_id,
            as_of,
            period_start,
            period_end,
            days_elapsed,
            days_in_period,
            projected: Projection {
                base_price: current.base_price,
                usage_charges,
                subtotal,
                tax,
                total,
            },
            current,
            confidence,
        })
    }
}
