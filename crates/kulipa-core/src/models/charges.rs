//! Tiered overage rating
//!
//! `ChargeBreakdown::compute` is the single pricing rule of the engine:
//! the plan base price plus, per usage type, the usage beyond the
//! allowance times the overage rate, with a flat tax on the subtotal.
//! It is a pure function; nothing here touches storage.
//!
//! Amounts are accumulated at full decimal precision. Rounding to
//! currency precision happens only through [`round_currency`] and
//! [`ChargeBreakdown::rounded`], at presentation/settlement time.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::{Plan, UsageAmounts, UsageRecord, UsageType};
use crate::{AppError, AppResult};

/// Decimal places of presented and persisted currency amounts
pub const CURRENCY_DP: u32 = 2;

/// Usage beyond the allowance, never negative
#[inline]
pub fn overage(total_usage: Decimal, allowance: Decimal) -> Decimal {
    (total_usage - allowance).max(Decimal::ZERO)
}

/// Round an amount to currency precision (half away from zero)
#[inline]
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(CURRENCY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Lift a checked decimal operation into an `InvalidAmount` error
pub(crate) fn checked(value: Option<Decimal>, what: &str) -> AppResult<Decimal> {
    value.ok_or_else(|| AppError::InvalidAmount(format!("{} is out of range", what)))
}

/// Result of rating a customer's unbilled usage against their plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeBreakdown {
    /// Aggregated quantity per usage type
    pub totals: UsageAmounts,

    /// Quantity beyond the allowance per usage type
    pub overage: UsageAmounts,

    /// Overage quantity times overage rate per usage type
    pub overage_charge: UsageAmounts,

    /// Plan base price
    pub base_price: Decimal,

    /// Sum of overage charges
    pub usage_charges: Decimal,

    /// `base_price + usage_charges`
    pub subtotal: Decimal,

    /// Rate the tax was computed with
    pub tax_rate: Decimal,

    /// `subtotal * tax_rate`
    pub tax: Decimal,

    /// `subtotal + tax`
    pub total: Decimal,
}

impl ChargeBreakdown {
    /// Rate a set of usage records against a plan
    ///
    /// Fails with `InvalidAmount` when an aggregate leaves decimal range.
    pub fn compute(plan: &Plan, records: &[UsageRecord], tax_rate: Decimal) -> AppResult<Self> {
        let mut totals = UsageAmounts::default();
        for record in records {
            let total = totals.get_mut(record.usage_type);
            *total = checked(
                total.checked_add(record.quantity.max(Decimal::ZERO)),
                "usage total",
            )?;
        }

        Self::from_totals(plan, totals, tax_rate)
    }

    /// Rate already-aggregated totals against a plan
    pub fn from_totals(plan: &Plan, totals: UsageAmounts, tax_rate: Decimal) -> AppResult<Self> {
        let overage =
            UsageAmounts::from_fn(|t| self::overage(totals.get(t), plan.allowance_for(t)));

        let mut overage_charge = UsageAmounts::default();
        let mut usage_charges = Decimal::ZERO;
        for t in UsageType::ALL {
            let charge = checked(overage.get(t).checked_mul(plan.rate_for(t)), "overage charge")?;
            *overage_charge.get_mut(t) = charge;
            usage_charges = checked(usage_charges.checked_add(charge), "usage charges")?;
        }

        let base_price = plan.base_price.max(Decimal::ZERO);
        let tax_rate = tax_rate.max(Decimal::ZERO);
        let subtotal = checked(base_price.checked_add(usage_charges), "subtotal")?;
        let tax = checked(subtotal.checked_mul(tax_rate), "tax")?;
        let total = checked(subtotal.checked_add(tax), "total")?;

        Ok(Self {
            totals,
            overage,
            overage_charge,
            base_price,
            usage_charges,
            subtotal,
            tax_rate,
            tax,
            total,
        })
    }

    /// Copy with every currency field rounded for presentation
    pub fn rounded(&self) -> Self {
        Self {
            totals: self.totals,
            overage: self.overage,
            overage_charge: UsageAmounts::from_fn(|t| round_currency(self.overage_charge.get(t))),
            base_price: round_currency(self.base_price),
            usage_charges: round_currency(self.usage_charges),
            subtotal: round_currency(self.subtotal),
            tax_rate: self.tax_rate,
            tax: round_currency(self.tax),
            total: round_currency(self.total),
        }
    }

    /// Overage charge for one usage type
    pub fn charge_for(&self, usage_type: UsageType) -> Decimal {
        self.overage_charge.get(usage_type)
    }
}
