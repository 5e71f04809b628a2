//! Rating engine
//!
//! Resolves a customer's billable plan, reads the unbilled usage and prices
//! it with [`ChargeBreakdown::compute`]. Rating has no side effects, so the
//! same call backs charge previews, forecasts and bill issuance.

use kulipa_core::{
    models::{ChargeBreakdown, Customer, Plan, UsageRecord},
    traits::{CacheService, CustomerRepository, PlanRepository, UsageRepository},
    AppError, AppResult,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::catalog::{NoCache, PlanCatalog};

/// Outcome of rating a customer's unbilled usage
#[derive(Debug, Clone, Serialize)]
pub struct RatedUsage {
    pub customer: Customer,
    pub plan: Plan,
    pub breakdown: ChargeBreakdown,
    /// Exactly the records the breakdown aggregated
    pub consumed: Vec<UsageRecord>,
}

impl RatedUsage {
    pub fn consumed_ids(&self) -> Vec<i64> {
        self.consumed.iter().map(|u| u.id).collect()
    }
}

pub struct RatingEngine<S, K = NoCache> {
    store: Arc<S>,
    catalog: Arc<PlanCatalog<S, K>>,
    tax_rate: Decimal,
}

impl<S, K> RatingEngine<S, K>
where
    S: CustomerRepository + PlanRepository + UsageRepository,
    K: CacheService,
{
    pub fn new(store: Arc<S>, catalog: Arc<PlanCatalog<S, K>>, tax_rate: Decimal) -> Self {
        Self {
            store,
            catalog,
            tax_rate,
        }
    }

    pub fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }

    /// Resolve a customer together with the plan their usage is rated on
    #[instrument(skip(self))]
    pub async fn billable_customer(&self, customer_id: i32) -> AppResult<(Customer, Plan)> {
        let customer = self
            .store
            .find_customer(customer_id)
            .await?
            .ok_or_else(|| AppError::CustomerNotFound(customer_id.to_string()))?;

        let plan_id = customer.plan_id.ok_or_else(|| {
            AppError::NoBillablePlan(format!("customer {} has no plan assigned", customer_id))
        })?;

        let plan = self.catalog.billable(customer_id, plan_id).await?;
        Ok((customer, plan))
    }

    /// Price all unbilled usage of a customer
    #[instrument(skip(self))]
    pub async fn compute_charges(&self, customer_id: i32) -> AppResult<RatedUsage> {
        let (customer, plan) = self.billable_customer(customer_id).await?;
        let consumed = self.store.find_unbilled(customer_id).await?;
        let breakdown = ChargeBreakdown::compute(&plan, &consumed, self.tax_rate)?;

        debug!(
            records = consumed.len(),
            total = %breakdown.total,
            "Rated unbilled usage for customer {}",
            customer_id
        );

        Ok(RatedUsage {
            customer,
            plan,
            breakdown,
            consumed,
        })
    }
}
