//! Plan catalog
//!
//! Read-only plan lookups with an optional read-through cache. Cache errors
//! are logged and treated as misses; they never fail a lookup.

use async_trait::async_trait;
use kulipa_cache::keys::plan_key;
use kulipa_core::{
    models::Plan,
    traits::{CacheService, PlanRepository},
    AppError, AppResult,
};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Cache that stores nothing, for running the catalog uncached
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

#[async_trait]
impl CacheService for NoCache {
    async fn get<T: DeserializeOwned>(&self, _key: &str) -> Result<Option<T>, AppError> {
        Ok(None)
    }

    async fn set<T: Serialize + Send + Sync>(
        &self,
        _key: &str,
        _value: &T,
        _ttl_secs: u64,
    ) -> Result<(), AppError> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<bool, AppError> {
        Ok(false)
    }
}

/// Plan lookup service
pub struct PlanCatalog<S, K = NoCache> {
    store: Arc<S>,
    cache: Option<Arc<K>>,
    ttl_secs: u64,
}

impl<S: PlanRepository, K: CacheService> PlanCatalog<S, K> {
    pub fn new(store: Arc<S>, cache: Option<Arc<K>>, ttl_secs: u64) -> Self {
        Self {
            store,
            cache,
            ttl_secs,
        }
    }

    /// Find a plan, consulting the cache first
    #[instrument(skip(self))]
    pub async fn find(&self, plan_id: i32) -> AppResult<Option<Plan>> {
        let key = plan_key(plan_id);

        if let Some(cache) = &self.cache {
            match cache.get::<Plan>(&key).await {
                Ok(Some(plan)) => {
                    debug!("Plan cache HIT for {}", plan_id);
                    return Ok(Some(plan));
                }
                Ok(None) => debug!("Plan cache MISS for {}", plan_id),
                Err(e) => warn!("Cache error for plan {}: {}", plan_id, e),
            }
        }

        let plan = self.store.find_plan(plan_id).await?;

        if let (Some(cache), Some(plan)) = (&self.cache, &plan) {
            if let Err(e) = cache.set(&key, plan, self.ttl_secs).await {
                warn!("Failed to cache plan {}: {}", plan_id, e);
            }
        }

        Ok(plan)
    }

    /// Find a plan that usage can be rated against
    ///
    /// A missing or inactive plan leaves the customer without a billable
    /// plan, which is `InvalidState`.
    pub async fn billable(&self, customer_id: i32, plan_id: i32) -> AppResult<Plan> {
        match self.find(plan_id).await? {
            Some(plan) if plan.is_active() => Ok(plan),
            Some(_) => Err(AppError::NoBillablePlan(format!(
                "customer {} is on inactive plan {}",
                customer_id, plan_id
            ))),
            None => Err(AppError::NoBillablePlan(format!(
                "customer {} references missing plan {}",
                customer_id, plan_id
            ))),
        }
    }

    /// Drop a cached plan after it changed upstream
    pub async fn invalidate(&self, plan_id: i32) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.delete(&plan_key(plan_id)).await {
                warn!("Failed to invalidate plan {}: {}", plan_id, e);
            }
        }
    }
}
