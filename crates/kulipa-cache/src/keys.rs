//! Cache key builders for Kulipa Billing
//!
//! # Key Patterns
//!
//! - `kulipa:plan:{plan_id}` - Cached plan definitions
//!
//! # Example
//!
//! ```
//! use kulipa_cache::keys;
//!
//! assert_eq!(keys::plan_key(7), "kulipa:plan:7");
//! ```

/// Namespace shared by every Kulipa key
pub const NAMESPACE: &str = "kulipa";

/// Prefix for cached plans
///
/// Format: `kulipa:plan:{plan_id}`
pub const PLAN_PREFIX: &str = "plan";

/// Build a cache key for a plan
#[inline]
pub fn plan_key(plan_id: i32) -> String {
    format!("{}:{}:{}", NAMESPACE, PLAN_PREFIX, plan_id)
}
