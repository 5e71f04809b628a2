//! Kulipa Billing Database Layer
//!
//! This crate provides the stores behind the billing services:
//!
//! - [`PgStore`]: PostgreSQL via sqlx, one transaction per state change
//! - [`MemoryStore`]: the same contracts over in-process state, for tests
//!   and local runs
//! - Connection pool creation and schema migrations

pub mod memory;
pub mod pool;
pub mod repositories;
pub mod store;

pub use memory::{MemoryStore, StoreFault};
pub use pool::{create_pool, run_migrations};
pub use store::PgStore;

// Re-export commonly used types
pub use kulipa_core::{AppError, AppResult};
pub use sqlx::{PgPool, Postgres, Transaction};
