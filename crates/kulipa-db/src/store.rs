//! PostgreSQL-backed billing store
//!
//! One `PgStore` implements every repository trait; the impls are split
//! across `repositories/`. Multi-row state changes run in a single
//! transaction and guard concurrent writers with conditional updates.

use kulipa_core::{AppError, AppResult};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::error;

/// PostgreSQL implementation of the billing repositories
#[derive(Clone)]
pub struct PgStore {
    pub(crate) pool: PgPool,
}

impl PgStore {
    /// Create a new store over a connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub(crate) async fn begin(&self) -> AppResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::Transaction(format!("Failed to start transaction: {}", e))
        })
    }
}

pub(crate) async fn commit(tx: Transaction<'static, Postgres>) -> AppResult<()> {
    tx.commit().await.map_err(|e| {
        error!("Failed to commit transaction: {}", e);
        AppError::Transaction(format!("Failed to commit transaction: {}", e))
    })
}

/// Whether `err` violated the named unique constraint
pub(crate) fn violates_unique(err: &sqlx::Error, constraint: &str) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation() && db.constraint() == Some(constraint))
        .unwrap_or(false)
}
