//! Customer lookups

use chrono::{DateTime, Utc};
use kulipa_core::{
    models::{Customer, CustomerStatus},
    traits::CustomerRepository,
    AppError, AppResult,
};
use async_trait::async_trait;
use tracing::{debug, error, instrument};

use crate::PgStore;

#[async_trait]
impl CustomerRepository for PgStore {
    #[instrument(skip(self))]
    async fn find_customer(&self, id: i32) -> AppResult<Option<Customer>> {
        debug!("Finding customer by id: {}", id);

        let result = sqlx::query_as::<sqlx::Postgres, CustomerRow>(
            r#"
            SELECT id, name, phone_number, email, plan_id, status, created_at
            FROM customers
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding customer {}: {}", id, e);
            AppError::Database(format!("Failed to find customer: {}", e))
        })?;

        Ok(result.map(Into::into))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: i32,
    name: String,
    phone_number: String,
    email: Option<String>,
    plan_id: Option<i32>,
    status: String,
    created_at: DateTime<Utc>,
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            phone_number: row.phone_number,
            email: row.email,
            plan_id: row.plan_id,
            status: CustomerStatus::from_str(&row.status).unwrap_or(CustomerStatus::Inactive),
            created_at: row.created_at,
        }
    }
}
