//! Customer model
//!
//! Customers are managed by the CRUD layer; the billing engine reads them
//! to resolve the plan a bill is rated against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Customer status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

impl fmt::Display for CustomerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CustomerStatus::Active => write!(f, "active"),
            CustomerStatus::Inactive => write!(f, "inactive"),
            CustomerStatus::Suspended => write!(f, "suspended"),
        }
    }
}

impl CustomerStatus {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "active" => Some(CustomerStatus::Active),
            "inactive" => Some(CustomerStatus::Inactive),
            "suspended" => Some(CustomerStatus::Suspended),
            _ => None,
        }
    }
}

/// Customer entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: i32,
    pub name: String,
    pub phone_number: String,
    pub email: Option<String>,
    /// Assigned plan; `None` means the customer cannot be billed
    pub plan_id: Option<i32>,
    pub status: CustomerStatus,
    pub created_at: DateTime<Utc>,
}

impl Default for Customer {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            phone_number: String::new(),
            email: None,
            plan_id: None,
            status: CustomerStatus::Active,
            created_at: Utc::now(),
        }
    }
}
