//! Kulipa Billing Core Library
//!
//! This crate provides the foundational types, traits, and error handling
//! for the Kulipa usage-rating and billing-lifecycle engine. It includes:
//!
//! - Domain models (Plan, UsageRecord, Bill, Invoice, Payment, etc.)
//! - Pure rating math (`ChargeBreakdown`, `Forecast`)
//! - Repository and cache traits consumed by the services crate
//! - Unified error handling with HTTP response mapping
//! - Application configuration

pub mod config;
pub mod error;
pub mod models;
pub mod traits;

pub use config::{AppConfig, BillingConfig};
pub use error::{AppError, ErrorKind};

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
