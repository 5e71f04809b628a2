//! Application configuration
//!
//! This module provides centralized configuration management using the `config` crate.
//! Configuration can be loaded from environment variables and config files.

use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::env;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    #[serde(default)]
    pub billing: BillingConfig,
}

/// HTTP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_workers() -> usize {
    num_cpus::get()
}

fn default_timeout() -> u64 {
    30
}

/// Database configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection acquire timeout in seconds
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// Idle connection timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    2
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_idle_timeout() -> u64 {
    600
}

/// Redis configuration
///
/// Optional: without it the plan catalog reads straight from the store.
#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,
}

/// Billing-specific configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BillingConfig {
    /// Flat tax rate applied to the bill subtotal
    #[serde(default = "default_tax_rate")]
    pub tax_rate: Decimal,

    /// Days between invoice issue and due date
    #[serde(default = "default_grace_days")]
    pub invoice_grace_days: i64,

    /// ISO 4217 currency code for presentation
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Prefix for generated invoice numbers
    #[serde(default = "default_invoice_prefix")]
    pub invoice_prefix: String,

    /// Payment method recorded for settlement callbacks that omit one
    #[serde(default = "default_settlement_method")]
    pub settlement_method: String,

    /// Plan catalog cache TTL in seconds
    #[serde(default = "default_plan_cache_ttl")]
    pub plan_cache_ttl_secs: u64,

    /// Day of the period after which forecasts are reported as high confidence
    #[serde(default = "default_high_confidence_day")]
    pub forecast_high_confidence_day: u32,
}

fn default_tax_rate() -> Decimal {
    dec!(0.16)
}

fn default_grace_days() -> i64 {
    30
}

fn default_currency() -> String {
    "KES".to_string()
}

fn default_invoice_prefix() -> String {
    "INV".to_string()
}

fn default_settlement_method() -> String {
    "mobile_money".to_string()
}

fn default_plan_cache_ttl() -> u64 {
    300
}

fn default_high_confidence_day() -> u32 {
    15
}

impl BillingConfig {
    /// Reject settings that would break the non-negativity of charges
    pub fn validate(&self) -> Result<(), String> {
        if self.tax_rate < Decimal::ZERO {
            return Err("Tax rate cannot be negative".to_string());
        }

        if self.invoice_grace_days < 0 {
            return Err("Invoice grace period cannot be negative".to_string());
        }

        if self.invoice_prefix.trim().is_empty() {
            return Err("Invoice prefix cannot be empty".to_string());
        }

        Ok(())
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            tax_rate: default_tax_rate(),
            invoice_grace_days: default_grace_days(),
            currency: default_currency(),
            invoice_prefix: default_invoice_prefix(),
            settlement_method: default_settlement_method(),
            plan_cache_ttl_secs: default_plan_cache_ttl(),
            forecast_high_confidence_day: default_high_confidence_day(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("server.timeout_secs", 30)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("billing.tax_rate", "0.16")?
            .set_default("billing.invoice_grace_days", 30)?
            .set_default("billing.currency", "KES")?
            .set_default("billing.invoice_prefix", "INV")?
            .set_default("billing.settlement_method", "mobile_money")?
            .set_default("billing.plan_cache_ttl_secs", 300)?
            .set_default("billing.forecast_high_confidence_day", 15)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables with KULIPA_ prefix
            .add_source(
                Environment::with_prefix("KULIPA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app_config: AppConfig = config.try_deserialize()?;
        app_config
            .billing
            .validate()
            .map_err(ConfigError::Message)?;

        Ok(app_config)
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("KULIPA").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Get the server bind address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
