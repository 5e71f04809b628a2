//! Unified error handling for Kulipa Billing
//!
//! Every failure the engine can surface collapses into one of five
//! machine-readable kinds (`ErrorKind`). Storage and infrastructure
//! variants all report as `Internal`, and their detail is withheld from
//! untrusted callers by `public_message`.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Machine-readable error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    Conflict,
    Validation,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::InvalidState => write!(f, "invalid_state"),
            ErrorKind::Conflict => write!(f, "conflict"),
            ErrorKind::Validation => write!(f, "validation_error"),
            ErrorKind::Internal => write!(f, "internal"),
        }
    }
}

/// Main application error type
///
/// All errors in the application should be converted to this type.
/// It implements `ResponseError` for automatic HTTP response generation.
#[derive(Error, Debug)]
pub enum AppError {
    // ==================== Storage Errors ====================
    #[error("Database error: {0}")]
    Database(String),

    #[error("Database pool error: {0}")]
    Pool(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    // ==================== Cache Errors ====================
    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Cache connection failed: {0}")]
    CacheConnection(String),

    // ==================== Lookup Errors ====================
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    #[error("Plan not found: {0}")]
    PlanNotFound(String),

    #[error("Bill not found: {0}")]
    BillNotFound(String),

    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),

    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    #[error("Not found: {0}")]
    NotFound(String),

    // ==================== State Errors ====================
    #[error("Customer {0} has no billable plan")]
    NoBillablePlan(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    // ==================== Conflict Errors ====================
    #[error("Usage already billed: {0}")]
    UsageAlreadyClaimed(String),

    #[error("Duplicate invoice number: {0}")]
    DuplicateInvoiceNumber(String),

    #[error("Duplicate receipt number: {0}")]
    DuplicateReceipt(String),

    #[error("Illegal status transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    // ==================== Validation Errors ====================
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    // ==================== Internal Errors ====================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Classify this error into one of the five engine-level kinds
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::CustomerNotFound(_)
            | AppError::PlanNotFound(_)
            | AppError::BillNotFound(_)
            | AppError::InvoiceNotFound(_)
            | AppError::PaymentNotFound(_)
            | AppError::NotFound(_) => ErrorKind::NotFound,

            AppError::NoBillablePlan(_) | AppError::InvalidState(_) => ErrorKind::InvalidState,

            AppError::UsageAlreadyClaimed(_)
            | AppError::DuplicateInvoiceNumber(_)
            | AppError::DuplicateReceipt(_)
            | AppError::IllegalTransition { .. }
            | AppError::Conflict(_) => ErrorKind::Conflict,

            AppError::Validation(_) | AppError::InvalidAmount(_) => ErrorKind::Validation,

            AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Transaction(_)
            | AppError::Cache(_)
            | AppError::CacheConnection(_)
            | AppError::Internal(_)
            | AppError::Config(_)
            | AppError::Serialization(_) => ErrorKind::Internal,
        }
    }

    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidState => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::Pool(_) => "pool_error",
            AppError::Transaction(_) => "transaction_error",
            AppError::Cache(_) => "cache_error",
            AppError::CacheConnection(_) => "cache_connection_error",
            AppError::CustomerNotFound(_) => "customer_not_found",
            AppError::PlanNotFound(_) => "plan_not_found",
            AppError::BillNotFound(_) => "bill_not_found",
            AppError::InvoiceNotFound(_) => "invoice_not_found",
            AppError::PaymentNotFound(_) => "payment_not_found",
            AppError::NotFound(_) => "not_found",
            AppError::NoBillablePlan(_) => "no_billable_plan",
            AppError::InvalidState(_) => "invalid_state",
            AppError::UsageAlreadyClaimed(_) => "usage_already_billed",
            AppError::DuplicateInvoiceNumber(_) => "duplicate_invoice_number",
            AppError::DuplicateReceipt(_) => "duplicate_receipt",
            AppError::IllegalTransition { .. } => "illegal_transition",
            AppError::Conflict(_) => "conflict",
            AppError::Validation(_) => "validation_error",
            AppError::InvalidAmount(_) => "invalid_amount",
            AppError::Internal(_) => "internal_error",
            AppError::Config(_) => "config_error",
            AppError::Serialization(_) => "serialization_error",
        }
    }

    /// Message safe to hand to an untrusted caller
    ///
    /// Internal-kind errors never leak storage or driver detail.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "An internal error occurred".to_string(),
            _ => self.to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        AppError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = json!({
            "error": self.error_code(),
            "kind": self.kind(),
            "message": self.public_message(),
            "status": status.as_u16(),
        });

        HttpResponse::build(status).json(body)
    }
}

// ==================== From implementations ====================

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => AppError::Pool(err.to_string()),
            other => AppError::Database(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            AppError::CustomerNotFound("7".to_string()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            AppError::NoBillablePlan("7".to_string()).kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(
            AppError::IllegalTransition {
                from: "completed".to_string(),
                to: "pending".to_string()
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            AppError::InvalidAmount("-1".to_string()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            AppError::Transaction("deadlock".to_string()).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            AppError::BillNotFound("x".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::UsageAlreadyClaimed("1".to_string()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Database("boom".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_detail_is_hidden() {
        let err = AppError::Database("relation \"bills\" does not exist".to_string());
        assert_eq!(err.public_message(), "An internal error occurred");

        let err = AppError::BillNotFound("42".to_string());
        assert_eq!(err.public_message(), "Bill not found: 42");
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AppError::DuplicateReceipt("QW12".to_string()).error_code(),
            "duplicate_receipt"
        );
        assert_eq!(
            AppError::NoBillablePlan("3".to_string()).error_code(),
            "no_billable_plan"
        );
    }
}
