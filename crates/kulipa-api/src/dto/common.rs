//! Common DTOs used across the API

use chrono::{DateTime, Utc};
use kulipa_core::AppError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::ValidationError;

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a success response with data
    pub fn success(data: T) -> Self {
        Self {
            data,
            message: None,
        }
    }

    /// Create a success response with data and message
    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: Some(message.into()),
        }
    }
}

/// Optional point in time, defaulting to now
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AsOfParams {
    pub as_of: Option<DateTime<Utc>>,
}

impl AsOfParams {
    pub fn resolve(&self) -> DateTime<Utc> {
        self.as_of.unwrap_or_else(Utc::now)
    }
}

/// Status change request body
#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
}

impl StatusUpdateRequest {
    /// Parse the status with `parse`, rejecting unknown values
    pub fn parse<T>(&self, parse: impl Fn(&str) -> Option<T>) -> Result<T, AppError> {
        parse(self.status.trim())
            .ok_or_else(|| AppError::Validation(format!("Invalid status: {}", self.status)))
    }
}

pub(crate) fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(ValidationError::new("negative_amount"));
    }
    Ok(())
}

pub(crate) fn positive(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(ValidationError::new("non_positive_amount"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kulipa_core::models::PaymentStatus;
    use rust_decimal_macros::dec;

    #[test]
    fn test_api_response() {
        let resp = ApiResponse::success("test");
        assert_eq!(resp.data, "test");
        assert!(resp.message.is_none());

        let resp = ApiResponse::with_message("data", "success");
        assert_eq!(resp.message, Some("success".to_string()));
    }

    #[test]
    fn test_status_update_parse() {
        let req = StatusUpdateRequest {
            status: " Completed ".to_string(),
        };
        assert_eq!(
            req.parse(PaymentStatus::from_str).unwrap(),
            PaymentStatus::Completed
        );

        let req = StatusUpdateRequest {
            status: "refunded".to_string(),
        };
        assert!(req.parse(PaymentStatus::from_str).is_err());
    }

    #[test]
    fn test_amount_validators() {
        assert!(non_negative(&dec!(0)).is_ok());
        assert!(non_negative(&dec!(-0.01)).is_err());
        assert!(positive(&dec!(0)).is_err());
        assert!(positive(&dec!(0.01)).is_ok());
    }
}
