//! Repository implementations for [`PgStore`](crate::PgStore)
//!
//! Each module implements one repository trait from kulipa-core and owns
//! the row mapping for its table. Helpers taking a `PgExecutor` run either
//! on the pool or inside a caller's transaction.

pub mod bill_repo;
pub mod customer_repo;
pub mod invoice_repo;
pub mod payment_repo;
pub mod plan_repo;
pub mod usage_repo;

use kulipa_core::{AppError, AppResult};

/// Decode a status-like text column, failing on values the domain does not know
pub(crate) fn decode_column<T>(parsed: Option<T>, column: &str, raw: &str) -> AppResult<T> {
    parsed.ok_or_else(|| AppError::Internal(format!("unrecognised {} value '{}'", column, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kulipa_core::models::BillPaymentStatus;

    #[test]
    fn test_decode_column() {
        assert_eq!(
            decode_column(BillPaymentStatus::from_str("paid"), "payment_status", "paid").unwrap(),
            BillPaymentStatus::Paid
        );

        let err = decode_column(BillPaymentStatus::from_str("void"), "payment_status", "void")
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(ref m) if m.contains("'void'")));
    }
}
