//! API layer for Kulipa Billing
//!
//! HTTP handlers for usage intake, bill issuance, invoices, payments and
//! reporting. Handlers are generic over the store and plan cache behind
//! the [`BillingEngine`](kulipa_services::BillingEngine), which the
//! application registers as `web::Data`.

#![forbid(unsafe_code)]

pub mod dto;
pub mod handlers;

pub use dto::ApiResponse;
pub use handlers::configure_api;
