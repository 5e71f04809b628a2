//! Business logic services for Kulipa Billing
//!
//! This crate turns unbilled usage into bills and invoices and reconciles
//! payments against them. Services are generic over the store
//! ([`BillingStore`](kulipa_core::traits::BillingStore)) and the plan cache
//! ([`CacheService`](kulipa_core::traits::CacheService)), so the same code
//! runs on PostgreSQL/Redis in production and on the in-memory store in
//! tests.
//!
//! # Services
//!
//! - `PlanCatalog` - Plan lookup with optional read-through caching
//! - `RatingEngine` - Pure charge computation over unbilled usage
//! - `BillIssuer` - Bill and invoice issuance, forecasts, one-off invoices
//! - `InvoiceDesk` - Invoice detail, manual status override, overdue sweep
//! - `PaymentReconciler` - Payment recording, status updates, settlements
//! - `ReportService` - Financial summary
//! - `BillingEngine` - Facade wiring all of the above over one store

pub mod catalog;
pub mod engine;
pub mod events;
pub mod invoices;
pub mod issuer;
pub mod rating;
pub mod reconciler;
pub mod reports;

pub use catalog::{NoCache, PlanCatalog};
pub use engine::BillingEngine;
pub use events::{BroadcastEventSink, RecordingEventSink, TracingEventSink};
pub use invoices::{InvoiceDesk, InvoiceDetail};
pub use issuer::{BillIssuer, IssuedBill, OneOffInvoice};
pub use rating::{RatedUsage, RatingEngine};
pub use reconciler::{PaymentReconciler, SettlementOutcome};
pub use reports::{FinancialSummary, ReportService};

/// Business logic constants
pub mod constants {
    /// Capacity of the broadcast channel behind `BroadcastEventSink`
    pub const EVENT_CHANNEL_CAPACITY: usize = 256;

    /// Message of the conflict raised when there is no unbilled usage
    pub const NOTHING_TO_BILL: &str = "no unbilled usage to bill";
}
