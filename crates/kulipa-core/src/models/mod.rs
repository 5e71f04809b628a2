//! Domain models for Kulipa Billing
//!
//! This module contains all the core domain models used throughout the application.

pub mod bill;
pub mod charges;
pub mod customer;
pub mod events;
pub mod forecast;
pub mod invoice;
pub mod payment;
pub mod plan;
pub mod usage;

pub use bill::{Bill, BillPaymentStatus, BillSnapshot};
pub use charges::{overage, round_currency, ChargeBreakdown, CURRENCY_DP};
pub use customer::{Customer, CustomerStatus};
pub use events::BillingEvent;
pub use forecast::{Forecast, ForecastConfidence, Projection};
pub use invoice::{Invoice, InvoiceStatus};
pub use payment::{NewPayment, Payment, PaymentInsert, PaymentStatus, SettlementNotice};
pub use plan::{Plan, PlanStatus};
pub use usage::{NewUsageRecord, MAX_USAGE_QUANTITY, UsageAmounts, UsageRecord, UsageSummary, UsageType};
