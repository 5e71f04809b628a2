//! Common traits for repositories and services
//!
//! Every data-store access pattern the engine needs is a typed method on
//! one of these traits. Services receive a store handle implementing
//! [`BillingStore`]; there is no process-wide store.

use crate::error::AppError;
use crate::models::{
    Bill, BillingEvent, Customer, Invoice, InvoiceStatus, NewUsageRecord, Payment, PaymentInsert,
    PaymentStatus, Plan, UsageRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

/// Customer lookups (read-only for this core)
#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find_customer(&self, id: i32) -> Result<Option<Customer>, AppError>;
}

/// Plan lookups (read-only for this core)
#[async_trait]
pub trait PlanRepository: Send + Sync {
    async fn find_plan(&self, id: i32) -> Result<Option<Plan>, AppError>;
}

/// Usage ledger
#[async_trait]
pub trait UsageRepository: Send + Sync {
    /// Append a metered usage record
    async fn append_usage(&self, record: &NewUsageRecord) -> Result<UsageRecord, AppError>;

    /// Unbilled records for a customer, oldest first
    async fn find_unbilled(&self, customer_id: i32) -> Result<Vec<UsageRecord>, AppError>;

    /// Records consumed by a bill
    async fn find_usage_for_bill(&self, bill_id: Uuid) -> Result<Vec<UsageRecord>, AppError>;
}

/// Bill persistence
#[async_trait]
pub trait BillRepository: Send + Sync {
    /// Persist a bill with its first invoice and claim the consumed usage
    ///
    /// All or nothing: if any id in `usage_ids` is already billed the whole
    /// operation is rolled back and `UsageAlreadyClaimed` is returned.
    async fn persist_issuance(
        &self,
        bill: &Bill,
        invoice: &Invoice,
        usage_ids: &[i64],
    ) -> Result<(), AppError>;

    async fn find_bill(&self, id: Uuid) -> Result<Option<Bill>, AppError>;

    /// Most recently created bill of a customer
    async fn find_latest_bill(&self, customer_id: i32) -> Result<Option<Bill>, AppError>;
}

/// Invoice persistence
#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Insert an invoice for an existing bill; a taken number is a conflict
    async fn insert_invoice(&self, invoice: &Invoice) -> Result<Invoice, AppError>;

    async fn find_invoice(&self, id: Uuid) -> Result<Option<Invoice>, AppError>;

    /// Invoices of a bill, newest first
    async fn find_invoices_for_bill(&self, bill_id: Uuid) -> Result<Vec<Invoice>, AppError>;

    /// Move an invoice from `from` to `to`
    ///
    /// Returns `None` when the invoice is no longer in `from`.
    async fn update_invoice_status(
        &self,
        id: Uuid,
        from: InvoiceStatus,
        to: InvoiceStatus,
    ) -> Result<Option<Invoice>, AppError>;

    /// Flip pending invoices due before `as_of` to overdue
    async fn mark_overdue(&self, as_of: DateTime<Utc>) -> Result<Vec<Invoice>, AppError>;

    /// Sum of amount due over pending and overdue invoices
    async fn outstanding_total(&self) -> Result<Decimal, AppError>;
}

/// Result of a guarded payment status change
#[derive(Debug, Clone)]
pub enum PaymentTransition {
    /// The payment left `pending`; bill and invoice reflect it
    Applied {
        payment: Payment,
        bill: Bill,
        invoice: Option<Invoice>,
    },
    /// The payment was no longer pending; carries its current state
    NotPending(Payment),
}

/// Payment persistence
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Insert a payment keyed by its receipt number
    ///
    /// In the same transaction a pending payment moves an unpaid bill to
    /// pending, and a completed payment marks the bill paid together with
    /// its open invoice. An existing receipt yields `Duplicate` and
    /// changes nothing.
    async fn insert_payment(&self, payment: &Payment) -> Result<PaymentInsert, AppError>;

    async fn find_payment(&self, id: Uuid) -> Result<Option<Payment>, AppError>;

    async fn find_payment_by_receipt(&self, receipt: &str) -> Result<Option<Payment>, AppError>;

    /// Move a pending payment to a terminal status
    ///
    /// The first terminal transition wins. Completion marks the bill paid
    /// and the linked invoice paid atomically; failure returns a pending
    /// bill to unpaid when no other pending payment remains.
    async fn transition_payment(
        &self,
        id: Uuid,
        to: PaymentStatus,
    ) -> Result<PaymentTransition, AppError>;

    /// Sum of completed payments
    async fn completed_revenue(&self) -> Result<Decimal, AppError>;
}

/// Everything the billing services need from a store
pub trait BillingStore:
    CustomerRepository
    + PlanRepository
    + UsageRepository
    + BillRepository
    + InvoiceRepository
    + PaymentRepository
    + 'static
{
}

impl<T> BillingStore for T where
    T: CustomerRepository
        + PlanRepository
        + UsageRepository
        + BillRepository
        + InvoiceRepository
        + PaymentRepository
        + 'static
{
}

/// Cache service trait
#[async_trait]
pub trait CacheService: Send + Sync + 'static {
    /// Get value from cache
    async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError>;

    /// Set value in cache with TTL
    async fn set<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<(), AppError>;

    /// Delete value from cache
    async fn delete(&self, key: &str) -> Result<bool, AppError>;
}

/// Receiver of committed billing events
///
/// Publishing must not fail the operation that produced the event.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: BillingEvent);
}
