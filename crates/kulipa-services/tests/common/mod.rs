//! Shared fixtures for the service integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kulipa_core::{
    models::{
        Bill, Customer, Invoice, InvoiceStatus, NewUsageRecord, Payment, PaymentInsert,
        PaymentStatus, Plan, UsageAmounts, UsageRecord, UsageType,
    },
    traits::{
        BillRepository, CustomerRepository, InvoiceRepository, PaymentRepository,
        PaymentTransition, PlanRepository, UsageRepository,
    },
    AppResult, BillingConfig,
};
use kulipa_db::MemoryStore;
use kulipa_services::{BillingEngine, RecordingEventSink};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use uuid::Uuid;

pub const CUSTOMER: i32 = 42;
pub const OTHER_CUSTOMER: i32 = 43;
pub const PLAN: i32 = 1;

/// Plan {base=10, call allowance 100 min at 0.1 per extra minute}
pub fn basic_plan() -> Plan {
    Plan {
        id: PLAN,
        name: "Basic".to_string(),
        base_price: dec!(10),
        allowance: UsageAmounts::new(dec!(100), dec!(100), dec!(1024)),
        overage_rate: UsageAmounts::new(dec!(0.1), dec!(0.05), dec!(0.01)),
        ..Default::default()
    }
}

pub fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.put_plan(basic_plan());
    for (id, name) in [(CUSTOMER, "Achieng Otieno"), (OTHER_CUSTOMER, "Baraka Mwangi")] {
        store.put_customer(Customer {
            id,
            name: name.to_string(),
            phone_number: format!("2547000000{}", id),
            plan_id: Some(PLAN),
            ..Default::default()
        });
    }
    store
}

/// Meter `minutes` of calls for a customer
pub async fn meter_calls<S: UsageRepository>(store: &S, customer_id: i32, minutes: &[Decimal]) {
    for m in minutes {
        store
            .append_usage(&NewUsageRecord::new(customer_id, PLAN, UsageType::Call, *m))
            .await
            .unwrap();
    }
}

pub struct Harness<S> {
    pub store: Arc<S>,
    pub events: Arc<RecordingEventSink>,
    pub engine: BillingEngine<S>,
}

pub fn harness<S: kulipa_core::traits::BillingStore>(store: S) -> Harness<S> {
    let store = Arc::new(store);
    let events = Arc::new(RecordingEventSink::new());
    let engine = BillingEngine::new(store.clone(), None, BillingConfig::default(), events.clone());
    Harness {
        store,
        events,
        engine,
    }
}

/// Memory store that yields to the scheduler right after reading the
/// unbilled set, so two issuances can interleave between read and claim
pub struct InterleavingStore {
    pub inner: MemoryStore,
}

#[async_trait]
impl CustomerRepository for InterleavingStore {
    async fn find_customer(&self, id: i32) -> AppResult<Option<Customer>> {
        self.inner.find_customer(id).await
    }
}

#[async_trait]
impl PlanRepository for InterleavingStore {
    async fn find_plan(&self, id: i32) -> AppResult<Option<Plan>> {
        self.inner.find_plan(id).await
    }
}

#[async_trait]
impl UsageRepository for InterleavingStore {
    async fn append_usage(&self, record: &NewUsageRecord) -> AppResult<UsageRecord> {
        self.inner.append_usage(record).await
    }

    async fn find_unbilled(&self, customer_id: i32) -> AppResult<Vec<UsageRecord>> {
        let unbilled = self.inner.find_unbilled(customer_id).await;
        tokio::task::yield_now().await;
        unbilled
    }

    async fn find_usage_for_bill(&self, bill_id: Uuid) -> AppResult<Vec<UsageRecord>> {
        self.inner.find_usage_for_bill(bill_id).await
    }
}

#[async_trait]
impl BillRepository for InterleavingStore {
    async fn persist_issuance(
        &self,
        bill: &Bill,
        invoice: &Invoice,
        usage_ids: &[i64],
    ) -> AppResult<()> {
        self.inner.persist_issuance(bill, invoice, usage_ids).await
    }

    async fn find_bill(&self, id: Uuid) -> AppResult<Option<Bill>> {
        self.inner.find_bill(id).await
    }

    async fn find_latest_bill(&self, customer_id: i32) -> AppResult<Option<Bill>> {
        self.inner.find_latest_bill(customer_id).await
    }
}

#[async_trait]
impl InvoiceRepository for InterleavingStore {
    async fn insert_invoice(&self, invoice: &Invoice) -> AppResult<Invoice> {
        self.inner.insert_invoice(invoice).await
    }

    async fn find_invoice(&self, id: Uuid) -> AppResult<Option<Invoice>> {
        self.inner.find_invoice(id).await
    }

    async fn find_invoices_for_bill(&self, bill_id: Uuid) -> AppResult<Vec<Invoice>> {
        self.inner.find_invoices_for_bill(bill_id).await
    }

    async fn update_invoice_status(
        &self,
        id: Uuid,
        from: InvoiceStatus,
        to: InvoiceStatus,
    ) -> AppResult<Option<Invoice>> {
        self.inner.update_invoice_status(id, from, to).await
    }

    async fn mark_overdue(&self, as_of: DateTime<Utc>) -> AppResult<Vec<Invoice>> {
        self.inner.mark_overdue(as_of).await
    }

    async fn outstanding_total(&self) -> AppResult<Decimal> {
        self.inner.outstanding_total().await
    }
}

#[async_trait]
impl PaymentRepository for InterleavingStore {
    async fn insert_payment(&self, payment: &Payment) -> AppResult<PaymentInsert> {
        self.inner.insert_payment(payment).await
    }

    async fn find_payment(&self, id: Uuid) -> AppResult<Option<Payment>> {
        self.inner.find_payment(id).await
    }

    async fn find_payment_by_receipt(&self, receipt: &str) -> AppResult<Option<Payment>> {
        self.inner.find_payment_by_receipt(receipt).await
    }

    async fn transition_payment(
        &self,
        id: Uuid,
        to: PaymentStatus,
    ) -> AppResult<PaymentTransition> {
        self.inner.transition_payment(id, to).await
    }

    async fn completed_revenue(&self) -> AppResult<Decimal> {
        self.inner.completed_revenue().await
    }
}
