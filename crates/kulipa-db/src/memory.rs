//! In-memory billing store
//!
//! Implements the same repository contracts as [`PgStore`](crate::PgStore)
//! over process-local state. Every write runs against a copy of the state
//! that replaces the original only if the whole write succeeds, which
//! gives the same all-or-nothing behaviour as a database transaction.
//!
//! Faults can be armed to fail a specific step, so callers can check that
//! a failed write leaves no partial state behind.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kulipa_core::{
    models::{
        Bill, BillPaymentStatus, Customer, Invoice, InvoiceStatus, NewUsageRecord, Payment,
        PaymentInsert, PaymentStatus, Plan, UsageRecord,
    },
    traits::{
        BillRepository, CustomerRepository, InvoiceRepository, PaymentRepository,
        PaymentTransition, PlanRepository, UsageRepository,
    },
    AppError, AppResult,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Store step that can be made to fail once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreFault {
    /// Fail issuance while marking usage billed, after bill and invoice
    ClaimUsage,
    /// Fail issuance while inserting the invoice
    InsertInvoice,
    /// Fail a payment completion while settling the bill
    SettleBill,
}

#[derive(Debug, Clone, Default)]
struct State {
    customers: HashMap<i32, Customer>,
    plans: HashMap<i32, Plan>,
    usage: BTreeMap<i64, UsageRecord>,
    next_usage_id: i64,
    bills: HashMap<Uuid, Bill>,
    invoices: HashMap<Uuid, Invoice>,
    payments: HashMap<Uuid, Payment>,
}

/// In-memory implementation of the billing repositories
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    faults: Mutex<HashSet<StoreFault>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a customer
    pub fn put_customer(&self, customer: Customer) {
        self.state.lock().customers.insert(customer.id, customer);
    }

    /// Add or replace a plan
    pub fn put_plan(&self, plan: Plan) {
        self.state.lock().plans.insert(plan.id, plan);
    }

    /// Arm a fault; it fires on the next write that reaches the step
    pub fn inject_fault(&self, fault: StoreFault) {
        self.faults.lock().insert(fault);
    }

    pub fn usage_records(&self) -> Vec<UsageRecord> {
        self.state.lock().usage.values().cloned().collect()
    }

    pub fn bills(&self) -> Vec<Bill> {
        self.state.lock().bills.values().cloned().collect()
    }

    pub fn invoices(&self) -> Vec<Invoice> {
        self.state.lock().invoices.values().cloned().collect()
    }

    pub fn payments(&self) -> Vec<Payment> {
        self.state.lock().payments.values().cloned().collect()
    }

    fn trip(&self, fault: StoreFault) -> AppResult<()> {
        if self.faults.lock().remove(&fault) {
            warn!(?fault, "Injected store fault");
            return Err(AppError::Database(format!("injected fault: {:?}", fault)));
        }
        Ok(())
    }

    /// Run `f` against a copy of the state; keep the copy only on success
    fn transact<R>(&self, f: impl FnOnce(&mut State) -> AppResult<R>) -> AppResult<R> {
        let mut state = self.state.lock();
        let mut draft = state.clone();
        let result = f(&mut draft)?;
        *state = draft;
        Ok(result)
    }
}

impl State {
    fn insert_invoice(&mut self, invoice: &Invoice) -> AppResult<Invoice> {
        if !self.bills.contains_key(&invoice.bill_id) {
            return Err(AppError::BillNotFound(invoice.bill_id.to_string()));
        }
        if self
            .invoices
            .values()
            .any(|i| i.invoice_number == invoice.invoice_number)
        {
            return Err(AppError::DuplicateInvoiceNumber(invoice.invoice_number.clone()));
        }
        self.invoices.insert(invoice.id, invoice.clone());
        Ok(invoice.clone())
    }

    fn bill_mut(&mut self, id: Uuid) -> AppResult<&mut Bill> {
        self.bills
            .get_mut(&id)
            .ok_or_else(|| AppError::BillNotFound(id.to_string()))
    }

    fn settle(&mut self, payment: &Payment, now: DateTime<Utc>) -> AppResult<()> {
        let bill = self.bill_mut(payment.bill_id)?;
        bill.payment_status = BillPaymentStatus::Paid;

        for invoice in self
            .invoices
            .values_mut()
            .filter(|i| i.bill_id == payment.bill_id && i.status.is_open())
        {
            invoice.status = InvoiceStatus::Paid;
            invoice.updated_at = now;
        }
        Ok(())
    }
}

#[async_trait]
impl CustomerRepository for MemoryStore {
    async fn find_customer(&self, id: i32) -> AppResult<Option<Customer>> {
        Ok(self.state.lock().customers.get(&id).cloned())
    }
}

#[async_trait]
impl PlanRepository for MemoryStore {
    async fn find_plan(&self, id: i32) -> AppResult<Option<Plan>> {
        Ok(self.state.lock().plans.get(&id).cloned())
    }
}

#[async_trait]
impl UsageRepository for MemoryStore {
    async fn append_usage(&self, record: &NewUsageRecord) -> AppResult<UsageRecord> {
        record.validate().map_err(AppError::Validation)?;

        self.transact(|state| {
            state.next_usage_id += 1;
            let stored = UsageRecord {
                id: state.next_usage_id,
                customer_id: record.customer_id,
                plan_id: record.plan_id,
                usage_type: record.usage_type,
                quantity: record.quantity,
                recorded_at: record.recorded_at,
                billed: false,
                bill_id: None,
            };
            state.usage.insert(stored.id, stored.clone());
            Ok(stored)
        })
    }

    async fn find_unbilled(&self, customer_id: i32) -> AppResult<Vec<UsageRecord>> {
        let mut records: Vec<UsageRecord> = self
            .state
            .lock()
            .usage
            .values()
            .filter(|u| u.customer_id == customer_id && !u.billed)
            .cloned()
            .collect();
        records.sort_by_key(|u| (u.recorded_at, u.id));
        Ok(records)
    }

    async fn find_usage_for_bill(&self, bill_id: Uuid) -> AppResult<Vec<UsageRecord>> {
        let mut records: Vec<UsageRecord> = self
            .state
            .lock()
            .usage
            .values()
            .filter(|u| u.bill_id == Some(bill_id))
            .cloned()
            .collect();
        records.sort_by_key(|u| (u.recorded_at, u.id));
        Ok(records)
    }
}

#[async_trait]
impl BillRepository for MemoryStore {
    #[instrument(skip(self, bill, invoice, usage_ids), fields(bill_id = %bill.id))]
    async fn persist_issuance(
        &self,
        bill: &Bill,
        invoice: &Invoice,
        usage_ids: &[i64],
    ) -> AppResult<()> {
        self.transact(|state| {
            if !state.customers.contains_key(&bill.customer_id) {
                return Err(AppError::CustomerNotFound(bill.customer_id.to_string()));
            }

            state.bills.insert(bill.id, bill.clone());
            self.trip(StoreFault::InsertInvoice)?;
            state.insert_invoice(invoice)?;
            self.trip(StoreFault::ClaimUsage)?;

            for id in usage_ids {
                match state.usage.get_mut(id) {
                    Some(record) if record.customer_id == bill.customer_id && !record.billed => {
                        record.billed = true;
                        record.bill_id = Some(bill.id);
                    }
                    _ => {
                        return Err(AppError::UsageAlreadyClaimed(format!(
                            "usage record {} for customer {} is no longer unbilled",
                            id, bill.customer_id
                        )));
                    }
                }
            }

            debug!("Claimed {} usage records", usage_ids.len());
            Ok(())
        })
    }

    async fn find_bill(&self, id: Uuid) -> AppResult<Option<Bill>> {
        Ok(self.state.lock().bills.get(&id).cloned())
    }

    async fn find_latest_bill(&self, customer_id: i32) -> AppResult<Option<Bill>> {
        Ok(self
            .state
            .lock()
            .bills
            .values()
            .filter(|b| b.customer_id == customer_id)
            .max_by_key(|b| (b.created_at, b.id))
            .cloned())
    }
}

#[async_trait]
impl InvoiceRepository for MemoryStore {
    async fn insert_invoice(&self, invoice: &Invoice) -> AppResult<Invoice> {
        self.transact(|state| state.insert_invoice(invoice))
    }

    async fn find_invoice(&self, id: Uuid) -> AppResult<Option<Invoice>> {
        Ok(self.state.lock().invoices.get(&id).cloned())
    }

    async fn find_invoices_for_bill(&self, bill_id: Uuid) -> AppResult<Vec<Invoice>> {
        let mut invoices: Vec<Invoice> = self
            .state
            .lock()
            .invoices
            .values()
            .filter(|i| i.bill_id == bill_id)
            .cloned()
            .collect();
        invoices.sort_by(|a, b| (b.issue_date, b.id).cmp(&(a.issue_date, a.id)));
        Ok(invoices)
    }

    async fn update_invoice_status(
        &self,
        id: Uuid,
        from: InvoiceStatus,
        to: InvoiceStatus,
    ) -> AppResult<Option<Invoice>> {
        self.transact(|state| {
            Ok(state.invoices.get_mut(&id).and_then(|invoice| {
                if invoice.status != from {
                    return None;
                }
                invoice.status = to;
                invoice.updated_at = Utc::now();
                Some(invoice.clone())
            }))
        })
    }

    async fn mark_overdue(&self, as_of: DateTime<Utc>) -> AppResult<Vec<Invoice>> {
        self.transact(|state| {
            let now = Utc::now();
            Ok(state
                .invoices
                .values_mut()
                .filter(|i| i.is_past_due(as_of))
                .map(|invoice| {
                    invoice.status = InvoiceStatus::Overdue;
                    invoice.updated_at = now;
                    invoice.clone()
                })
                .collect())
        })
    }

    async fn outstanding_total(&self) -> AppResult<Decimal> {
        Ok(self
            .state
            .lock()
            .invoices
            .values()
            .filter(|i| i.status.is_open())
            .map(|i| i.amount_due)
            .sum())
    }
}

#[async_trait]
impl PaymentRepository for MemoryStore {
    #[instrument(skip(self, payment), fields(receipt = %payment.receipt_number))]
    async fn insert_payment(&self, payment: &Payment) -> AppResult<PaymentInsert> {
        self.transact(|state| {
            if let Some(existing) = state
                .payments
                .values()
                .find(|p| p.receipt_number == payment.receipt_number)
            {
                return Ok(PaymentInsert::Duplicate(existing.clone()));
            }

            let bill = state.bill_mut(payment.bill_id)?;
            match payment.status {
                PaymentStatus::Pending => {
                    if bill.payment_status == BillPaymentStatus::Unpaid {
                        bill.payment_status = BillPaymentStatus::Pending;
                    }
                }
                PaymentStatus::Completed => {
                    self.trip(StoreFault::SettleBill)?;
                    state.settle(payment, payment.updated_at)?;
                }
                PaymentStatus::Failed => {}
            }

            state.payments.insert(payment.id, payment.clone());
            Ok(PaymentInsert::Created(payment.clone()))
        })
    }

    async fn find_payment(&self, id: Uuid) -> AppResult<Option<Payment>> {
        Ok(self.state.lock().payments.get(&id).cloned())
    }

    async fn find_payment_by_receipt(&self, receipt: &str) -> AppResult<Option<Payment>> {
        Ok(self
            .state
            .lock()
            .payments
            .values()
            .find(|p| p.receipt_number == receipt)
            .cloned())
    }

    #[instrument(skip(self))]
    async fn transition_payment(
        &self,
        id: Uuid,
        to: PaymentStatus,
    ) -> AppResult<PaymentTransition> {
        if !to.is_terminal() {
            return Err(AppError::Validation(format!(
                "payments can only move to a terminal status, got {}",
                to
            )));
        }

        self.transact(|state| {
            let now = Utc::now();
            let payment = state
                .payments
                .get_mut(&id)
                .ok_or_else(|| AppError::PaymentNotFound(id.to_string()))?;

            if payment.status != PaymentStatus::Pending {
                return Ok(PaymentTransition::NotPending(payment.clone()));
            }
            payment.status = to;
            payment.updated_at = now;
            let payment = payment.clone();

            if to == PaymentStatus::Completed {
                self.trip(StoreFault::SettleBill)?;
                state.settle(&payment, now)?;
            } else {
                let others_pending = state.payments.values().any(|p| {
                    p.bill_id == payment.bill_id && p.status == PaymentStatus::Pending
                });
                let bill = state.bill_mut(payment.bill_id)?;
                if !others_pending && bill.payment_status == BillPaymentStatus::Pending {
                    bill.payment_status = BillPaymentStatus::Unpaid;
                }
            }

            let bill = state
                .bills
                .get(&payment.bill_id)
                .cloned()
                .ok_or_else(|| AppError::BillNotFound(payment.bill_id.to_string()))?;
            let invoice = payment
                .invoice_id
                .and_then(|invoice_id| state.invoices.get(&invoice_id).cloned());

            Ok(PaymentTransition::Applied {
                payment,
                bill,
                invoice,
            })
        })
    }

    async fn completed_revenue(&self) -> AppResult<Decimal> {
        Ok(self
            .state
            .lock()
            .payments
            .values()
            .filter(|p| p.status == PaymentStatus::Completed)
            .map(|p| p.amount)
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kulipa_core::models::{ChargeBreakdown, UsageType};
    use rust_decimal_macros::dec;

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.put_plan(Plan {
            id: 1,
            name: "Basic".to_string(),
            base_price: dec!(10),
            ..Default::default()
        });
        store.put_customer(Customer {
            id: 1,
            name: "Amina".to_string(),
            phone_number: "254700000001".to_string(),
            plan_id: Some(1),
            ..Default::default()
        });
        store
    }

    async fn bill_for(store: &MemoryStore) -> (Bill, Invoice, Vec<i64>) {
        let usage = store.find_unbilled(1).await.unwrap();
        let plan = store.find_plan(1).await.unwrap().unwrap();
        let breakdown = ChargeBreakdown::compute(&plan, &usage, dec!(0.16)).unwrap();
        let now = Utc::now();
        let bill = Bill::new(1, 1, breakdown, &usage, now);
        let invoice = Invoice::for_bill(
            &bill,
            "INV",
            1,
            now,
            Invoice::default_due_date(now, 30),
            bill.total_amount,
        );
        let ids = bill.consumed_usage_ids();
        (bill, invoice, ids)
    }

    #[tokio::test]
    async fn test_claim_fault_rolls_back_issuance() {
        let store = seeded();
        store
            .append_usage(&NewUsageRecord::new(1, 1, UsageType::Call, dec!(5)))
            .await
            .unwrap();
        let (bill, invoice, ids) = bill_for(&store).await;

        store.inject_fault(StoreFault::ClaimUsage);
        let result = store.persist_issuance(&bill, &invoice, &ids).await;

        assert!(result.is_err());
        assert!(store.bills().is_empty());
        assert!(store.invoices().is_empty());
        assert!(store.usage_records().iter().all(|u| !u.billed));

        // The fault fires once
        store.persist_issuance(&bill, &invoice, &ids).await.unwrap();
        assert!(store.usage_records().iter().all(|u| u.billed));
    }

    #[tokio::test]
    async fn test_second_claim_of_same_usage_conflicts() {
        let store = seeded();
        store
            .append_usage(&NewUsageRecord::new(1, 1, UsageType::Sms, dec!(3)))
            .await
            .unwrap();
        let (first, first_invoice, ids) = bill_for(&store).await;
        let (second, second_invoice, _) = bill_for(&store).await;

        store
            .persist_issuance(&first, &first_invoice, &ids)
            .await
            .unwrap();
        let err = store
            .persist_issuance(&second, &second_invoice, &ids)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::UsageAlreadyClaimed(_)));
        assert_eq!(store.bills().len(), 1);
        assert_eq!(store.invoices().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_invoice_number_rejected() {
        let store = seeded();
        let (bill, invoice, ids) = bill_for(&store).await;
        store.persist_issuance(&bill, &invoice, &ids).await.unwrap();

        let mut again = invoice.clone();
        again.id = Uuid::now_v7();
        let err = store.insert_invoice(&again).await.unwrap_err();

        assert!(matches!(err, AppError::DuplicateInvoiceNumber(_)));
    }

    #[tokio::test]
    async fn test_mark_overdue_only_touches_past_due_pending() {
        let store = seeded();
        let (bill, invoice, ids) = bill_for(&store).await;
        store.persist_issuance(&bill, &invoice, &ids).await.unwrap();

        let flipped = store.mark_overdue(invoice.due_date).await.unwrap();
        assert!(flipped.is_empty());

        let later = invoice.due_date + chrono::Duration::seconds(1);
        let flipped = store.mark_overdue(later).await.unwrap();
        assert_eq!(flipped.len(), 1);
        assert_eq!(flipped[0].status, InvoiceStatus::Overdue);
        assert!(store.mark_overdue(later).await.unwrap().is_empty());
    }
}
