//! Financial reporting

use kulipa_core::{
    models::round_currency,
    traits::{InvoiceRepository, PaymentRepository},
    AppResult,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Revenue collected against money still owed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialSummary {
    /// Sum of completed payments
    pub total_revenue: Decimal,
    /// Sum of amount due over pending and overdue invoices
    pub total_outstanding: Decimal,
    pub currency: String,
}

pub struct ReportService<S> {
    store: Arc<S>,
    currency: String,
}

impl<S: InvoiceRepository + PaymentRepository> ReportService<S> {
    pub fn new(store: Arc<S>, currency: impl Into<String>) -> Self {
        Self {
            store,
            currency: currency.into(),
        }
    }

    #[instrument(skip(self))]
    pub async fn financial_summary(&self) -> AppResult<FinancialSummary> {
        let (revenue, outstanding) = tokio::try_join!(
            self.store.completed_revenue(),
            self.store.outstanding_total()
        )?;

        debug!(%revenue, %outstanding, "Computed financial summary");

        Ok(FinancialSummary {
            total_revenue: round_currency(revenue),
            total_outstanding: round_currency(outstanding),
            currency: self.currency.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kulipa_core::models::{
        Bill, ChargeBreakdown, Customer, Invoice, InvoiceStatus, NewPayment, PaymentStatus, Plan,
    };
    use kulipa_core::traits::BillRepository;
    use kulipa_db::MemoryStore;
    use rust_decimal_macros::dec;

    async fn issued(store: &MemoryStore, customer_id: i32, amount: Decimal) -> (Bill, Invoice) {
        let plan = Plan {
            id: customer_id,
            name: format!("Flat {}", amount),
            base_price: amount,
            ..Default::default()
        };
        store.put_plan(plan.clone());
        store.put_customer(Customer {
            id: customer_id,
            name: format!("Customer {}", customer_id),
            plan_id: Some(plan.id),
            ..Default::default()
        });

        let now = Utc::now();
        let breakdown = ChargeBreakdown::compute(&plan, &[], Decimal::ZERO).unwrap();
        let bill = Bill::new(customer_id, plan.id, breakdown, &[], now);
        let invoice = Invoice::for_bill(
            &bill,
            "INV",
            1,
            now,
            Invoice::default_due_date(now, 30),
            bill.total_amount,
        );
        store.persist_issuance(&bill, &invoice, &[]).await.unwrap();
        (bill, invoice)
    }

    #[tokio::test]
    async fn test_summary_counts_completed_and_open() {
        let store = Arc::new(MemoryStore::new());
        let (paid_bill, paid_invoice) = issued(&store, 1, dec!(17.40)).await;
        issued(&store, 2, dec!(11.60)).await;
        let (_, overdue) = issued(&store, 3, dec!(5.00)).await;
        store
            .update_invoice_status(overdue.id, InvoiceStatus::Pending, InvoiceStatus::Overdue)
            .await
            .unwrap();

        let payment = NewPayment {
            bill_id: paid_bill.id,
            customer_id: 1,
            amount: dec!(17.40),
            method: "cash".into(),
            invoice_id: Some(paid_invoice.id),
            receipt_number: Some("R-1".into()),
            phone_number: None,
            status: PaymentStatus::Completed,
        }
        .into_payment(Utc::now());
        store.insert_payment(&payment).await.unwrap();

        let summary = ReportService::new(store, "KES")
            .financial_summary()
            .await
            .unwrap();

        assert_eq!(summary.total_revenue, dec!(17.40));
        assert_eq!(summary.total_outstanding, dec!(16.60));
        assert_eq!(summary.currency, "KES");
    }

    #[tokio::test]
    async fn test_empty_store_reports_zero() {
        let summary = ReportService::new(Arc::new(MemoryStore::new()), "KES")
            .financial_summary()
            .await
            .unwrap();

        assert_eq!(summary.total_revenue, Decimal::ZERO);
        assert_eq!(summary.total_outstanding, Decimal::ZERO);
    }
}
