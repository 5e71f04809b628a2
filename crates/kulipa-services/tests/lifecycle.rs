//! End-to-end billing lifecycle against the in-memory store

mod common;

use chrono::{Duration, Utc};
use common::*;
use kulipa_core::models::{
    BillPaymentStatus, InvoiceStatus, NewPayment, NewUsageRecord, PaymentStatus, UsageType,
    MAX_USAGE_QUANTITY,
};
use kulipa_core::{AppError, ErrorKind};
use kulipa_db::StoreFault;
use kulipa_services::OneOffInvoice;
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_issue_bill_worked_example() {
    let h = harness(seeded_store());
    meter_calls(h.store.as_ref(), CUSTOMER, &[dec!(90), dec!(60)]).await;

    let issued = h.engine.issue_bill(CUSTOMER).await.unwrap();

    assert_eq!(issued.breakdown.overage.call, dec!(50));
    assert_eq!(issued.breakdown.overage_charge.call, dec!(5.0));
    assert_eq!(issued.breakdown.subtotal, dec!(15.0));
    assert_eq!(issued.breakdown.tax, dec!(2.4));
    assert_eq!(issued.bill.total_amount, dec!(17.40));
    assert_eq!(issued.invoice.amount_due, dec!(17.40));
    assert_eq!(
        issued.invoice.due_date - issued.invoice.issue_date,
        Duration::days(30)
    );
    assert_eq!(issued.invoice.status, InvoiceStatus::Pending);
    assert_eq!(issued.bill.payment_status, BillPaymentStatus::Unpaid);

    let usage = h.store.usage_records();
    assert_eq!(usage.len(), 2);
    assert!(usage
        .iter()
        .all(|u| u.billed && u.bill_id == Some(issued.bill.id)));
    assert_eq!(h.events.names(), vec!["invoice_issued"]);
}

#[tokio::test]
async fn test_second_issue_bills_nothing() {
    let h = harness(seeded_store());
    meter_calls(h.store.as_ref(), CUSTOMER, &[dec!(150)]).await;

    let first = h.engine.issue_bill(CUSTOMER).await.unwrap();
    let err = h.engine.issue_bill(CUSTOMER).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(h.store.bills().len(), 1);
    assert_eq!(h.store.invoices().len(), 1);
    assert_eq!(h.store.bills()[0].total_amount, first.bill.total_amount);
}

#[tokio::test]
async fn test_new_usage_lands_on_next_bill_only() {
    let h = harness(seeded_store());
    meter_calls(h.store.as_ref(), CUSTOMER, &[dec!(150)]).await;
    let first = h.engine.issue_bill(CUSTOMER).await.unwrap();

    meter_calls(h.store.as_ref(), CUSTOMER, &[dec!(20)]).await;
    let second = h.engine.issue_bill(CUSTOMER).await.unwrap();

    assert_eq!(second.bill.snapshot.usage.len(), 1);
    assert_eq!(second.breakdown.totals.call, dec!(20));
    // Within the allowance: base price plus tax
    assert_eq!(second.bill.total_amount, dec!(11.60));
    assert_ne!(first.invoice.invoice_number, second.invoice.invoice_number);
}

#[tokio::test]
async fn test_usage_of_other_customers_is_untouched() {
    let h = harness(seeded_store());
    meter_calls(h.store.as_ref(), CUSTOMER, &[dec!(150)]).await;
    meter_calls(h.store.as_ref(), OTHER_CUSTOMER, &[dec!(30)]).await;

    h.engine.issue_bill(CUSTOMER).await.unwrap();

    let other: Vec<_> = h
        .store
        .usage_records()
        .into_iter()
        .filter(|u| u.customer_id == OTHER_CUSTOMER)
        .collect();
    assert_eq!(other.len(), 1);
    assert!(!other[0].billed);
}

#[tokio::test]
async fn test_fault_while_claiming_rolls_back_everything() {
    let h = harness(seeded_store());
    meter_calls(h.store.as_ref(), CUSTOMER, &[dec!(150)]).await;
    h.store.inject_fault(StoreFault::ClaimUsage);

    let err = h.engine.issue_bill(CUSTOMER).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(h.store.bills().is_empty());
    assert!(h.store.invoices().is_empty());
    assert!(h.store.usage_records().iter().all(|u| !u.billed));
    assert!(h.events.events().is_empty());

    // The fault is one-shot; a retry bills the same usage once
    let issued = h.engine.issue_bill(CUSTOMER).await.unwrap();
    assert_eq!(issued.bill.total_amount, dec!(17.40));
}

#[tokio::test]
async fn test_fault_while_inserting_invoice_leaves_no_bill() {
    let h = harness(seeded_store());
    meter_calls(h.store.as_ref(), CUSTOMER, &[dec!(10)]).await;
    h.store.inject_fault(StoreFault::InsertInvoice);

    assert!(h.engine.issue_bill(CUSTOMER).await.is_err());
    assert!(h.store.bills().is_empty());
    assert!(h.store.usage_records().iter().all(|u| !u.billed));
}

#[tokio::test]
async fn test_forecast_does_not_claim_usage() {
    let h = harness(seeded_store());
    meter_calls(h.store.as_ref(), CUSTOMER, &[dec!(150)]).await;

    let forecast = h.engine.forecast(CUSTOMER, Utc::now()).await.unwrap();

    assert!(forecast.projected.total >= forecast.current.total.round_dp(2));
    assert!(h.store.bills().is_empty());
    assert!(h.store.usage_records().iter().all(|u| !u.billed));
}

#[tokio::test]
async fn test_full_payment_cycle() {
    let h = harness(seeded_store());
    meter_calls(h.store.as_ref(), CUSTOMER, &[dec!(150)]).await;
    let issued = h.engine.issue_bill(CUSTOMER).await.unwrap();

    let payment = h
        .engine
        .record_payment(NewPayment {
            bill_id: issued.bill.id,
            customer_id: CUSTOMER,
            amount: dec!(17.40),
            method: "card".to_string(),
            invoice_id: None,
            receipt_number: Some("CARD-0001".to_string()),
            phone_number: None,
            status: PaymentStatus::Pending,
        })
        .await
        .unwrap();

    assert_eq!(payment.invoice_id, Some(issued.invoice.id));
    let bill = h.store.bills().pop().unwrap();
    assert_eq!(bill.payment_status, BillPaymentStatus::Pending);

    let completed = h
        .engine
        .update_payment_status(payment.id, PaymentStatus::Completed)
        .await
        .unwrap();
    assert_eq!(completed.status, PaymentStatus::Completed);

    let bill = h.store.bills().pop().unwrap();
    let invoice = h.store.invoices().pop().unwrap();
    assert_eq!(bill.payment_status, BillPaymentStatus::Paid);
    assert_eq!(invoice.status, InvoiceStatus::Paid);

    let summary = h.engine.financial_summary().await.unwrap();
    assert_eq!(summary.total_revenue, dec!(17.40));
    assert_eq!(summary.total_outstanding, dec!(0));

    assert_eq!(
        h.events.names(),
        vec!["invoice_issued", "payment_recorded", "payment_completed"]
    );
}

#[tokio::test]
async fn test_invoice_detail_reads_tax_from_bill() {
    let h = harness(seeded_store());
    meter_calls(h.store.as_ref(), CUSTOMER, &[dec!(150)]).await;
    let issued = h.engine.issue_bill(CUSTOMER).await.unwrap();

    let detail = h.engine.invoice_detail(issued.invoice.id).await.unwrap();

    assert_eq!(detail.breakdown.subtotal, dec!(15.00));
    assert_eq!(detail.breakdown.tax, dec!(2.40));
    assert_eq!(detail.breakdown.total, dec!(17.40));
    assert_eq!(detail.breakdown.tax_rate, dec!(0.16));
    assert_eq!(detail.usage.len(), 1);
    assert_eq!(detail.bill.id, issued.bill.id);
}

#[tokio::test]
async fn test_one_off_invoice_for_latest_bill() {
    let h = harness(seeded_store());
    meter_calls(h.store.as_ref(), CUSTOMER, &[dec!(150)]).await;
    let issued = h.engine.issue_bill(CUSTOMER).await.unwrap();

    let reissue = h
        .engine
        .issue_invoice_for_bill(OneOffInvoice {
            customer_id: Some(CUSTOMER),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(reissue.bill_id, issued.bill.id);
    assert_eq!(reissue.amount_due, dec!(17.40));
    assert!(reissue.invoice_number.ends_with("-002"));

    let err = h
        .engine
        .issue_invoice_for_bill(OneOffInvoice {
            customer_id: Some(OTHER_CUSTOMER),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_invoice_override_rules() {
    let h = harness(seeded_store());
    meter_calls(h.store.as_ref(), CUSTOMER, &[dec!(150)]).await;
    let issued = h.engine.issue_bill(CUSTOMER).await.unwrap();
    let id = issued.invoice.id;

    let same = h
        .engine
        .override_invoice_status(id, InvoiceStatus::Pending)
        .await
        .unwrap();
    assert_eq!(same.status, InvoiceStatus::Pending);

    let cancelled = h
        .engine
        .override_invoice_status(id, InvoiceStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(cancelled.status, InvoiceStatus::Cancelled);

    let err = h
        .engine
        .override_invoice_status(id, InvoiceStatus::Pending)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::IllegalTransition { .. }));

    // Overrides never touch the bill
    let bill = h.store.bills().pop().unwrap();
    assert_eq!(bill.payment_status, BillPaymentStatus::Unpaid);
    assert_eq!(
        h.events.names(),
        vec!["invoice_issued", "invoice_status_changed"]
    );
}

#[tokio::test]
async fn test_mark_overdue_sweep() {
    let h = harness(seeded_store());
    meter_calls(h.store.as_ref(), CUSTOMER, &[dec!(150)]).await;
    let issued = h.engine.issue_bill(CUSTOMER).await.unwrap();

    assert_eq!(h.engine.mark_overdue(Utc::now()).await.unwrap(), 0);

    let later = issued.invoice.due_date + Duration::days(1);
    assert_eq!(h.engine.mark_overdue(later).await.unwrap(), 1);
    assert_eq!(h.engine.mark_overdue(later).await.unwrap(), 0);

    let invoice = h.store.invoices().pop().unwrap();
    assert_eq!(invoice.status, InvoiceStatus::Overdue);

    let summary = h.engine.financial_summary().await.unwrap();
    assert_eq!(summary.total_outstanding, dec!(17.40));
}

#[tokio::test]
async fn test_usage_quantity_is_bounded() {
    let h = harness(seeded_store());

    let err = h
        .engine
        .record_usage(NewUsageRecord::new(
            CUSTOMER,
            PLAN,
            UsageType::Data,
            rust_decimal::Decimal::MAX / dec!(2),
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(h.store.usage_records().is_empty());

    for _ in 0..3 {
        h.engine
            .record_usage(NewUsageRecord::new(
                CUSTOMER,
                PLAN,
                UsageType::Call,
                MAX_USAGE_QUANTITY,
            ))
            .await
            .unwrap();
    }

    let rated = h.engine.compute_charges(CUSTOMER).await.unwrap();
    assert_eq!(rated.breakdown.totals.call, dec!(299999999999999.9997));
    assert_eq!(
        rated.breakdown.total,
        rated.breakdown.subtotal + rated.breakdown.tax
    );
}
