//! Racing issuances and payment transitions

mod common;

use common::*;
use kulipa_core::models::{BillPaymentStatus, NewPayment, PaymentStatus};
use kulipa_core::{AppError, ErrorKind};
use rust_decimal_macros::dec;

#[tokio::test]
async fn test_concurrent_issue_bills_usage_once() {
    let h = harness(InterleavingStore {
        inner: seeded_store(),
    });
    meter_calls(h.store.as_ref(), CUSTOMER, &[dec!(90), dec!(60)]).await;

    let (a, b) = tokio::join!(h.engine.issue_bill(CUSTOMER), h.engine.issue_bill(CUSTOMER));

    let (won, lost) = match (a, b) {
        (Ok(bill), Err(err)) | (Err(err), Ok(bill)) => (bill, err),
        other => panic!("expected exactly one issuance to win, got {:?}", other),
    };

    // Both read the same unbilled set before either claimed it
    assert!(matches!(lost, AppError::UsageAlreadyClaimed(_)));
    assert_eq!(lost.kind(), ErrorKind::Conflict);

    assert_eq!(won.bill.total_amount, dec!(17.40));
    assert_eq!(h.store.inner.bills().len(), 1);
    assert_eq!(h.store.inner.invoices().len(), 1);
    assert!(h
        .store
        .inner
        .usage_records()
        .iter()
        .all(|u| u.bill_id == Some(won.bill.id)));
    assert_eq!(h.events.names(), vec!["invoice_issued"]);
}

#[tokio::test]
async fn test_parallel_issue_on_threads() {
    let h = harness(seeded_store());
    meter_calls(h.store.as_ref(), CUSTOMER, &[dec!(150)]).await;
    let engine = std::sync::Arc::new(h.engine);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.issue_bill(CUSTOMER).await })
        })
        .collect();

    let mut wins = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => wins += 1,
            Err(err) => assert_eq!(err.kind(), ErrorKind::Conflict),
        }
    }

    assert_eq!(wins, 1);
    assert_eq!(h.store.bills().len(), 1);
}

#[tokio::test]
async fn test_complete_and_fail_race_has_one_winner() {
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
            receipt_number: None,
            phone_number: None,
            status: PaymentStatus::Pending,
        })
        .await
        .unwrap();

    let (completed, failed) = tokio::join!(
        h.engine
            .update_payment_status(payment.id, PaymentStatus::Completed),
        h.engine.update_payment_status(payment.id, PaymentStatus::Failed)
    );

    assert!(completed.is_ok() != failed.is_ok());
    let stored = h.engine.find_payment(payment.id).await.unwrap();
    let bill = h.store.bills().pop().unwrap();
    match stored.status {
        PaymentStatus::Completed => assert_eq!(bill.payment_status, BillPaymentStatus::Paid),
        PaymentStatus::Failed => assert_eq!(bill.payment_status, BillPaymentStatus::Unpaid),
        PaymentStatus::Pending => panic!("payment left pending"),
    }
}
