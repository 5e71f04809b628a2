//! Payment reconciliation
//!
//! Applies payment outcomes to bills and invoices. A payment moves at most
//! once, from pending to completed or failed; completion marks the bill
//! and its invoice paid in the same store transaction.
//!
//! Settlement callbacks come from an untrusted provider webhook. They are
//! validated, resolved against an existing bill (never fabricating one),
//! and deduplicated by receipt number.

use chrono::Utc;
use kulipa_core::{
    models::{
        Bill, BillingEvent, Invoice, InvoiceStatus, NewPayment, Payment, PaymentInsert,
        PaymentStatus, SettlementNotice,
    },
    traits::{BillRepository, EventSink, InvoiceRepository, PaymentRepository, PaymentTransition},
    AppError, AppResult, BillingConfig,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Result of applying a settlement callback
#[derive(Debug, Clone, Serialize)]
pub struct SettlementOutcome {
    pub payment: Payment,
    /// The receipt had already been recorded; nothing changed
    pub duplicate: bool,
}

pub struct PaymentReconciler<S> {
    store: Arc<S>,
    config: BillingConfig,
    events: Arc<dyn EventSink>,
}

impl<S> PaymentReconciler<S>
where
    S: BillRepository + InvoiceRepository + PaymentRepository,
{
    pub fn new(store: Arc<S>, config: BillingConfig, events: Arc<dyn EventSink>) -> Self {
        Self {
            store,
            config,
            events,
        }
    }

    async fn bill(&self, id: Uuid) -> AppResult<Bill> {
        self.store
            .find_bill(id)
            .await?
            .ok_or_else(|| AppError::BillNotFound(id.to_string()))
    }

    /// Newest pending or overdue invoice of a bill
    async fn open_invoice(&self, bill_id: Uuid) -> AppResult<Option<Invoice>> {
        Ok(self
            .store
            .find_invoices_for_bill(bill_id)
            .await?
            .into_iter()
            .find(|i| i.status.is_open()))
    }

    fn publish_created(&self, payment: &Payment) {
        self.events.publish(BillingEvent::PaymentRecorded {
            payment: payment.clone(),
        });
    }

    /// Publish the completion event with the post-commit bill and invoice
    async fn publish_completed(&self, payment: &Payment) -> AppResult<()> {
        let bill = self.bill(payment.bill_id).await?;
        let invoice = match payment.invoice_id {
            Some(id) => self.store.find_invoice(id).await?,
            None => None,
        };
        self.events.publish(BillingEvent::PaymentCompleted {
            payment: payment.clone(),
            bill,
            invoice,
        });
        Ok(())
    }

    /// Record a payment against a bill
    ///
    /// Without an explicit invoice the payment is linked to the bill's
    /// newest open invoice, so completing it settles both together.
    #[instrument(skip(self, request), fields(bill_id = %request.bill_id))]
    pub async fn record_payment(&self, mut request: NewPayment) -> AppResult<Payment> {
        request.validate().map_err(|msg| {
            if request.amount <= Decimal::ZERO {
                AppError::InvalidAmount(msg)
            } else {
                AppError::Validation(msg)
            }
        })?;

        let bill = self.bill(request.bill_id).await?;
        if bill.customer_id != request.customer_id {
            return Err(AppError::Validation(format!(
                "bill {} does not belong to customer {}",
                bill.id, request.customer_id
            )));
        }

        match request.invoice_id {
            Some(invoice_id) => {
                let invoice = self
                    .store
                    .find_invoice(invoice_id)
                    .await?
                    .ok_or_else(|| AppError::InvoiceNotFound(invoice_id.to_string()))?;
                if invoice.bill_id != bill.id {
                    return Err(AppError::Validation(format!(
                        "invoice {} does not collect bill {}",
                        invoice.invoice_number, bill.id
                    )));
                }
                if invoice.status == InvoiceStatus::Cancelled {
                    return Err(AppError::InvalidState(format!(
                        "invoice {} is cancelled",
                        invoice.invoice_number
                    )));
                }
            }
            None => {
                request.invoice_id = self.open_invoice(bill.id).await?.map(|i| i.id);
            }
        }

        let payment = request.into_payment(Utc::now());
        match self.store.insert_payment(&payment).await? {
            PaymentInsert::Created(payment) => {
                info!(
                    payment_id = %payment.id,
                    receipt = %payment.receipt_number,
                    status = %payment.status,
                    "Payment recorded"
                );
                self.publish_created(&payment);
                if payment.status == PaymentStatus::Completed {
                    self.publish_completed(&payment).await?;
                }
                Ok(payment)
            }
            PaymentInsert::Duplicate(existing) => {
                warn!("Duplicate receipt {}", existing.receipt_number);
                Err(AppError::DuplicateReceipt(existing.receipt_number))
            }
        }
    }

    /// Move a payment to a new status
    ///
    /// Repeating the current status is a no-op; any other change to a
    /// completed or failed payment is an illegal transition.
    #[instrument(skip(self))]
    pub async fn update_payment_status(&self, id: Uuid, to: PaymentStatus) -> AppResult<Payment> {
        if !to.is_terminal() {
            let current = self
                .store
                .find_payment(id)
                .await?
                .ok_or_else(|| AppError::PaymentNotFound(id.to_string()))?;
            return if current.status == to {
                Ok(current)
            } else {
                Err(AppError::IllegalTransition {
                    from: current.status.to_string(),
                    to: to.to_string(),
                })
            };
        }

        match self.store.transition_payment(id, to).await? {
            PaymentTransition::Applied {
                payment,
                bill,
                invoice,
            } => {
                info!(
                    payment_id = %payment.id,
                    bill_status = %bill.payment_status,
                    "Payment {}",
                    payment.status
                );
                let event = match payment.status {
                    PaymentStatus::Completed => BillingEvent::PaymentCompleted {
                        payment: payment.clone(),
                        bill,
                        invoice,
                    },
                    _ => BillingEvent::PaymentFailed {
                        payment: payment.clone(),
                    },
                };
                self.events.publish(event);
                Ok(payment)
            }
            PaymentTransition::NotPending(current) if current.status == to => {
                debug!("Payment {} already {}", id, to);
                Ok(current)
            }
            PaymentTransition::NotPending(current) => {
                warn!("Rejected payment {} transition {} -> {}", id, current.status, to);
                Err(AppError::IllegalTransition {
                    from: current.status.to_string(),
                    to: to.to_string(),
                })
            }
        }
    }

    /// Apply an inbound settlement confirmation
    ///
    /// A repeated notification for a recorded receipt returns the existing
    /// payment with `duplicate = true` and changes nothing.
    #[instrument(skip(self, notice), fields(receipt = %notice.receipt_number))]
    pub async fn apply_settlement_callback(
        &self,
        notice: SettlementNotice,
    ) -> AppResult<SettlementOutcome> {
        notice.validate().map_err(AppError::Validation)?;
        let receipt = notice.receipt_number.trim().to_string();

        if let Some(existing) = self.store.find_payment_by_receipt(&receipt).await? {
            debug!("Settlement {} already applied", receipt);
            return Ok(SettlementOutcome {
                payment: existing,
                duplicate: true,
            });
        }

        let reference = notice.bill_reference.trim();
        let bill_id = Uuid::parse_str(reference).map_err(|_| {
            warn!("Settlement {} references unknown bill {:?}", receipt, reference);
            AppError::BillNotFound(reference.to_string())
        })?;
        let bill = self.bill(bill_id).await?;

        if notice.amount < bill.total_amount {
            warn!(
                "Settlement {} of {} is below bill total {}",
                receipt, notice.amount, bill.total_amount
            );
        }

        let request = NewPayment {
            bill_id: bill.id,
            customer_id: bill.customer_id,
            amount: notice.amount,
            method: self.config.settlement_method.clone(),
            invoice_id: self.open_invoice(bill.id).await?.map(|i| i.id),
            receipt_number: Some(receipt),
            phone_number: notice.phone_number,
            status: PaymentStatus::Completed,
        };

        match self.store.insert_payment(&request.into_payment(Utc::now())).await? {
            PaymentInsert::Created(payment) => {
                info!(payment_id = %payment.id, bill_id = %bill.id, "Settlement applied");
                self.publish_created(&payment);
                self.publish_completed(&payment).await?;
                Ok(SettlementOutcome {
                    payment,
                    duplicate: false,
                })
            }
            PaymentInsert::Duplicate(existing) => Ok(SettlementOutcome {
                payment: existing,
                duplicate: true,
            }),
        }
    }
}
