//! Billing engine facade
//!
//! Wires the catalog, rating, issuance, invoice desk, reconciliation and
//! reporting services over one shared store handle. The request layer
//! holds a single `BillingEngine` and calls through it.

use chrono::{DateTime, Utc};
use kulipa_core::{
    models::{
        Forecast, Invoice, InvoiceStatus, NewPayment, NewUsageRecord, Payment, PaymentStatus,
        SettlementNotice, UsageRecord,
    },
    traits::{BillingStore, CacheService, EventSink},
    AppError, AppResult, BillingConfig,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::catalog::{NoCache, PlanCatalog};
use crate::invoices::{InvoiceDesk, InvoiceDetail};
use crate::issuer::{BillIssuer, IssuedBill, OneOffInvoice};
use crate::rating::{RatedUsage, RatingEngine};
use crate::reconciler::{PaymentReconciler, SettlementOutcome};
use crate::reports::{FinancialSummary, ReportService};

pub struct BillingEngine<S, K = NoCache> {
    store: Arc<S>,
    config: BillingConfig,
    catalog: Arc<PlanCatalog<S, K>>,
    rating: Arc<RatingEngine<S, K>>,
    issuer: BillIssuer<S, K>,
    desk: InvoiceDesk<S>,
    reconciler: PaymentReconciler<S>,
    reports: ReportService<S>,
}

impl<S: BillingStore, K: CacheService> BillingEngine<S, K> {
    pub fn new(
        store: Arc<S>,
        cache: Option<Arc<K>>,
        config: BillingConfig,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let catalog = Arc::new(PlanCatalog::new(
            store.clone(),
            cache,
            config.plan_cache_ttl_secs,
        ));
        let rating = Arc::new(RatingEngine::new(
            store.clone(),
            catalog.clone(),
            config.tax_rate,
        ));

        info!(
            tax_rate = %config.tax_rate,
            grace_days = config.invoice_grace_days,
            currency = %config.currency,
            "Billing engine initialised"
        );

        Self {
            issuer: BillIssuer::new(store.clone(), rating.clone(), config.clone(), events.clone()),
            desk: InvoiceDesk::new(store.clone(), events.clone()),
            reconciler: PaymentReconciler::new(store.clone(), config.clone(), events),
            reports: ReportService::new(store.clone(), config.currency.clone()),
            store,
            config,
            catalog,
            rating,
        }
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    pub fn catalog(&self) -> &PlanCatalog<S, K> {
        &self.catalog
    }

    /// Append a metered usage record
    #[instrument(skip(self, record), fields(customer_id = record.customer_id))]
    pub async fn record_usage(&self, record: NewUsageRecord) -> AppResult<UsageRecord> {
        record.validate().map_err(|msg| {
            warn!("Rejected usage record: {}", msg);
            AppError::Validation(msg)
        })?;
        self.store.append_usage(&record).await
    }

    pub async fn compute_charges(&self, customer_id: i32) -> AppResult<RatedUsage> {
        self.rating.compute_charges(customer_id).await
    }

    pub async fn issue_bill(&self, customer_id: i32) -> AppResult<IssuedBill> {
        self.issuer.issue_bill(customer_id).await
    }

    pub async fn forecast(&self, customer_id: i32, as_of: DateTime<Utc>) -> AppResult<Forecast> {
        self.issuer.forecast(customer_id, as_of).await
    }

    pub async fn issue_invoice_for_bill(&self, request: OneOffInvoice) -> AppResult<Invoice> {
        self.issuer.issue_invoice_for_bill(request).await
    }

    pub async fn invoice_detail(&self, invoice_id: Uuid) -> AppResult<InvoiceDetail> {
        self.desk.invoice_detail(invoice_id).await
    }

    pub async fn override_invoice_status(
        &self,
        invoice_id: Uuid,
        status: InvoiceStatus,
    ) -> AppResult<Invoice> {
        self.desk.override_status(invoice_id, status).await
    }

    pub async fn mark_overdue(&self, as_of: DateTime<Utc>) -> AppResult<usize> {
        self.desk.mark_overdue(as_of).await
    }

    pub async fn record_payment(&self, request: NewPayment) -> AppResult<Payment> {
        self.reconciler.record_payment(request).await
    }

    pub async fn update_payment_status(
        &self,
        payment_id: Uuid,
        status: PaymentStatus,
    ) -> AppResult<Payment> {
        self.reconciler.update_payment_status(payment_id, status).await
    }

    pub async fn apply_settlement_callback(
        &self,
        notice: SettlementNotice,
    ) -> AppResult<SettlementOutcome> {
        self.reconciler.apply_settlement_callback(notice).await
    }

    pub async fn financial_summary(&self) -> AppResult<FinancialSummary> {
        self.reports.financial_summary().await
    }

    pub async fn find_payment(&self, payment_id: Uuid) -> AppResult<Payment> {
        self.store
            .find_payment(payment_id)
            .await?
            .ok_or_else(|| AppError::PaymentNotFound(payment_id.to_string()))
    }
}
