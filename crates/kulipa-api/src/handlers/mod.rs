//! HTTP request handlers

pub mod billing;
pub mod invoices;
pub mod payments;
pub mod reports;

use actix_web::web;
use kulipa_core::traits::{BillingStore, CacheService};

pub use billing::configure as configure_billing;
pub use invoices::configure as configure_invoices;
pub use payments::configure as configure_payments;
pub use reports::configure as configure_reports;

/// Mount every billing route on `cfg`
///
/// Expects `web::Data<BillingEngine<S, K>>` to be registered on the app.
pub fn configure_api<S: BillingStore, K: CacheService>(cfg: &mut web::ServiceConfig) {
    cfg.configure(configure_billing::<S, K>)
        .configure(configure_invoices::<S, K>)
        .configure(configure_payments::<S, K>)
        .configure(configure_reports::<S, K>);
}
