//! Reporting handlers

use crate::dto::ApiResponse;
use actix_web::{web, HttpResponse};
use kulipa_core::traits::{BillingStore, CacheService};
use kulipa_core::AppError;
use kulipa_services::BillingEngine;
use tracing::instrument;

/// GET /api/v1/reports/financial-summary
#[instrument(skip(engine))]
pub async fn financial_summary<S: BillingStore, K: CacheService>(
    engine: web::Data<BillingEngine<S, K>>,
) -> Result<HttpResponse, AppError> {
    let summary = engine.financial_summary().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(summary)))
}

/// Configure report routes
pub fn configure<S: BillingStore, K: CacheService>(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/reports/financial-summary",
        web::get().to(financial_summary::<S, K>),
    );
}
