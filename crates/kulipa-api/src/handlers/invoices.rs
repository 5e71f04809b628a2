//! Invoice handlers

use crate::dto::{
    ApiResponse, AsOfParams, InvoiceCreateRequest, InvoiceDetailResponse, OverdueSweepResponse,
    StatusUpdateRequest,
};
use actix_web::{web, HttpResponse};
use kulipa_core::models::InvoiceStatus;
use kulipa_core::traits::{BillingStore, CacheService};
use kulipa_core::AppError;
use kulipa_services::BillingEngine;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Issue an additional invoice for an existing bill
///
/// POST /api/v1/invoices
#[instrument(skip(engine, req))]
pub async fn create_invoice<S: BillingStore, K: CacheService>(
    engine: web::Data<BillingEngine<S, K>>,
    req: web::Json<InvoiceCreateRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Invoice validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let invoice = engine.issue_invoice_for_bill(req.to_one_off()?).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(invoice)))
}

/// GET /api/v1/invoices/{id}
#[instrument(skip(engine))]
pub async fn get_invoice<S: BillingStore, K: CacheService>(
    engine: web::Data<BillingEngine<S, K>>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let detail = engine.invoice_detail(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(InvoiceDetailResponse::from(detail))))
}

/// Manually override an invoice status
///
/// PUT /api/v1/invoices/{id}/status
#[instrument(skip(engine, req))]
pub async fn update_invoice_status<S: BillingStore, K: CacheService>(
    engine: web::Data<BillingEngine<S, K>>,
    path: web::Path<Uuid>,
    req: web::Json<StatusUpdateRequest>,
) -> Result<HttpResponse, AppError> {
    let status = req.parse(InvoiceStatus::from_str)?;
    let invoice = engine
        .override_invoice_status(path.into_inner(), status)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(invoice)))
}

/// Flip past-due invoices to overdue
///
/// POST /api/v1/invoices/overdue-sweep
#[instrument(skip(engine, query))]
pub async fn sweep_overdue<S: BillingStore, K: CacheService>(
    engine: web::Data<BillingEngine<S, K>>,
    query: web::Query<AsOfParams>,
) -> Result<HttpResponse, AppError> {
    let as_of = query.resolve();
    let marked_overdue = engine.mark_overdue(as_of).await?;
    info!(marked_overdue, "Overdue sweep finished");

    Ok(HttpResponse::Ok().json(ApiResponse::success(OverdueSweepResponse {
        as_of,
        marked_overdue,
    })))
}

/// Configure invoice routes
pub fn configure<S: BillingStore, K: CacheService>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/invoices")
            .route("", web::post().to(create_invoice::<S, K>))
            .route("/overdue-sweep", web::post().to(sweep_overdue::<S, K>))
            .route("/{id}", web::get().to(get_invoice::<S, K>))
            .route("/{id}/status", web::put().to(update_invoice_status::<S, K>)),
    );
}
