//! Usage and billing handlers
//!
//! Usage intake, charge previews, bill issuance and month-end forecasts.

use crate::dto::{
    ApiResponse, AsOfParams, ChargesResponse, ForecastResponse, IssuedBillResponse,
    UsageCreateRequest, UsageResponse,
};
use actix_web::{web, HttpResponse};
use kulipa_core::traits::{BillingStore, CacheService};
use kulipa_core::AppError;
use kulipa_services::BillingEngine;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

/// Append a metered usage record
///
/// POST /api/v1/usage
#[instrument(skip(engine, req))]
pub async fn create_usage<S: BillingStore, K: CacheService>(
    engine: web::Data<BillingEngine<S, K>>,
    req: web::Json<UsageCreateRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Usage validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let record = engine.record_usage(req.to_record()?).await?;
    debug!(usage_id = record.id, "Usage recorded");

    Ok(HttpResponse::Created().json(ApiResponse::success(UsageResponse::from(record))))
}

/// Preview charges for a customer's unbilled usage
///
/// GET /api/v1/customers/{id}/charges
#[instrument(skip(engine))]
pub async fn get_charges<S: BillingStore, K: CacheService>(
    engine: web::Data<BillingEngine<S, K>>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let rated = engine.compute_charges(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(ChargesResponse::from(rated))))
}

/// Bill a customer's unbilled usage
///
/// POST /api/v1/customers/{id}/bills
#[instrument(skip(engine))]
pub async fn issue_bill<S: BillingStore, K: CacheService>(
    engine: web::Data<BillingEngine<S, K>>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let customer_id = path.into_inner();
    let issued = engine.issue_bill(customer_id).await?;

    info!(
        customer_id,
        invoice_number = %issued.invoice.invoice_number,
        "Bill issued via API"
    );

    Ok(HttpResponse::Created().json(ApiResponse::with_message(
        IssuedBillResponse::from(issued),
        "Bill generated successfully",
    )))
}

/// Project current charges to the end of the month
///
/// GET /api/v1/customers/{id}/forecast
#[instrument(skip(engine, query))]
pub async fn get_forecast<S: BillingStore, K: CacheService>(
    engine: web::Data<BillingEngine<S, K>>,
    path: web::Path<i32>,
    query: web::Query<AsOfParams>,
) -> Result<HttpResponse, AppError> {
    let forecast = engine
        .forecast(path.into_inner(), query.resolve())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(ForecastResponse::from(forecast))))
}

/// Configure usage and billing routes
pub fn configure<S: BillingStore, K: CacheService>(cfg: &mut web::ServiceConfig) {
    cfg.route("/usage", web::post().to(create_usage::<S, K>))
        .service(
            web::scope("/customers/{id}")
                .route("/charges", web::get().to(get_charges::<S, K>))
                .route("/bills", web::post().to(issue_bill::<S, K>))
                .route("/forecast", web::get().to(get_forecast::<S, K>)),
        );
}
