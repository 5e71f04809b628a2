//! Payment handlers
//!
//! Direct payment recording, status updates and the settlement callback.
//! The callback is reachable by the payment provider, so every failure
//! it returns goes through `AppError::public_message`.

use crate::dto::{
    ApiResponse, PaymentCreateRequest, SettlementAck, SettlementCallbackRequest,
    StatusUpdateRequest,
};
use actix_web::{web, HttpResponse};
use kulipa_core::models::PaymentStatus;
use kulipa_core::traits::{BillingStore, CacheService};
use kulipa_core::AppError;
use kulipa_services::BillingEngine;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// POST /api/v1/payments
#[instrument(skip(engine, req))]
pub async fn create_payment<S: BillingStore, K: CacheService>(
    engine: web::Data<BillingEngine<S, K>>,
    req: web::Json<PaymentCreateRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Payment validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let payment = engine.record_payment(req.to_new_payment()?).await?;
    Ok(HttpResponse::Created().json(ApiResponse::success(payment)))
}

/// GET /api/v1/payments/{id}
#[instrument(skip(engine))]
pub async fn get_payment<S: BillingStore, K: CacheService>(
    engine: web::Data<BillingEngine<S, K>>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let payment = engine.find_payment(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::success(payment)))
}

/// PUT /api/v1/payments/{id}/status
#[instrument(skip(engine, req))]
pub async fn update_payment_status<S: BillingStore, K: CacheService>(
    engine: web::Data<BillingEngine<S, K>>,
    path: web::Path<Uuid>,
    req: web::Json<StatusUpdateRequest>,
) -> Result<HttpResponse, AppError> {
    let status = req.parse(PaymentStatus::from_str)?;
    let payment = engine
        .update_payment_status(path.into_inner(), status)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(payment)))
}

/// Mobile-money settlement notification
///
/// POST /api/v1/payments/mpesa/callback
#[instrument(skip(engine, req))]
pub async fn settlement_callback<S: BillingStore, K: CacheService>(
    engine: web::Data<BillingEngine<S, K>>,
    req: web::Json<SettlementCallbackRequest>,
) -> Result<HttpResponse, AppError> {
    let outcome = engine
        .apply_settlement_callback(req.into_inner().into())
        .await?;

    let ack = SettlementAck {
        payment_id: outcome.payment.id,
        receipt_number: outcome.payment.receipt_number.clone(),
        duplicate: outcome.duplicate,
    };

    let message = if outcome.duplicate {
        "Settlement already processed"
    } else {
        info!(receipt = %ack.receipt_number, "Settlement callback processed");
        "Settlement processed successfully"
    };

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(ack, message)))
}

/// Configure payment routes
pub fn configure<S: BillingStore, K: CacheService>(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/payments")
            .route("", web::post().to(create_payment::<S, K>))
            .route("/mpesa/callback", web::post().to(settlement_callback::<S, K>))
            .route("/{id}", web::get().to(get_payment::<S, K>))
            .route("/{id}/status", web::put().to(update_payment_status::<S, K>)),
    );
}
