//! Kulipa Billing Server
//!
//! Usage rating, bill and invoice issuance, and payment reconciliation
//! over PostgreSQL, with an optional Redis plan cache.

use actix_cors::Cors;
use actix_web::{http::header, web, App, HttpResponse, HttpServer};
use anyhow::Context;
use kulipa_api::configure_api;
use kulipa_cache::RedisCache;
use kulipa_core::AppConfig;
use kulipa_db::{create_pool, run_migrations, PgStore};
use kulipa_services::{BillingEngine, TracingEventSink};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

type Engine = BillingEngine<PgStore, RedisCache>;

/// Health check endpoint
async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "kulipa-billing",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Configure API routes
fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(health_check))
            .configure(configure_api::<PgStore, RedisCache>),
    );
}

/// Initialize tracing/logging
///
/// `RUST_LOG` wins over `LOG_LEVEL`; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "kulipa_billing={lvl},kulipa_api={lvl},kulipa_services={lvl},kulipa_db={lvl},kulipa_cache={lvl},actix_web=info,sqlx=warn",
            lvl = log_level
        ))
    });

    let json = env::var("LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(fmt::layer().json().with_current_span(true))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true),
            )
            .init();
    }
}

/// Connect the plan cache, or run uncached when Redis is absent or down
async fn connect_cache(config: &AppConfig) -> Option<Arc<RedisCache>> {
    let redis = config.redis.as_ref()?;

    match RedisCache::new(&redis.url).await {
        Ok(cache) => {
            info!("Plan cache connected to Redis");
            Some(Arc::new(cache))
        }
        Err(e) => {
            warn!("Redis unavailable, plan catalog runs uncached: {}", e);
            None
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting Kulipa Billing v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load().context("Failed to load configuration")?;

    info!("Connecting to database...");
    let pool = create_pool(&config.database)
        .await
        .context("Failed to create database pool")?;
    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let cache = connect_cache(&config).await;

    let engine: web::Data<Engine> = web::Data::new(BillingEngine::new(
        Arc::new(PgStore::new(pool)),
        cache,
        config.billing.clone(),
        Arc::new(TracingEventSink),
    ));

    let cors_origins = env::var("CORS_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string());

    let bind_addr = config.server_addr();
    info!(
        "Starting HTTP server on {} with {} workers",
        bind_addr, config.server.workers
    );

    HttpServer::new(move || {
        let cors_origins_inner = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _req_head| {
                origin
                    .to_str()
                    .map(|o| cors_origins_inner.split(',').any(|allowed| allowed.trim() == o))
                    .unwrap_or(false)
            })
            .allowed_methods(vec!["GET", "POST", "PUT", "OPTIONS"])
            .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
            .max_age(3600);

        App::new()
            .app_data(engine.clone())
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                let message = err.to_string();
                actix_web::error::InternalError::from_response(
                    err,
                    HttpResponse::BadRequest().json(serde_json::json!({
                        "error": "invalid_json",
                        "kind": "validation",
                        "message": message,
                        "status": 400,
                    })),
                )
                .into()
            }))
            .wrap(cors)
            .wrap(TracingLogger::default())
            .configure(configure_routes)
    })
    .workers(config.server.workers)
    .client_request_timeout(Duration::from_secs(config.server.timeout_secs))
    .bind(&bind_addr)?
    .run()
    .await?;

    Ok(())
}
