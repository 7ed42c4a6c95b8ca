mod blob_client;
mod circuit_breaker;
mod config;
mod errors;
mod handlers;
mod identifiers;
mod models;
mod notifications;
mod pricing;
mod record_store;
mod vat;
mod webhook_handler;
mod webhook_models;

use axum::{
    routing::{get, patch, post},
    Router,
};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::blob_client::BlobClient;
use crate::config::Config;
use crate::notifications::NotificationService;
use crate::pricing::PricingCatalog;
use crate::record_store::RecordStore;

/// Main entry point for the application.
///
/// Initializes logging, configuration, the blob-backed record store, the
/// webhook de-duplication cache, and the notification service, then starts
/// the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warmeleads_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Blob store client; missing credentials fail fast here, before any
    // request can hit a degraded write path.
    let blob = BlobClient::from_config(&config)
        .map_err(|e| anyhow::anyhow!("Blob store configuration error: {}", e))?;
    let store = RecordStore::new(blob);
    tracing::info!("Blob record store initialized");

    // Static pricing configuration
    let catalog = PricingCatalog::default_nl();
    tracing::info!("Pricing catalog loaded");

    // Webhook event de-duplication cache (24h TTL, 50k max entries).
    // Payment providers redeliver events; an id in this cache is
    // acknowledged without re-processing.
    let processed_events_cache = Cache::builder()
        .time_to_live(Duration::from_secs(86400))
        .max_capacity(50_000)
        .build();
    tracing::info!("Webhook de-duplication cache initialized");

    let notifications = Arc::new(NotificationService::new(&config));

    // Build application state
    let app_state = Arc::new(handlers::AppState {
        config: config.clone(),
        store,
        catalog,
        notifications,
        processed_events_cache,
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .unwrap(),
    );

    // Build protected routes with security layers
    let protected_routes = Router::new()
        // Pricing & orders
        .route("/api/v1/orders/quote", post(handlers::quote_order))
        .route("/api/v1/orders", post(handlers::create_order))
        // Customer portal records
        .route(
            "/api/v1/customers/:email",
            get(handlers::get_customer).patch(handlers::patch_customer),
        )
        .route(
            "/api/v1/customers/:email/orders",
            get(handlers::list_orders),
        )
        .route(
            "/api/v1/customers/:email/orders/:order_number",
            get(handlers::get_order).delete(handlers::delete_order),
        )
        .route(
            "/api/v1/customers/:email/orders/:order_number/status",
            patch(handlers::update_order_status),
        )
        .route(
            "/api/v1/customers/:email/leads",
            post(handlers::add_leads),
        )
        .route(
            "/api/v1/customers/:email/leads/:lead_id",
            patch(handlers::patch_lead),
        )
        // Payment provider webhook
        .route(
            "/api/v1/webhooks/payment",
            post(webhook_handler::payment_webhook),
        )
        .layer(
            ServiceBuilder::new()
                // Request size limit: 5MB max payload (prevents memory exhaustion)
                .layer(RequestBodyLimitLayer::new(5 * 1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Build final app with health check (bypasses rate limiting)
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
