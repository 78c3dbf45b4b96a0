//! payflow HTTP Server
//!
//! Axum-based caller boundary for the payment adapters: starts payments,
//! answers status and refund requests, and applies verified PSP webhooks to
//! the order store.

mod handlers;
mod orders;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use payflow_providers::{AdapterFactory, PaymentsConfig};

use crate::handlers::{
    health_check, init_payment, mock_callback, payment_status, refund_payment, webhook,
};
use crate::orders::MemoryOrderStore;
use crate::state::AppState;

/// All routes, without the outer CORS/trace layers
pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(health_check))

        // Payments
        .route("/api/payments/{provider}/init", post(init_payment))
        .route("/api/payments/{provider}/status/{provider_ref}", get(payment_status))
        .route("/api/payments/{provider}/refund", post(refund_payment))

        // Development-only hosted page stand-in
        .route("/api/payments/mock/{provider}", get(mock_callback))

        // PSP callbacks
        .route("/webhook/{provider}", post(webhook))

        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Payment adapters; missing credentials surface on first use
    let config = PaymentsConfig::from_env();
    let production = config.deployment.environment.is_production();
    let public_base_url = config.deployment.public_base_url.clone();

    for (provider, configured) in [
        ("stripe", config.stripe.secret_key.is_set() && config.stripe.webhook_secret.is_set()),
        (
            "paytr",
            config.paytr.merchant_id.is_set()
                && config.paytr.merchant_key.is_set()
                && config.paytr.merchant_salt.is_set(),
        ),
        ("iyzico", config.iyzico.api_key.is_set() && config.iyzico.secret_key.is_set()),
    ] {
        if configured {
            tracing::info!(provider, "✓ Provider configured");
        } else {
            tracing::warn!(provider, "⚠ Provider credentials missing - requests will fail");
        }
    }

    let state = AppState::new(
        AdapterFactory::new(config),
        Arc::new(MemoryOrderStore::new()),
    )
    .with_timeout_from_env();

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 payflow server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health                                   - Health check");
    tracing::info!("  POST /api/payments/{{provider}}/init            - Start a payment");
    tracing::info!("  GET  /api/payments/{{provider}}/status/{{ref}}    - Provider status");
    tracing::info!("  POST /api/payments/{{provider}}/refund          - Refund a payment");
    tracing::info!("  POST /webhook/{{provider}}                       - PSP callbacks");
    if production {
        tracing::info!("Mode: production (PSP hosted pages)");
    } else {
        tracing::info!("  GET  /api/payments/mock/{{provider}}            - Mock hosted page");
        tracing::info!("Mode: development (mock pages at {})", public_base_url);
    }
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
