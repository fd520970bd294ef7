//! codekit HTTP Server
//!
//! Axum-based server exposing the AI code tools and Stripe billing.

mod handlers;
mod identity;
mod routes;
mod state;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use codekit_billing::{BillingClient, EntitlementTiers, MemoryEntitlementStore};
use codekit_core::{Gateway, GatewayConfig, LlmProvider, UsageMeter};
use codekit_runtime::OpenAiProvider;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    // Initialize LLM provider
    let provider: Option<Arc<dyn LlmProvider>> = match OpenAiProvider::from_env() {
        Ok(provider) => {
            tracing::info!("✓ OpenAI provider configured");
            Some(Arc::new(provider))
        }
        Err(e) => {
            tracing::warn!(error = %e, "⚠ AI provider not configured - tool requests will fail");
            tracing::warn!("  Set OPENAI_API_KEY in .env");
            None
        }
    };

    // Initialize billing
    let entitlements = Arc::new(MemoryEntitlementStore::new());
    let billing = match BillingClient::from_env() {
        Ok(client) => {
            tracing::info!(config = ?client.config(), "✓ Stripe configured");
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!(error = %e, "⚠ Stripe not configured - payments disabled");
            tracing::warn!("  Set STRIPE_SECRET_KEY and STRIPE_WEBHOOK_SECRET in .env");
            None
        }
    };

    let config = GatewayConfig::from_env();
    tracing::info!(
        model = %config.generation.model,
        timeout_secs = config.timeout.as_secs(),
        unknown_tools = ?config.unknown_tools,
        "Gateway configured"
    );

    let gateway = Gateway::new(
        provider,
        Arc::new(EntitlementTiers::new(entitlements.clone())),
        Arc::new(UsageMeter::new()),
        config,
    );

    // Build application state
    let state = AppState::new(Arc::new(gateway), entitlements, billing);
    let app = routes::router(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!(%addr, "🚀 codekit server running");
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health           - Health check");
    tracing::info!("  GET  /api/tools        - Tool catalog");
    tracing::info!("  POST /api/ai           - Run an AI tool");
    tracing::info!("  GET  /api/entitlement  - Plan and daily usage");
    tracing::info!("  POST /api/checkout     - Create Stripe checkout");
    tracing::info!("  POST /api/portal       - Open billing portal");
    tracing::info!("  POST /api/webhook      - Stripe webhook");

    axum::serve(listener, app).await?;

    Ok(())
}
