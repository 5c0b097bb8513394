use anyhow::Context;
use planner_ml::{
    api::{build_router_with_timeout, AppState},
    config::Config,
    ml::PlannerService,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Using default configuration");
        Config::default()
    });

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "planner_ml={},tower_http={}",
            config.observability.log_level, config.observability.log_level
        )
        .into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting planner-ml v{}", env!("CARGO_PKG_VERSION"));

    // Initialize Prometheus metrics
    if config.observability.prometheus_enabled {
        if let Err(e) = planner_ml::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        } else {
            tracing::info!("✅ Prometheus metrics initialized");
        }
    } else {
        tracing::info!("⚠️  Prometheus metrics disabled in configuration");
    }

    // Build the engines; model loading never fails startup
    let service = Arc::new(PlannerService::new(
        config.detection.clone(),
        config.prediction.clone(),
    ));
    let status = service.status();
    tracing::info!(
        strategy = %status.detection_strategy,
        "✅ Blocker detector initialized"
    );
    if status.model_trained {
        tracing::info!(loader = ?status.loader, "✅ Timeline model loaded");
    } else {
        tracing::warn!(loader = ?status.loader, "⚠️  No timeline model, using rule-based predictions");
    }

    let app = build_router_with_timeout(
        AppState::new(service),
        Duration::from_secs(config.server.request_timeout_secs),
    );

    // Start HTTP server
    let http_addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .with_context(|| format!("failed to bind {}", http_addr))?;

    tracing::info!("🚀 HTTP API server listening on http://{}", http_addr);
    tracing::info!("   Health check: http://{}/health", http_addr);
    tracing::info!("   Metrics: http://{}/metrics", http_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
        })
        .await
        .context("HTTP server error")?;

    tracing::info!("Shutting down gracefully...");
    Ok(())
}
