//! Fraud Scoring Service - entry point
//!
//! Loads the production model from the registry, then serves it. A model
//! that cannot be loaded stops the process before the port is bound.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use fraud_scoring_service::{
    config::{self, LogFormat},
    create_router, scoring, telemetry, AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fraud_scoring_service=info,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    tracing::info!("Fraud Scoring Service starting...");
    tracing::info!("Model registry: {}", config.tracking_uri);

    let (model, scorer) = scoring::load_model(&config)
        .await
        .context("Failed to load fraud model")?;
    tracing::info!(
        name = %model.name,
        stage = %model.stage,
        version = %model.version,
        run_id = model.run_id.as_deref().unwrap_or("-"),
        artifact = %model.artifact_uri,
        size_bytes = model.size_bytes,
        loaded_at = %model.loaded_at,
        "Model loaded"
    );

    let prometheus = telemetry::install_recorder().context("Failed to install metrics recorder")?;
    let metrics = Arc::new(
        telemetry::MetricsStore::new().context("Failed to register scoring metrics")?,
    );

    let state = AppState {
        pipeline: scoring::ScoringPipeline::new(Arc::new(scorer), metrics.clone()),
        metrics,
        prometheus,
    };
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
