//! Fraud Scoring API - Main Entry Point
//!
//! Loads the trained classifier once, then serves `POST /predict` until
//! interrupted.

use anyhow::{Context, Result};
use fraud_scoring_api::{
    config::{AppConfig, LogFormat, LoggingConfig},
    metrics::{MetricsReporter, ServiceMetrics},
    models::{FraudClassifier, OnnxClassifier},
    create_router, AppState,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;

    // Initialize logging
    init_tracing(&config.logging)?;

    info!("Starting Fraud Scoring API");
    info!(
        model_path = %config.model.path.display(),
        onnx_threads = config.model.onnx_threads,
        "Configuration loaded successfully"
    );

    // The service cannot start without its model
    let classifier = OnnxClassifier::load(&config.model).with_context(|| {
        format!(
            "Failed to load classifier from {}",
            config.model.path.display()
        )
    })?;
    info!(
        model = %classifier.name(),
        input = %classifier.input_name(),
        output = %classifier.output_name(),
        "Classifier loaded"
    );

    let metrics = Arc::new(ServiceMetrics::new());

    if config.metrics.report_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
        tokio::spawn(reporter.start());
    }

    let state = AppState::new(Arc::new(classifier), metrics.clone());
    let app = create_router(state);

    let listener = TcpListener::bind((config.server.host.as_str(), config.server.port))
        .await
        .with_context(|| {
            format!(
                "Failed to bind {}:{}",
                config.server.host, config.server.port
            )
        })?;
    info!(address = %listener.local_addr()?, "Listening for scoring requests");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Fraud Scoring API shutting down...");
    metrics.print_summary();

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(logging.default_directives())?,
    };

    match logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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

    info!("Shutdown signal received");
}
