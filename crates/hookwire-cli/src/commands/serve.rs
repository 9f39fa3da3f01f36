//! Run the Hookwire server

use anyhow::{Context, Result};
use hookwire_core::Config;
use hookwire_runtime::Runtime;

/// Run the serve command
pub async fn run(config_path: &str, bind: Option<&str>) -> Result<()> {
    tracing::info!("Loading configuration from {}", config_path);

    let config = Config::load(config_path).context("Failed to load configuration")?;

    tracing::info!("Project: {}", config.project.name);

    let runtime = Runtime::new(config)
        .await
        .context("Failed to initialize runtime")?;
    let (producers, consumers) = runtime
        .seed()
        .await
        .context("Failed to load definitions")?;
    tracing::info!(producers, consumers, "Definitions loaded");

    tracing::info!("Starting server (press Ctrl+C to stop)");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        tracing::info!("Received shutdown signal");
    };

    runtime
        .start(bind, shutdown)
        .await
        .context("Runtime error")?;
    runtime.shutdown().await.context("Shutdown error")?;

    tracing::info!("Hookwire stopped");
    Ok(())
}
