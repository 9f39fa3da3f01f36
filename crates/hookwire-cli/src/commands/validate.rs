//! Validate configuration command

use anyhow::{Context, Result};
use hookwire_core::Config;

/// Run the validate command
pub async fn run(config_path: &str) -> Result<()> {
    tracing::info!("Validating configuration: {}", config_path);

    let config = Config::load(config_path).context("Failed to load configuration")?;

    tracing::info!("✓ Project: {}", config.project.name);
    tracing::info!("✓ Version: {}", config.project.version);
    tracing::info!("✓ Store: {:?}", config.project.store.kind);

    let definitions = config
        .load_definitions()
        .context("Failed to load definitions")?;
    tracing::info!(
        "✓ {} producer(s), {} consumer(s)",
        definitions.producers.len(),
        definitions.consumers.len()
    );

    let errors = definitions.check();
    if !errors.is_empty() {
        for error in &errors {
            tracing::error!("✗ {}", error);
        }
        anyhow::bail!("{} definition error(s)", errors.len());
    }

    tracing::info!("✓ Configuration is valid");
    Ok(())
}
