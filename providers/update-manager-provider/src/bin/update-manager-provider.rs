//! # Update Manager wasmCloud Provider Binary
//!
//! Entry point for the plugin update manager capability provider.

use anyhow::{Context, Result};
use tracing::{error, info};
use wasmcloud_provider_sdk::{load_host_data, run_provider};

use update_manager_provider::{UpdateManagerConfig, UpdateManagerProvider};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("update_manager_provider=info".parse()?),
        )
        .init();

    info!("Starting Update Manager Provider for wasmCloud");

    let host_data = load_host_data().context("Failed to load wasmCloud host data")?;

    info!("Provider ID: {}", host_data.provider_key);
    info!("Config entries: {}", host_data.config.len());

    let config = if !host_data.config.is_empty() {
        info!("Using configuration from wasmCloud HostData");
        UpdateManagerConfig::from_properties(&host_data.config)
    } else {
        info!("Falling back to environment variables");
        UpdateManagerConfig::from_env()
    };

    info!("Configuration:");
    info!("  NATS_URL: {}", config.nats_url);
    info!("  Discord webhook: {}", config.discord_webhook_url.is_some());
    info!("  Batch delay: {}ms", config.batch_delay_ms);
    info!("  Check interval: {}", config.update_check_interval);
    info!(
        "  Reminders: {} (every {}, max {})",
        config.reminder_settings.enabled,
        config.reminder_settings.interval,
        config.reminder_settings.max_reminders
    );

    let provider = UpdateManagerProvider::from_config(config)
        .await
        .context("Failed to create Update Manager provider")?;

    let runtime_provider = provider.clone();
    tokio::spawn(async move {
        if let Err(e) = provider.start().await {
            error!("Provider error: {}", e);
        }
    });

    let handler = run_provider(runtime_provider, "update-manager-provider")
        .await
        .context("Provider runtime error")?;
    handler.await;

    info!("Update Manager Provider shutdown complete");
    Ok(())
}
