//! Torrent Deck Companion - Entry Point
//!
//! Loads configuration, starts the inhibitor client, and surfaces every
//! observed state change until shutdown.

use std::sync::Arc;

use anyhow::Result;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use torrent_deck::core::config::Config;
use torrent_deck::inhibitor::{update_callback, InhibitorClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Torrent Deck companion");

    // Load configuration
    let config = Config::load()?;
    info!("Configuration loaded");

    let on_update_available = update_callback(|newest, current| async move {
        info!(%newest, %current, "inhibitor daemon update available");
        Ok(())
    });
    let client = Arc::new(InhibitorClient::new(
        config.inhibitor.clone(),
        Some(on_update_available),
    ));

    // Drive the connect/refresh loop in the background
    let run_client = Arc::clone(&client);
    let run_task = tokio::spawn(async move { run_client.run().await });

    // Surface every observed state change until shutdown
    let notifier = client.change_notifier();
    loop {
        tokio::select! {
            _ = notifier.wait() => {
                notifier.clear();
                info!(
                    status = %client.status_text(),
                    version = %client.remote_version(),
                    "inhibitor state changed"
                );
            }
            _ = signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    client.teardown();
    run_task.abort();
    Ok(())
}
