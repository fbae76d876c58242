use anyhow::Result;
use gsm_panic::config::{ConfigProvider, FileConfigProvider};
use gsm_panic::{Config, Controller};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let provider = match std::env::args().nth(1) {
        Some(path) => FileConfigProvider::new(path),
        None => FileConfigProvider::from_default_locations(),
    };

    // Logging needs a config even when the real one is broken
    let initial = provider.load_config();
    let logging = initial
        .as_ref()
        .map_or_else(|_| Config::default().logging, |c| c.logging.clone());
    gsm_panic::logging::init_logging(&logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialise logging: {}", e))?;

    info!(
        "gsm-panic {} starting up",
        option_env!("APP_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
    );
    if let Err(e) = &initial {
        warn!("Starting with unusable configuration: {}", e);
    }

    let controller = Arc::new(Controller::new(Arc::new(provider)));
    controller
        .start(true)
        .map_err(|e| anyhow::anyhow!("Failed to start controller: {}", e))?;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    let stopping = Arc::clone(&controller);
    tokio::task::spawn_blocking(move || stopping.stop()).await?;
    info!("Shutdown complete");
    Ok(())
}
