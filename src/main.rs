use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};

use hostlist_builder::config::Config;
use hostlist_builder::engine::{BlocklistManager, StandardManager};
use hostlist_builder::init::setup_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load Config
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or("hostlist.toml".to_string());
    let config = Config::load(&config_path)
        .await
        .with_context(|| format!("Invalid configuration in {}", config_path))?;

    // 2. Setup Logging
    setup_logging(&config.logging);
    info!(
        "Starting hostlist-builder with {} sources, writing {}",
        config.sources.len(),
        config.output.display()
    );

    // 3. Build Manager
    let rebuild_every = config.updates.interval();
    let interval_hours = config.updates.interval_hours;
    let manager = StandardManager::new(config)?;

    // 4. One-shot build: exit status reflects the run
    let Some(period) = rebuild_every else {
        let report = manager.refresh().await.inspect_err(|e| {
            error!("Blocklist build failed: {}", e);
        })?;
        report.log_summary();
        return Ok(());
    };

    // 5. Periodic rebuild until shutdown
    let mut interval = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = signal::ctrl_c() => {
                info!("Shutdown signal received.");
                break;
            }
        }

        // Dropping an unfinished refresh never touches the published list.
        tokio::select! {
            result = manager.refresh() => match result {
                Ok(report) => report.log_summary(),
                Err(e) => error!("Blocklist build failed, keeping previous list: {}", e),
            },
            _ = signal::ctrl_c() => {
                info!("Shutdown signal received during rebuild.");
                break;
            }
        }
        info!("Next rebuild in {} hours", interval_hours);
    }

    Ok(())
}
