//! Serve command - run the scheduler periodically.

use crate::settings;
use ager_service::{spawn_scheduler_task, Config};
use anyhow::{Context, Result};
use std::sync::Arc;

/// Run the serve command until Ctrl+C.
pub async fn run(config: Config) -> Result<()> {
    if !config.scheduler.enabled {
        anyhow::bail!("Scheduler is disabled in the configuration; nothing to serve");
    }

    let ager = Arc::new(settings::open(&config).await?);
    tracing::info!(
        min_frame_length = ager.min_frame_length(),
        interval_secs = config.scheduler.interval_secs,
        "Serving"
    );
    println!(
        "Running scheduler every {}s (Ctrl+C to stop)",
        config.scheduler.interval_secs
    );

    let handle = spawn_scheduler_task(ager.clone(), config.scheduler.clone());

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    handle.abort();
    println!("Shutting down");
    print!("{}", ager.metrics().render());
    Ok(())
}
