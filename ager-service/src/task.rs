//! Background task running the scheduler periodically.

use crate::config::SchedulerConfig;
use crate::tracker::Ager;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

/// Spawn a background scheduler task.
///
/// Returns a handle that can be used to abort the task.
pub fn spawn_scheduler_task(
    ager: Arc<Ager>,
    config: SchedulerConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if !config.enabled {
            tracing::info!("Scheduler task disabled");
            return;
        }

        let interval_secs = config.interval_secs.max(1);
        tracing::info!("Scheduler task started (interval: {}s)", interval_secs);

        let mut timer = interval(Duration::from_secs(interval_secs));

        loop {
            timer.tick().await;

            match ager.run_scheduler(None, None).await {
                Ok(ready) => {
                    if ready.is_empty() {
                        tracing::debug!("Scheduler: no watermark advanced");
                    }
                    for (key, range) in &ready {
                        tracing::info!(partition = %key, ready = %range, "Scheduler: keys ready");
                    }
                }
                Err(e) => {
                    tracing::error!("Scheduler error: {}", e);
                }
            }
        }
    })
}
