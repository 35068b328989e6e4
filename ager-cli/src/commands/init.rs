//! Initialize a partition.

use ager_service::Ager;
use anyhow::{Context, Result};

/// Run the init command.
pub async fn run(ager: &Ager, key: &str, start: i64, frame_length: u32) -> Result<()> {
    ager.init_partition(key, start, frame_length)
        .await
        .with_context(|| format!("Failed to initialize partition {key}"))?;

    let mode = if frame_length <= 1 {
        "real time".to_string()
    } else {
        format!("{frame_length}s frames")
    };
    println!("Initialized {key} at {start} ({mode})");
    Ok(())
}
