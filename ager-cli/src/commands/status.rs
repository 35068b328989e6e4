//! Show ledger and scheduler state.

use ager_service::Ager;
use anyhow::{Context, Result};
use serde_json::json;

/// Run the status command.
///
/// With a key, prints that partition's ledger as JSON. Without one, prints
/// the partition keys and the scheduler's controller record.
pub async fn run(ager: &Ager, key: Option<&str>) -> Result<()> {
    let value = match key {
        Some(key) => {
            let ledger = ager
                .ledger(key)
                .await
                .with_context(|| format!("Failed to read partition {key}"))?
                .with_context(|| format!("Partition {key} is not initialized"))?;
            serde_json::to_value(ledger)?
        }
        None => {
            let partitions = ager
                .store()
                .partition_keys()
                .await
                .context("Failed to list partitions")?;
            let controller = ager
                .controller()
                .await
                .context("Failed to read scheduler state")?;
            json!({
                "min_frame_length": ager.min_frame_length(),
                "partitions": partitions,
                "controller": controller,
            })
        }
    };

    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
