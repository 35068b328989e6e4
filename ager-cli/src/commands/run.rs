//! Run the scheduler once.

use ager_service::Ager;
use ager_types::FrameId;
use anyhow::{Context, Result};

/// Run the scheduler command.
///
/// Prints a JSON object mapping each advanced partition to its ready range.
pub async fn run(ager: &Ager, start: Option<&str>, end: Option<&str>) -> Result<()> {
    let start = start.map(parse_frame).transpose()?;
    let end = end.map(parse_frame).transpose()?;

    let ready = ager
        .run_scheduler(start, end)
        .await
        .context("Scheduler run failed")?;

    println!("{}", serde_json::to_string(&ready)?);
    Ok(())
}

fn parse_frame(raw: &str) -> Result<FrameId> {
    raw.parse()
        .with_context(|| format!("Invalid frame id {raw:?} (expected YYYYMMDDHHMMSS)"))
}
