//! Record an arrived key range.

use ager_service::Ager;
use anyhow::{Context, Result};

/// Run the record command.
///
/// Prints the range that became ready (`lo-hi`), or an empty line when
/// nothing did or the partition is batched.
pub async fn run(ager: &Ager, key: &str, start: i64, end: i64) -> Result<()> {
    let ready = ager
        .record_range(key, start, end)
        .await
        .with_context(|| format!("Failed to record {start}-{end} for {key}"))?;

    println!("{}", ready.map(|range| range.to_string()).unwrap_or_default());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ager_service::MemoryStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn record_on_initialized_partition() {
        let ager = Ager::new(Arc::new(MemoryStore::new()), 0);
        ager.init_partition("p1", 1, 0).await.unwrap();

        run(&ager, "p1", 2, 10).await.unwrap();
        let ledger = ager.ledger("p1").await.unwrap().unwrap();
        assert_eq!(ledger.reported, Some(10));
    }

    #[tokio::test]
    async fn record_without_init_fails() {
        let ager = Ager::new(Arc::new(MemoryStore::new()), 0);
        let err = run(&ager, "p1", 2, 10).await.unwrap_err();
        assert!(format!("{err:#}").contains("not initialized"));
    }
}
