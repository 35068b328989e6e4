//! SQLite storage backend for Ager.

use super::LedgerStore;
use crate::error::StorageError;
use ager_core::{ControllerLedger, LedgerError, LedgerUpdate, PartitionLedger};
use ager_types::{FrameId, Interval};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::str::FromStr;

/// SQLite-based ledger storage.
///
/// Uses WAL mode for concurrent reads/writes. Intervals are stored one row
/// each in their `"lo-hi"` text form; the `schedule` table doubles as the
/// index the scheduler uses to find due partitions.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("connections", &self.pool.size())
            .finish()
    }
}

impl SqliteStore {
    /// Open (or create) a SQLite store at a database path.
    pub async fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(StorageError::InvalidPath {
                    path: path.to_path_buf(),
                });
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .map_err(StorageError::Database)?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(":memory:")
            .map_err(StorageError::Database)?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(StorageError::Database)?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS partitions (
                key TEXT PRIMARY KEY,
                anchor INTEGER NOT NULL,
                frame_length INTEGER NOT NULL,
                reported INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS frame_intervals (
                key TEXT NOT NULL,
                frame_id TEXT NOT NULL,
                interval_text TEXT NOT NULL,
                PRIMARY KEY (key, frame_id, interval_text)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schedule (
                key TEXT NOT NULL,
                frame_id TEXT NOT NULL,
                PRIMARY KEY (key, frame_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS controller (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                updated_frame_id TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS controller_tasks (
                key TEXT PRIMARY KEY,
                watermark INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_schedule_frame ON schedule(frame_id)")
            .execute(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        Ok(())
    }

    /// Start a transaction that takes the write lock up front.
    ///
    /// A deferred transaction that reads before writing cannot upgrade its
    /// lock once another connection has committed (`SQLITE_BUSY_SNAPSHOT`),
    /// and the busy timeout does not retry that case.
    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>, StorageError> {
        self.pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(StorageError::Database)
    }

    async fn insert_interval(
        tx: &mut Transaction<'_, Sqlite>,
        key: &str,
        frame: &FrameId,
        interval: &Interval,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO frame_intervals (key, frame_id, interval_text)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(key)
        .bind(frame.as_str())
        .bind(interval.to_string())
        .execute(&mut **tx)
        .await
        .map_err(StorageError::Database)?;
        Ok(())
    }

    async fn insert_schedule(
        tx: &mut Transaction<'_, Sqlite>,
        key: &str,
        frame: &FrameId,
    ) -> Result<(), StorageError> {
        sqlx::query("INSERT OR IGNORE INTO schedule (key, frame_id) VALUES (?1, ?2)")
            .bind(key)
            .bind(frame.as_str())
            .execute(&mut **tx)
            .await
            .map_err(StorageError::Database)?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for SqliteStore {
    async fn create_partition(&self, ledger: &PartitionLedger) -> Result<(), StorageError> {
        let key = ledger.key.as_str();
        let mut tx = self.begin_write().await?;

        for table in ["frame_intervals", "schedule", "partitions"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE key = ?1"))
                .bind(key)
                .execute(&mut *tx)
                .await
                .map_err(StorageError::Database)?;
        }

        sqlx::query(
            r#"
            INSERT INTO partitions (key, anchor, frame_length, reported)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(key)
        .bind(ledger.anchor)
        .bind(i64::from(ledger.frame_length))
        .bind(ledger.reported)
        .execute(&mut *tx)
        .await
        .map_err(StorageError::Database)?;

        for (frame, intervals) in &ledger.frames {
            for interval in intervals {
                Self::insert_interval(&mut tx, key, frame, interval).await?;
            }
        }
        for frame in &ledger.schedule {
            Self::insert_schedule(&mut tx, key, frame).await?;
        }

        tx.commit().await.map_err(StorageError::Database)?;
        Ok(())
    }

    async fn load_partition(&self, key: &str) -> Result<Option<PartitionLedger>, StorageError> {
        // One transaction so the three reads see the same snapshot.
        let mut tx = self.pool.begin().await.map_err(StorageError::Database)?;

        let row = sqlx::query_as::<_, PartitionRow>(
            "SELECT anchor, frame_length, reported FROM partitions WHERE key = ?1",
        )
        .bind(key)
        .fetch_optional(&mut *tx)
        .await
        .map_err(StorageError::Database)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let interval_rows = sqlx::query_as::<_, IntervalRow>(
            r#"
            SELECT frame_id, interval_text
            FROM frame_intervals
            WHERE key = ?1
            ORDER BY frame_id ASC, rowid ASC
            "#,
        )
        .bind(key)
        .fetch_all(&mut *tx)
        .await
        .map_err(StorageError::Database)?;

        let scheduled: Vec<String> =
            sqlx::query_scalar("SELECT frame_id FROM schedule WHERE key = ?1 ORDER BY frame_id")
                .bind(key)
                .fetch_all(&mut *tx)
                .await
                .map_err(StorageError::Database)?;

        tx.commit().await.map_err(StorageError::Database)?;

        let frame_length = u32::try_from(row.frame_length).map_err(|_| {
            LedgerError::corrupt(key, format!("frame length {} out of range", row.frame_length))
        })?;

        let mut frames: BTreeMap<FrameId, Vec<Interval>> = BTreeMap::new();
        for r in interval_rows {
            let frame = parse_frame(key, &r.frame_id)?;
            let interval = r.interval_text.parse::<Interval>().map_err(|e| {
                LedgerError::corrupt(key, format!("frame {}: {e}", r.frame_id))
            })?;
            frames.entry(frame).or_default().push(interval);
        }

        let schedule = scheduled
            .iter()
            .map(|f| parse_frame(key, f))
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(Some(PartitionLedger {
            key: key.to_string(),
            anchor: row.anchor,
            frame_length,
            frames,
            schedule,
            reported: row.reported,
        }))
    }

    async fn partition_keys(&self) -> Result<Vec<String>, StorageError> {
        sqlx::query_scalar("SELECT key FROM partitions ORDER BY key ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::Database)
    }

    async fn apply_update(&self, key: &str, update: &LedgerUpdate) -> Result<bool, StorageError> {
        let mut tx = self.begin_write().await?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM partitions WHERE key = ?1")
            .bind(key)
            .fetch_optional(&mut *tx)
            .await
            .map_err(StorageError::Database)?;

        if exists.is_none() {
            tx.rollback().await.map_err(StorageError::Database)?;
            return Ok(false);
        }

        for (frame, intervals) in &update.retract {
            for interval in intervals {
                sqlx::query(
                    r#"
                    DELETE FROM frame_intervals
                    WHERE key = ?1 AND frame_id = ?2 AND interval_text = ?3
                    "#,
                )
                .bind(key)
                .bind(frame.as_str())
                .bind(interval.to_string())
                .execute(&mut *tx)
                .await
                .map_err(StorageError::Database)?;
            }
        }

        for (frame, interval) in &update.append {
            Self::insert_interval(&mut tx, key, frame, interval).await?;
        }

        for frame in &update.unschedule {
            sqlx::query("DELETE FROM schedule WHERE key = ?1 AND frame_id = ?2")
                .bind(key)
                .bind(frame.as_str())
                .execute(&mut *tx)
                .await
                .map_err(StorageError::Database)?;
        }

        for frame in &update.schedule {
            Self::insert_schedule(&mut tx, key, frame).await?;
        }

        if let Some(reported) = update.reported {
            sqlx::query(
                r#"
                UPDATE partitions
                SET reported = MAX(COALESCE(reported, ?2), ?2)
                WHERE key = ?1
                "#,
            )
            .bind(key)
            .bind(reported)
            .execute(&mut *tx)
            .await
            .map_err(StorageError::Database)?;
        }

        tx.commit().await.map_err(StorageError::Database)?;
        Ok(true)
    }

    async fn scheduled_partitions(
        &self,
        start: Option<&FrameId>,
        end: &FrameId,
    ) -> Result<Vec<String>, StorageError> {
        sqlx::query_scalar(
            r#"
            SELECT DISTINCT key
            FROM schedule
            WHERE frame_id <= ?2 AND (?1 IS NULL OR frame_id >= ?1)
            ORDER BY key ASC
            "#,
        )
        .bind(start.map(FrameId::as_str))
        .bind(end.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Database)
    }

    async fn load_controller(&self) -> Result<Option<ControllerLedger>, StorageError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::Database)?;

        let updated: Option<String> =
            sqlx::query_scalar("SELECT updated_frame_id FROM controller WHERE id = 1")
                .fetch_optional(&mut *tx)
                .await
                .map_err(StorageError::Database)?;

        let Some(updated) = updated else {
            return Ok(None);
        };

        let rows = sqlx::query_as::<_, TaskRow>("SELECT key, watermark FROM controller_tasks")
            .fetch_all(&mut *tx)
            .await
            .map_err(StorageError::Database)?;

        tx.commit().await.map_err(StorageError::Database)?;

        Ok(Some(ControllerLedger {
            updated_frame_id: parse_frame(ControllerLedger::KEY, &updated)?,
            tasks: rows.into_iter().map(|r| (r.key, r.watermark)).collect(),
        }))
    }

    async fn save_controller(&self, controller: &ControllerLedger) -> Result<(), StorageError> {
        let mut tx = self.begin_write().await?;

        sqlx::query(
            r#"
            INSERT INTO controller (id, updated_frame_id)
            VALUES (1, ?1)
            ON CONFLICT(id) DO UPDATE SET updated_frame_id = excluded.updated_frame_id
            "#,
        )
        .bind(controller.updated_frame_id.as_str())
        .execute(&mut *tx)
        .await
        .map_err(StorageError::Database)?;

        sqlx::query("DELETE FROM controller_tasks")
            .execute(&mut *tx)
            .await
            .map_err(StorageError::Database)?;

        for (key, watermark) in &controller.tasks {
            sqlx::query("INSERT INTO controller_tasks (key, watermark) VALUES (?1, ?2)")
                .bind(key)
                .bind(*watermark)
                .execute(&mut *tx)
                .await
                .map_err(StorageError::Database)?;
        }

        tx.commit().await.map_err(StorageError::Database)?;
        Ok(())
    }
}

fn parse_frame(key: &str, raw: &str) -> Result<FrameId, LedgerError> {
    raw.parse::<FrameId>()
        .map_err(|e| LedgerError::corrupt(key, e.to_string()))
}

/// Internal row types for SQLite queries.
#[derive(sqlx::FromRow)]
struct PartitionRow {
    anchor: i64,
    frame_length: i64,
    reported: Option<i64>,
}

#[derive(sqlx::FromRow)]
struct IntervalRow {
    frame_id: String,
    interval_text: String,
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    key: String,
    watermark: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const F1: &str = "20210304050000";
    const F2: &str = "20210304060000";
    const F3: &str = "20210304070000";

    fn frame(s: &str) -> FrameId {
        s.parse().unwrap()
    }

    fn iv(lo: i64, hi: i64) -> Interval {
        Interval::new(lo, hi).unwrap()
    }

    #[tokio::test]
    async fn create_and_load_roundtrip() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut ledger = PartitionLedger::new("p1", 1, 3600, frame(F1));
        ledger.apply(&LedgerUpdate {
            append: vec![(frame(F1), iv(20, 25)), (frame(F2), iv(2, 10))],
            schedule: vec![frame(F2)],
            ..LedgerUpdate::default()
        });

        store.create_partition(&ledger).await.unwrap();
        let loaded = store.load_partition("p1").await.unwrap().unwrap();

        assert_eq!(loaded, ledger);
        assert_eq!(loaded.frames[&frame(F1)], vec![iv(1, 1), iv(20, 25)]);
    }

    #[tokio::test]
    async fn load_missing_partition_is_none() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert!(store.load_partition("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_replaces_existing_partition() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut first = PartitionLedger::new("p1", 1, 3600, frame(F1));
        first.apply(&LedgerUpdate::append(frame(F2), iv(5, 9)));
        store.create_partition(&first).await.unwrap();

        let second = PartitionLedger::new("p1", 100, 60, frame(F3));
        store.create_partition(&second).await.unwrap();

        assert_eq!(store.load_partition("p1").await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn apply_update_matches_in_memory_semantics() {
        let store = SqliteStore::in_memory().await.unwrap();
        let mut expected = PartitionLedger::new("p1", 1, 3600, frame(F1));
        store.create_partition(&expected).await.unwrap();

        let updates = [
            LedgerUpdate {
                append: vec![(frame(F2), iv(2, 10)), (frame(F2), iv(2, 10))],
                schedule: vec![frame(F2), frame(F3)],
                ..LedgerUpdate::default()
            },
            LedgerUpdate {
                retract: vec![
                    (frame(F1), vec![iv(1, 1)]),
                    (frame(F2), vec![iv(2, 10)]),
                ],
                append: vec![(frame(F2), iv(1, 10))],
                unschedule: vec![frame(F2)],
                reported: Some(10),
                ..LedgerUpdate::default()
            },
            LedgerUpdate {
                reported: Some(4),
                ..LedgerUpdate::default()
            },
        ];

        for update in &updates {
            assert!(store.apply_update("p1", update).await.unwrap());
            expected.apply(update);
        }

        let loaded = store.load_partition("p1").await.unwrap().unwrap();
        assert_eq!(loaded, expected);
        assert!(!loaded.frames.contains_key(&frame(F1)));
        assert_eq!(loaded.schedule.iter().collect::<Vec<_>>(), vec![&frame(F3)]);
        assert_eq!(loaded.reported, Some(10));
    }

    #[tokio::test]
    async fn apply_update_to_missing_partition_returns_false() {
        let store = SqliteStore::in_memory().await.unwrap();
        let update = LedgerUpdate::append(frame(F1), iv(1, 2));
        assert!(!store.apply_update("ghost", &update).await.unwrap());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM frame_intervals")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn scheduled_partitions_uses_schedule_index() {
        let store = SqliteStore::in_memory().await.unwrap();
        for key in ["b", "a", "c"] {
            store
                .create_partition(&PartitionLedger::new(key, 1, 3600, frame(F1)))
                .await
                .unwrap();
        }
        for key in ["c", "a"] {
            let update = LedgerUpdate {
                schedule: vec![frame(F2)],
                ..LedgerUpdate::default()
            };
            store.apply_update(key, &update).await.unwrap();
        }

        // An older entry for "b" is still due at a later end frame.
        let update = LedgerUpdate {
            schedule: vec![frame(F1)],
            ..LedgerUpdate::default()
        };
        store.apply_update("b", &update).await.unwrap();

        assert_eq!(
            store.scheduled_partitions(None, &frame(F2)).await.unwrap(),
            vec!["a", "b", "c"]
        );
        assert_eq!(
            store.scheduled_partitions(None, &frame(F3)).await.unwrap(),
            vec!["a", "b", "c"]
        );
        assert_eq!(
            store
                .scheduled_partitions(Some(&frame(F2)), &frame(F2))
                .await
                .unwrap(),
            vec!["a", "c"]
        );
        assert_eq!(
            store.scheduled_partitions(None, &frame(F1)).await.unwrap(),
            vec!["b"]
        );
        assert_eq!(store.partition_keys().await.unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_updates_on_distinct_partitions_all_commit() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(SqliteStore::open(&dir.path().join("ager.db")).await.unwrap());

        let keys: Vec<String> = (0..16).map(|i| format!("p{i}")).collect();
        for key in &keys {
            store
                .create_partition(&PartitionLedger::new(key.as_str(), 1, 3600, frame(F1)))
                .await
                .unwrap();
        }

        let mut handles = Vec::new();
        for key in keys.clone() {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for n in 0..20 {
                    let update = LedgerUpdate {
                        append: vec![(frame(F2), iv(10 * n + 2, 10 * n + 11))],
                        schedule: vec![frame(F2)],
                        ..LedgerUpdate::default()
                    };
                    assert!(store.apply_update(&key, &update).await.unwrap());
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        for key in &keys {
            let ledger = store.load_partition(key).await.unwrap().unwrap();
            assert_eq!(ledger.frames[&frame(F2)].len(), 20);
        }
    }

    #[tokio::test]
    async fn malformed_interval_row_is_corrupt() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .create_partition(&PartitionLedger::new("p1", 1, 3600, frame(F1)))
            .await
            .unwrap();

        sqlx::query("INSERT INTO frame_intervals (key, frame_id, interval_text) VALUES ('p1', ?1, 'ten-twenty')")
            .bind(F2)
            .execute(store.pool())
            .await
            .unwrap();

        let err = store.load_partition("p1").await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt(LedgerError::Corrupt { ref key, .. }) if key == "p1"));
    }

    #[tokio::test]
    async fn malformed_frame_row_is_corrupt() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .create_partition(&PartitionLedger::new("p1", 1, 3600, frame(F1)))
            .await
            .unwrap();

        sqlx::query("INSERT INTO schedule (key, frame_id) VALUES ('p1', 'yesterday')")
            .execute(store.pool())
            .await
            .unwrap();

        assert!(matches!(
            store.load_partition("p1").await,
            Err(StorageError::Corrupt(_))
        ));
    }

    #[tokio::test]
    async fn controller_roundtrip_replaces_tasks() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert!(store.load_controller().await.unwrap().is_none());

        let mut ctrl = ControllerLedger::new(frame(F1));
        ctrl.tasks.insert("p1".into(), Some(50));
        ctrl.tasks.insert("p2".into(), None);
        store.save_controller(&ctrl).await.unwrap();
        assert_eq!(store.load_controller().await.unwrap(), Some(ctrl.clone()));

        ctrl.updated_frame_id = frame(F2);
        ctrl.tasks.remove("p2");
        store.save_controller(&ctrl).await.unwrap();
        assert_eq!(store.load_controller().await.unwrap(), Some(ctrl));
    }

    #[tokio::test]
    async fn open_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ager.db");

        {
            let store = SqliteStore::open(&path).await.unwrap();
            store
                .create_partition(&PartitionLedger::new("p1", 1, 3600, frame(F1)))
                .await
                .unwrap();
        }

        assert!(path.exists());
        let reopened = SqliteStore::open(&path).await.unwrap();
        assert!(reopened.load_partition("p1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn open_rejects_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("ager.db");
        assert!(matches!(
            SqliteStore::open(&path).await,
            Err(StorageError::InvalidPath { .. })
        ));
    }
}
