//! Durable snapshots of the whisper store.
//!
//! A snapshot is the whole set of live records, written wholesale on a
//! checkpoint and read wholesale at startup. Nothing is written between
//! checkpoints, so whispers created after the last one are lost on a crash.

use crate::error::PersistenceError;
use crate::whisper::record::{
    Recipient, TargetSelector, UserId, WhisperBody, WhisperId, WhisperRecord,
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{FromRow, Pool, Sqlite};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Current on-disk format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Where snapshots are kept. Only [`WhisperStore`](super::WhisperStore) calls this.
#[async_trait]
pub trait SnapshotBackend: Send + Sync {
    /// Read the last snapshot. An absent snapshot is an empty one.
    async fn load(&self) -> Result<Vec<WhisperRecord>, PersistenceError>;

    /// Replace the stored snapshot with `records`.
    async fn save(&self, records: &[WhisperRecord]) -> Result<(), PersistenceError>;

    /// Human readable location, for logs.
    fn describe(&self) -> String;
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    saved_at: DateTime<Utc>,
    whispers: &'a [WhisperRecord],
}

#[derive(Deserialize)]
struct Snapshot {
    version: u32,
    saved_at: DateTime<Utc>,
    whispers: Vec<WhisperRecord>,
}

/// JSON snapshot in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "whispers.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotBackend for JsonFileBackend {
    async fn load(&self) -> Result<Vec<WhisperRecord>, PersistenceError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No snapshot at {}, starting empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(PersistenceError::corrupt(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        debug!(
            path = %self.path.display(),
            saved_at = %snapshot.saved_at,
            count = snapshot.whispers.len(),
            "Snapshot read"
        );
        Ok(snapshot.whispers)
    }

    async fn save(&self, records: &[WhisperRecord]) -> Result<(), PersistenceError> {
        let snapshot = SnapshotRef {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            whispers: records,
        };
        let bytes = serde_json::to_vec_pretty(&snapshot)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write aside, then swap in, so a failed write keeps the old snapshot.
        let temp = self.temp_path();
        tokio::fs::write(&temp, bytes).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        debug!(path = %self.path.display(), count = records.len(), "Snapshot written");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// SQLite table holding one row per whisper.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    pool: Pool<Sqlite>,
}

#[derive(Debug, FromRow)]
struct WhisperRow {
    id: String,
    sender_id: i64,
    target_kind: String,
    target_value: Option<String>,
    body: String,
    created_at: String,
    claimed_by: Option<i64>,
}

impl SqliteBackend {
    /// Connect and make sure the table exists.
    pub async fn connect(url: &str) -> Result<Self, PersistenceError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await?;
        Self::with_pool(pool).await
    }

    pub async fn with_pool(pool: Pool<Sqlite>) -> Result<Self, PersistenceError> {
        init_schema(&pool).await?;
        Ok(Self { pool })
    }
}

async fn init_schema(pool: &Pool<Sqlite>) -> Result<(), PersistenceError> {
    info!("Ensuring whispers table exists");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS whispers (
            id TEXT PRIMARY KEY NOT NULL,
            sender_id INTEGER NOT NULL,
            target_kind TEXT NOT NULL,
            target_value TEXT,
            body TEXT NOT NULL,
            created_at TEXT NOT NULL,
            claimed_by INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_whispers_sender ON whispers(sender_id)")
        .execute(pool)
        .await?;

    Ok(())
}

// Discord and Telegram ids fit in 63 bits; the cast keeps the bit pattern either way.
fn id_to_sql(id: UserId) -> i64 {
    id.0 as i64
}

fn id_from_sql(raw: i64) -> UserId {
    UserId(raw as u64)
}

fn target_to_sql(target: &TargetSelector) -> (&'static str, Option<String>) {
    match target {
        TargetSelector::OpenFirst => ("open", None),
        TargetSelector::Specific {
            recipient: Recipient::Id(id),
        } => ("id", Some(id.to_string())),
        TargetSelector::Specific {
            recipient: Recipient::Handle(handle),
        } => ("handle", Some(handle.clone())),
    }
}

impl TryFrom<WhisperRow> for WhisperRecord {
    type Error = PersistenceError;

    fn try_from(row: WhisperRow) -> Result<Self, Self::Error> {
        let target = match (row.target_kind.as_str(), row.target_value) {
            ("open", _) => TargetSelector::OpenFirst,
            ("id", Some(value)) => {
                let id = value.parse::<u64>().map_err(|_| {
                    PersistenceError::corrupt(format!("bad recipient id for {}", row.id))
                })?;
                TargetSelector::specific(Recipient::Id(UserId(id)))
            }
            ("handle", Some(value)) => TargetSelector::specific(Recipient::Handle(value)),
            (kind, _) => {
                return Err(PersistenceError::corrupt(format!(
                    "bad target '{}' for {}",
                    kind, row.id
                )))
            }
        };

        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map_err(|e| PersistenceError::corrupt(format!("bad timestamp for {}: {}", row.id, e)))?
            .with_timezone(&Utc);

        Ok(WhisperRecord {
            id: WhisperId::from(row.id),
            sender: id_from_sql(row.sender_id),
            target,
            body: WhisperBody::new(row.body),
            created_at,
            claimed_by: row.claimed_by.map(id_from_sql),
        })
    }
}

#[async_trait]
impl SnapshotBackend for SqliteBackend {
    async fn load(&self) -> Result<Vec<WhisperRecord>, PersistenceError> {
        let rows = sqlx::query_as::<_, WhisperRow>(
            "SELECT id, sender_id, target_kind, target_value, body, created_at, claimed_by FROM whispers",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(WhisperRecord::try_from).collect()
    }

    async fn save(&self, records: &[WhisperRecord]) -> Result<(), PersistenceError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM whispers").execute(&mut *tx).await?;

        for record in records {
            let (kind, value) = target_to_sql(&record.target);
            sqlx::query(
                r#"
                INSERT INTO whispers (id, sender_id, target_kind, target_value, body, created_at, claimed_by)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(record.id.as_str())
            .bind(id_to_sql(record.sender))
            .bind(kind)
            .bind(value)
            .bind(record.body.expose())
            .bind(record.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true))
            .bind(record.claimed_by.map(id_to_sql))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(count = records.len(), "Snapshot written to sqlite");
        Ok(())
    }

    fn describe(&self) -> String {
        "sqlite".to_string()
    }
}

/// Keeps the snapshot in process memory. Survives store rebuilds, not restarts.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: Mutex<Vec<WhisperRecord>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotBackend for MemoryBackend {
    async fn load(&self) -> Result<Vec<WhisperRecord>, PersistenceError> {
        Ok(self.records.lock().await.clone())
    }

    async fn save(&self, records: &[WhisperRecord]) -> Result<(), PersistenceError> {
        *self.records.lock().await = records.to_vec();
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
pub(crate) fn temp_snapshot_path() -> PathBuf {
    std::env::temp_dir()
        .join(format!("whisperbot-test-{}", WhisperId::generate()))
        .join("whispers.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_records() -> Vec<WhisperRecord> {
        let mut claimed = WhisperRecord::new(
            WhisperId::from("open1"),
            UserId(1),
            TargetSelector::OpenFirst,
            WhisperBody::new("hi"),
        );
        claimed.claimed_by = Some(UserId(2));

        vec![
            claimed,
            WhisperRecord::new(
                WhisperId::from("fixed1"),
                UserId(1),
                TargetSelector::specific(Recipient::Handle("bob".into())),
                WhisperBody::new("for bob only"),
            ),
            WhisperRecord::new(
                WhisperId::from("fixed2"),
                UserId(u64::MAX),
                TargetSelector::specific(Recipient::Id(UserId(99))),
                WhisperBody::new("ünïcödé ✓"),
            ),
        ]
    }

    fn sorted(mut records: Vec<WhisperRecord>) -> Vec<WhisperRecord> {
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    #[tokio::test]
    async fn test_file_missing_is_empty() {
        let backend = JsonFileBackend::new(temp_snapshot_path());
        assert!(backend.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_round_trip() {
        let backend = JsonFileBackend::new(temp_snapshot_path());
        let records = sample_records();

        backend.save(&records).await.unwrap();
        let loaded = backend.load().await.unwrap();
        assert_eq!(sorted(loaded), sorted(records));
        assert!(!backend.temp_path().exists());
    }

    #[tokio::test]
    async fn test_file_save_replaces_previous() {
        let backend = JsonFileBackend::new(temp_snapshot_path());
        backend.save(&sample_records()).await.unwrap();
        backend.save(&[]).await.unwrap();
        assert!(backend.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_rejects_unknown_version() {
        let backend = JsonFileBackend::new(temp_snapshot_path());
        backend.save(&[]).await.unwrap();
        tokio::fs::write(
            backend.path(),
            r#"{"version": 99, "saved_at": "2024-01-01T00:00:00Z", "whispers": []}"#,
        )
        .await
        .unwrap();

        let err = backend.load().await.unwrap_err();
        assert!(matches!(err, PersistenceError::Corrupt(_)));
    }

    #[tokio::test]
    async fn test_file_rejects_garbage() {
        let backend = JsonFileBackend::new(temp_snapshot_path());
        backend.save(&[]).await.unwrap();
        tokio::fs::write(backend.path(), b"not json").await.unwrap();

        let err = backend.load().await.unwrap_err();
        assert!(matches!(err, PersistenceError::Serde(_)));
    }

    #[tokio::test]
    async fn test_sqlite_round_trip() {
        let backend = SqliteBackend::connect("sqlite::memory:").await.unwrap();
        let records = sample_records();

        backend.save(&records).await.unwrap();
        let loaded = backend.load().await.unwrap();
        assert_eq!(sorted(loaded), sorted(records.clone()));

        backend.save(&records[..1]).await.unwrap();
        assert_eq!(backend.load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_rejects_bad_target() {
        let backend = SqliteBackend::connect("sqlite::memory:").await.unwrap();
        sqlx::query(
            "INSERT INTO whispers (id, sender_id, target_kind, target_value, body, created_at) \
             VALUES ('x', 1, 'id', 'not-a-number', 'b', '2024-01-01T00:00:00Z')",
        )
        .execute(&backend.pool)
        .await
        .unwrap();

        let err = backend.load().await.unwrap_err();
        assert!(matches!(err, PersistenceError::Corrupt(_)));
    }
}
