//! SQLite connection handling for batch state.
//!
//! Writes are funneled through a single connection: every batch runner is
//! already the sole writer for its own rows, and one shared writer connection
//! turns SQLite's global write lock into orderly queueing instead of
//! SQLITE_BUSY churn across runners. Status polls and the startup recovery
//! scan are cheap point reads and get their own small read-only pool. Both
//! sides run in WAL mode so readers never block the writer.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::time::Duration;

/// Status polls and recovery scans are the only readers; a handful of
/// connections covers an orchestrator polling many chunks at once.
const READER_CONNECTIONS: u32 = 4;

/// How long a connection waits on the write lock before erroring out. Kept
/// well above the alarm interval so a slow persist delays a tick rather than
/// failing it.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Reader/writer pool pair over the batch database.
#[derive(Clone)]
pub struct DatabasePool {
    pub reader: SqlitePool,
    pub writer: SqlitePool,
}

impl DatabasePool {
    /// Open the batch database at `path`, creating it if absent, and bring
    /// the schema up to date.
    ///
    /// Migrations run on the writer connection before any reader exists, so
    /// a reader can never observe a half-migrated schema.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone())
            .await?;
        sqlx::migrate!("../../migrations").run(&writer).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(READER_CONNECTIONS)
            .connect_with(options.read_only(true))
            .await?;

        Ok(Self { reader, writer })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_creates_schema() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");

        let pool = DatabasePool::open(&db_path.display().to_string())
            .await
            .unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name != '_sqlx_migrations' ORDER BY name",
        )
        .fetch_all(&pool.reader)
        .await
        .unwrap();

        let table_names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();
        assert!(table_names.contains(&"batches"), "batches table missing");
    }

    #[tokio::test]
    async fn open_uses_wal_mode() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test_wal.db");

        let pool = DatabasePool::open(&db_path.display().to_string())
            .await
            .unwrap();

        let result: (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool.writer)
            .await
            .unwrap();

        assert_eq!(result.0.to_lowercase(), "wal");
    }

    #[tokio::test]
    async fn reader_pool_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test_ro.db");

        let pool = DatabasePool::open(&db_path.display().to_string())
            .await
            .unwrap();

        let result = sqlx::query(
            "INSERT INTO batches (batch_id, chunk_id, phase, state, updated_at) VALUES ('b', 'c', 'PENDING', '{}', '')",
        )
        .execute(&pool.reader)
        .await;

        assert!(result.is_err(), "read-only pool accepted a write");
    }
}
