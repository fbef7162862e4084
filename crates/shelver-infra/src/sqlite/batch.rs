//! SQLite batch store implementation.
//!
//! `BatchState` rows are stored as JSON blobs keyed by (batch_id, chunk_id),
//! with the phase duplicated into its own column so the startup recovery
//! scan can select non-terminal batches cheaply.

use chrono::Utc;
use shelver_core::batch::BatchStore;
use shelver_types::batch::BatchState;
use shelver_types::error::BatchError;
use sqlx::Row;

use super::pool::DatabasePool;

/// SQLite-backed implementation of [`BatchStore`].
#[derive(Clone)]
pub struct SqliteBatchStore {
    pool: DatabasePool,
}

impl SqliteBatchStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn persistence(err: impl std::fmt::Display) -> BatchError {
    BatchError::Persistence(err.to_string())
}

impl BatchStore for SqliteBatchStore {
    async fn put(&self, state: &BatchState) -> Result<(), BatchError> {
        let blob = serde_json::to_string(state).map_err(persistence)?;
        sqlx::query(
            "INSERT INTO batches (batch_id, chunk_id, phase, state, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (batch_id, chunk_id)
             DO UPDATE SET phase = excluded.phase, state = excluded.state, updated_at = excluded.updated_at",
        )
        .bind(&state.batch_id)
        .bind(&state.chunk_id)
        .bind(state.phase.to_string())
        .bind(&blob)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(persistence)?;
        Ok(())
    }

    async fn get(&self, batch_id: &str, chunk_id: &str) -> Result<Option<BatchState>, BatchError> {
        let row = sqlx::query("SELECT state FROM batches WHERE batch_id = ? AND chunk_id = ?")
            .bind(batch_id)
            .bind(chunk_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(persistence)?;

        row.map(|row| {
            let blob: String = row.try_get("state").map_err(persistence)?;
            serde_json::from_str(&blob).map_err(persistence)
        })
        .transpose()
    }

    async fn delete(&self, batch_id: &str, chunk_id: &str) -> Result<(), BatchError> {
        sqlx::query("DELETE FROM batches WHERE batch_id = ? AND chunk_id = ?")
            .bind(batch_id)
            .bind(chunk_id)
            .execute(&self.pool.writer)
            .await
            .map_err(persistence)?;
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<BatchState>, BatchError> {
        let rows = sqlx::query("SELECT state FROM batches WHERE phase NOT IN ('DONE', 'ERROR')")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(persistence)?;

        rows.into_iter()
            .map(|row| {
                let blob: String = row.try_get("state").map_err(persistence)?;
                serde_json::from_str(&blob).map_err(persistence)
            })
            .collect()
    }
}
