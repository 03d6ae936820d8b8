use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use crate::repository::{LocalStateRepository, ProgressionRecord, StorageError};

use super::SqliteRepository;

/// The one key the progression snapshot lives under.
const STATE_KEY: &str = "progression";

#[async_trait]
impl LocalStateRepository for SqliteRepository {
    async fn load_state(&self) -> Result<Option<ProgressionRecord>, StorageError> {
        let row = sqlx::query("SELECT value FROM local_state WHERE key = ?1")
            .bind(STATE_KEY)
            .fetch_optional(self.pool())
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let value: String = row
            .try_get("value")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;

        serde_json::from_str(&value)
            .map(Some)
            .map_err(|err| StorageError::Serialization(err.to_string()))
    }

    async fn save_state(&self, state: &ProgressionRecord) -> Result<(), StorageError> {
        let value = serde_json::to_string(state)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;

        sqlx::query(
            r"
            INSERT INTO local_state (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            ",
        )
        .bind(STATE_KEY)
        .bind(value)
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }
}
