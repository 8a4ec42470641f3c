use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use assess_core::progress::ProgressDocument;

use crate::repository::{ProgressKey, ProgressStore, StorageError};

use super::SqliteRepository;

#[async_trait]
impl ProgressStore for SqliteRepository {
    async fn load_progress(
        &self,
        key: &ProgressKey,
    ) -> Result<Option<ProgressDocument>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT document
            FROM progress
            WHERE assessment_id = ?1 AND user_id = ?2
            ",
        )
        .bind(key.assessment_id.as_str())
        .bind(key.user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let document: String = row
            .try_get("document")
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        serde_json::from_str(&document)
            .map(Some)
            .map_err(|err| StorageError::Serialization(err.to_string()))
    }

    async fn save_progress(
        &self,
        key: &ProgressKey,
        doc: &ProgressDocument,
    ) -> Result<(), StorageError> {
        let document =
            serde_json::to_string(doc).map_err(|err| StorageError::Serialization(err.to_string()))?;
        sqlx::query(
            r"
            INSERT INTO progress (assessment_id, user_id, document, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(assessment_id, user_id) DO UPDATE SET
                document = excluded.document,
                updated_at = excluded.updated_at
            ",
        )
        .bind(key.assessment_id.as_str())
        .bind(key.user_id.as_str())
        .bind(document)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(())
    }
}
