use async_trait::async_trait;
use sqlx::Row;

use assess_core::model::{AssessmentId, BankItem, BankItemId, UserId};

use crate::repository::{BankSource, StorageError};

use super::SqliteRepository;

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

impl SqliteRepository {
    /// Replace the bank of an assessment, keeping the given order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the transaction fails.
    pub async fn replace_bank(
        &self,
        assessment_id: &AssessmentId,
        items: &[BankItem],
    ) -> Result<(), StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        sqlx::query("DELETE FROM bank_items WHERE assessment_id = ?1")
            .bind(assessment_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        for (position, item) in items.iter().enumerate() {
            let position = i64::try_from(position).map_err(ser)?;
            sqlx::query(
                r"
                INSERT INTO bank_items (assessment_id, position, item_id, prompt, answer)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ",
            )
            .bind(assessment_id.as_str())
            .bind(position)
            .bind(item.id().as_str())
            .bind(item.prompt())
            .bind(item.answer())
            .execute(&mut *tx)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl BankSource for SqliteRepository {
    async fn fetch_bank(
        &self,
        assessment_id: &AssessmentId,
        _user_id: Option<&UserId>,
    ) -> Result<Vec<BankItem>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT item_id, prompt, answer
            FROM bank_items
            WHERE assessment_id = ?1
            ORDER BY position ASC
            ",
        )
        .bind(assessment_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|err| StorageError::Connection(err.to_string()))?;

        if rows.is_empty() {
            return Err(StorageError::NotFound);
        }

        rows.iter()
            .map(|row| {
                let item_id: String = row.try_get("item_id").map_err(ser)?;
                let prompt: String = row.try_get("prompt").map_err(ser)?;
                let answer: String = row.try_get("answer").map_err(ser)?;
                BankItem::new(BankItemId::new(item_id), prompt, answer).map_err(ser)
            })
            .collect()
    }
}
