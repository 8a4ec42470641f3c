//! HTTP adapter for the bank source and the progress store.
//!
//! Routes, relative to `base_url`:
//! - `GET {assessment}?userId=..` returns `{ flashcard: { cards: [...] } }`
//! - `GET {assessment}/progress?userId=..` returns `{ progress: { test: {...} } }`
//! - `PATCH {assessment}/progress?userId=..` with `{ test: {...} }`

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use tracing::debug;

use assess_core::model::{AssessmentId, BankItem, UserId};
use assess_core::progress::{BankEnvelope, ProgressDocument, ProgressEnvelope, ProgressPatch};

use crate::repository::{BankSource, ProgressKey, ProgressStore, Storage, StorageError};

#[derive(Clone)]
pub struct HttpRepository {
    client: Client,
    base_url: String,
}

impl HttpRepository {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    #[must_use]
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { client, base_url }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/{segments..}` with each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, StorageError> {
        let mut url = Url::parse(&self.base_url).map_err(|err| {
            StorageError::Connection(format!("invalid base url {}: {err}", self.base_url))
        })?;
        url.path_segments_mut()
            .map_err(|()| {
                StorageError::Connection(format!("base url cannot take a path: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn bank_url(&self, assessment_id: &AssessmentId) -> Result<Url, StorageError> {
        self.endpoint(&[assessment_id.as_str()])
    }

    fn progress_url(&self, assessment_id: &AssessmentId) -> Result<Url, StorageError> {
        self.endpoint(&[assessment_id.as_str(), "progress"])
    }
}

fn connection(err: reqwest::Error) -> StorageError {
    StorageError::Connection(err.to_string())
}

fn serialization<E: std::fmt::Display>(err: E) -> StorageError {
    StorageError::Serialization(err.to_string())
}

#[async_trait]
impl BankSource for HttpRepository {
    async fn fetch_bank(
        &self,
        assessment_id: &AssessmentId,
        user_id: Option<&UserId>,
    ) -> Result<Vec<BankItem>, StorageError> {
        let mut request = self.client.get(self.bank_url(assessment_id)?);
        if let Some(user_id) = user_id {
            request = request.query(&[("userId", user_id.as_str())]);
        }
        let response = request.send().await.map_err(connection)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound);
        }
        if !status.is_success() {
            return Err(StorageError::HttpStatus(status.as_u16()));
        }

        let body: BankEnvelope = response.json().await.map_err(serialization)?;
        let items = body.into_items().map_err(serialization)?;
        debug!(assessment = %assessment_id, items = items.len(), "bank fetched");
        Ok(items)
    }
}

#[async_trait]
impl ProgressStore for HttpRepository {
    async fn load_progress(
        &self,
        key: &ProgressKey,
    ) -> Result<Option<ProgressDocument>, StorageError> {
        let response = self
            .client
            .get(self.progress_url(&key.assessment_id)?)
            .query(&[("userId", key.user_id.as_str())])
            .send()
            .await
            .map_err(connection)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(assessment = %key.assessment_id, "no stored progress");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(StorageError::HttpStatus(status.as_u16()));
        }

        let text = response.text().await.map_err(connection)?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        let envelope: ProgressEnvelope = serde_json::from_str(&text).map_err(serialization)?;
        Ok(envelope.into_document())
    }

    async fn save_progress(
        &self,
        key: &ProgressKey,
        doc: &ProgressDocument,
    ) -> Result<(), StorageError> {
        let response = self
            .client
            .patch(self.progress_url(&key.assessment_id)?)
            .query(&[("userId", key.user_id.as_str())])
            .json(&ProgressPatch { test: doc })
            .send()
            .await
            .map_err(connection)?;

        let status = response.status();
        if !status.is_success() {
            debug!(%status, assessment = %key.assessment_id, "progress patch rejected");
            return Err(StorageError::HttpStatus(status.as_u16()));
        }
        Ok(())
    }
}

impl Storage {
    /// Build a `Storage` that talks to the remote collaborators.
    #[must_use]
    pub fn http(base_url: impl Into<String>) -> Self {
        let repo = HttpRepository::new(base_url);
        let banks: Arc<dyn BankSource> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressStore> = Arc::new(repo);
        Self { banks, progress }
    }
}
