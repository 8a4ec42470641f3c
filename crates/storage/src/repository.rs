use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use assess_core::model::{AssessmentId, BankItem, UserId};
use assess_core::progress::ProgressDocument;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("request failed with status {0}")]
    HttpStatus(u16),
}

/// Progress is stored per user per assessment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgressKey {
    pub assessment_id: AssessmentId,
    pub user_id: UserId,
}

impl ProgressKey {
    #[must_use]
    pub fn new(assessment_id: AssessmentId, user_id: UserId) -> Self {
        Self {
            assessment_id,
            user_id,
        }
    }
}

/// Source of the immutable question bank of an assessment.
#[async_trait]
pub trait BankSource: Send + Sync {
    /// Fetch bank items in their canonical order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the assessment does not exist, or
    /// other storage errors.
    async fn fetch_bank(
        &self,
        assessment_id: &AssessmentId,
        user_id: Option<&UserId>,
    ) -> Result<Vec<BankItem>, StorageError>;
}

/// Remote store holding one progress document per `ProgressKey`.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Fetch persisted progress; `Ok(None)` when nothing was stored yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be reached or the document is malformed.
    async fn load_progress(&self, key: &ProgressKey)
    -> Result<Option<ProgressDocument>, StorageError>;

    /// Replace the persisted progress.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the document cannot be stored.
    async fn save_progress(
        &self,
        key: &ProgressKey,
        doc: &ProgressDocument,
    ) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
///
/// Failure switches let tests exercise the fallback paths.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    banks: Arc<Mutex<HashMap<AssessmentId, Vec<BankItem>>>>,
    progress: Arc<Mutex<HashMap<ProgressKey, ProgressDocument>>>,
    saves: Arc<AtomicUsize>,
    fail_loads: Arc<AtomicBool>,
    fail_saves: Arc<AtomicBool>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn insert_bank(
        &self,
        assessment_id: AssessmentId,
        items: Vec<BankItem>,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .banks
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(assessment_id, items);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn insert_progress(
        &self,
        key: ProgressKey,
        doc: ProgressDocument,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key, doc);
        Ok(())
    }

    /// Current stored document, bypassing the failure switches.
    #[must_use]
    pub fn stored_progress(&self, key: &ProgressKey) -> Option<ProgressDocument> {
        self.progress
            .lock()
            .ok()
            .and_then(|guard| guard.get(key).cloned())
    }

    /// Number of successful `save_progress` calls.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn set_fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BankSource for InMemoryRepository {
    async fn fetch_bank(
        &self,
        assessment_id: &AssessmentId,
        _user_id: Option<&UserId>,
    ) -> Result<Vec<BankItem>, StorageError> {
        let guard = self
            .banks
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .get(assessment_id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl ProgressStore for InMemoryRepository {
    async fn load_progress(
        &self,
        key: &ProgressKey,
    ) -> Result<Option<ProgressDocument>, StorageError> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("progress store unavailable".into()));
        }
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn save_progress(
        &self,
        key: &ProgressKey,
        doc: &ProgressDocument,
    ) -> Result<(), StorageError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("progress store unavailable".into()));
        }
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(key.clone(), doc.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Aggregates the collaborators behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub banks: Arc<dyn BankSource>,
    pub progress: Arc<dyn ProgressStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_in_memory(InMemoryRepository::new())
    }

    #[must_use]
    pub fn from_in_memory(repo: InMemoryRepository) -> Self {
        let banks: Arc<dyn BankSource> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressStore> = Arc::new(repo);
        Self { banks, progress }
    }
}
