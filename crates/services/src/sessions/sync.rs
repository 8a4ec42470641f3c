use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use assess_core::progress::ProgressDocument;
use storage::repository::{ProgressKey, ProgressStore};

/// Attempts per write before it is reported as failed.
pub const MAX_SYNC_ATTEMPTS: u32 = 3;

/// What happened to one scheduled write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Sent,
    /// A newer write or a cancellation replaced this one before it was sent.
    Superseded,
    /// Every attempt was rejected; the state stays dirty until a later write lands.
    Failed,
}

/// Trailing-debounced writer of progress documents.
///
/// Each `schedule` bumps a shared generation counter and spawns a task that
/// sleeps for the debounce window, then sends only if its generation is still
/// current. A rejected write is retried once per debounce window, up to
/// `MAX_SYNC_ATTEMPTS`, while no newer write has replaced it. A write already
/// handed to the store is never aborted, and its response is never applied
/// back to the session.
///
/// Must be used from within a tokio runtime.
pub struct ProgressSync {
    store: Arc<dyn ProgressStore>,
    key: ProgressKey,
    debounce: Duration,
    generation: Arc<AtomicU64>,
    /// Highest generation the store has accepted.
    acked: Arc<AtomicU64>,
}

impl ProgressSync {
    #[must_use]
    pub fn new(store: Arc<dyn ProgressStore>, key: ProgressKey, debounce: Duration) -> Self {
        Self {
            store,
            key,
            debounce,
            generation: Arc::new(AtomicU64::new(0)),
            acked: Arc::new(AtomicU64::new(0)),
        }
    }

    #[must_use]
    pub fn key(&self) -> &ProgressKey {
        &self.key
    }

    #[must_use]
    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// True while the latest scheduled state has not been accepted by the store.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.acked.load(Ordering::SeqCst) != self.generation.load(Ordering::SeqCst)
    }

    /// Send `doc` once no newer change arrives within the debounce window.
    pub fn schedule(&self, doc: ProgressDocument) -> JoinHandle<SyncOutcome> {
        self.spawn(doc, Some(self.debounce))
    }

    /// Send `doc` right away, superseding anything still waiting.
    pub fn flush(&self, doc: ProgressDocument) -> JoinHandle<SyncOutcome> {
        self.spawn(doc, None)
    }

    /// Drop any write that is still waiting for its window to elapse.
    pub fn cancel(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(generation, user = %self.key.user_id, "pending progress sync cancelled");
    }

    fn spawn(&self, doc: ProgressDocument, delay: Option<Duration>) -> JoinHandle<SyncOutcome> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let current = Arc::clone(&self.generation);
        let acked = Arc::clone(&self.acked);
        let store = Arc::clone(&self.store);
        let key = self.key.clone();
        let retry_after = self.debounce;

        tokio::spawn(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
                if current.load(Ordering::SeqCst) != generation {
                    return SyncOutcome::Superseded;
                }
            }

            let mut attempt = 1;
            loop {
                match store.save_progress(&key, &doc).await {
                    Ok(()) => {
                        acked.fetch_max(generation, Ordering::SeqCst);
                        debug!(
                            generation,
                            attempt,
                            assessment = %key.assessment_id,
                            user = %key.user_id,
                            "progress synced"
                        );
                        return SyncOutcome::Sent;
                    }
                    Err(err) => {
                        warn!(
                            %err,
                            attempt,
                            assessment = %key.assessment_id,
                            user = %key.user_id,
                            "progress sync failed"
                        );
                        if attempt >= MAX_SYNC_ATTEMPTS {
                            return SyncOutcome::Failed;
                        }
                    }
                }

                attempt += 1;
                tokio::time::sleep(retry_after).await;
                if current.load(Ordering::SeqCst) != generation {
                    return SyncOutcome::Superseded;
                }
            }
        })
    }
}
