use rand::rngs::StdRng;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use assess_core::model::{Answer, FeedbackTiming, TestMode};
use assess_core::progress::ProgressDocument;
use assess_core::{AssessmentSession, RestoreOutcome, RestoreTicket, SessionError, SessionOutcome};

use super::sync::{ProgressSync, SyncOutcome};

/// An assessment session wired to its progress store.
///
/// Every successful mutation schedules a debounced write of the full state.
/// Anonymous sessions carry no `ProgressSync` and never persist.
pub struct LiveSession {
    session: AssessmentSession,
    sync: Option<ProgressSync>,
    pending: Option<JoinHandle<SyncOutcome>>,
    rng: StdRng,
}

impl LiveSession {
    #[must_use]
    pub fn new(session: AssessmentSession, sync: Option<ProgressSync>, rng: StdRng) -> Self {
        Self {
            session,
            sync,
            pending: None,
            rng,
        }
    }

    #[must_use]
    pub fn session(&self) -> &AssessmentSession {
        &self.session
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.sync.is_some()
    }

    /// # Errors
    ///
    /// Propagates `SessionError` from the session; nothing is scheduled then.
    pub fn record_answer(&mut self, index: usize, answer: Answer) -> Result<(), SessionError> {
        self.session
            .record_answer(index, answer)
            .inspect_err(|err| debug!(%err, index, "answer rejected"))?;
        self.schedule();
        Ok(())
    }

    /// Finish the session and write its final state without waiting.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` if already finished.
    pub fn finish(&mut self) -> Result<SessionOutcome, SessionError> {
        let outcome = self.session.finish()?;
        self.flush();
        info!(
            score = outcome.score,
            total = outcome.total,
            wrong = outcome.wrong_item_ids.len(),
            "assessment finished"
        );
        Ok(outcome)
    }

    /// Start over with a fresh question set. Any write still waiting is dropped.
    pub fn restart(&mut self) {
        if let Some(sync) = &self.sync {
            sync.cancel();
        }
        self.session.restart(&mut self.rng);
        self.schedule();
    }

    /// # Errors
    ///
    /// Returns `SessionError::Locked` once answered.
    pub fn set_mode(&mut self, mode: TestMode) -> Result<(), SessionError> {
        self.session.set_mode(mode)?;
        if let Some(sync) = &self.sync {
            sync.cancel();
        }
        self.schedule();
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionError::Locked` once answered.
    pub fn set_shuffle_choices(&mut self, shuffle: bool) -> Result<(), SessionError> {
        self.session.set_shuffle_choices(shuffle)?;
        self.schedule();
        Ok(())
    }

    pub fn set_feedback_timing(&mut self, feedback: FeedbackTiming) {
        self.session.set_feedback_timing(feedback);
        self.schedule();
    }

    /// # Errors
    ///
    /// Returns `SessionError::Locked` once answered or `SessionError::NotMixed`.
    pub fn randomize_question_types(&mut self) -> Result<(), SessionError> {
        self.session.randomize_question_types(&mut self.rng)?;
        self.schedule();
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionError::Locked` once answered.
    pub fn regenerate(&mut self) -> Result<(), SessionError> {
        self.session.regenerate(&mut self.rng)?;
        self.schedule();
        Ok(())
    }

    #[must_use]
    pub fn begin_restore(&self) -> RestoreTicket {
        self.session.begin_restore()
    }

    /// Apply fetched progress unless local changes happened after `ticket`.
    pub fn apply_restore(
        &mut self,
        ticket: RestoreTicket,
        doc: &ProgressDocument,
    ) -> RestoreOutcome {
        let outcome = self.session.apply_restore(ticket, doc, &mut self.rng);
        match outcome {
            RestoreOutcome::Applied => info!(
                answered = self.session.answered_count(),
                complete = self.session.is_complete(),
                "progress restored"
            ),
            RestoreOutcome::Discarded => {
                debug!("remote progress discarded: local changes are newer");
            }
        }
        outcome
    }

    /// Wait for the most recent write to resolve.
    pub async fn settle(&mut self) -> Option<SyncOutcome> {
        let handle = self.pending.take()?;
        match handle.await {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                debug!(%err, "progress sync task did not complete");
                None
            }
        }
    }

    /// True while the store has not accepted the latest local state.
    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        self.sync.as_ref().is_some_and(ProgressSync::is_dirty)
    }

    /// Send the current state unless the store already has it, then wait.
    ///
    /// Covers writes still inside their debounce window as well as writes
    /// that ran out of attempts.
    pub async fn close(mut self) -> Option<SyncOutcome> {
        if self.has_unsaved_changes() {
            self.flush();
        }
        self.settle().await
    }

    fn schedule(&mut self) {
        if let Some(sync) = &self.sync {
            self.pending = Some(sync.schedule(self.session.to_progress_document()));
        }
    }

    fn flush(&mut self) {
        if let Some(sync) = &self.sync {
            self.pending = Some(sync.flush(self.session.to_progress_document()));
        }
    }
}
