use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};

use assess_core::model::{AssessmentId, BankItem, SessionSettings};
use assess_core::progress::ProgressDocument;
use assess_core::{AssessmentSession, Clock};
use storage::repository::{ProgressKey, Storage};

use super::live::LiveSession;
use super::participant::Participant;
use super::sync::ProgressSync;
use crate::config::DEFAULT_SYNC_DEBOUNCE;
use crate::error::LoadError;

/// Builds live sessions from a bank source and a progress store.
#[derive(Clone)]
pub struct AssessmentLoader {
    storage: Storage,
    settings: SessionSettings,
    debounce: Duration,
    clock: Clock,
    seed: Option<u64>,
}

impl AssessmentLoader {
    #[must_use]
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            settings: SessionSettings::default(),
            debounce: DEFAULT_SYNC_DEBOUNCE,
            clock: Clock::default(),
            seed: None,
        }
    }

    /// Settings used until persisted progress says otherwise.
    #[must_use]
    pub fn with_settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Make question generation deterministic.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Fetch the bank, start a session and restore persisted progress.
    ///
    /// Progress that cannot be loaded is logged and the session starts fresh.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::Bank` if the bank cannot be fetched and
    /// `LoadError::Session` if it is empty.
    pub async fn load(
        &self,
        assessment_id: &AssessmentId,
        participant: &Participant,
    ) -> Result<LiveSession, LoadError> {
        let bank = self
            .storage
            .banks
            .fetch_bank(assessment_id, participant.user_id())
            .await
            .map_err(|err| {
                warn!(%err, assessment = %assessment_id, "failed to fetch question bank");
                LoadError::Bank(err)
            })?;

        let mut live = self.start(assessment_id, participant, bank)?;
        let ticket = live.begin_restore();
        if let Some(doc) = self.fetch_progress(assessment_id, participant).await {
            live.apply_restore(ticket, &doc);
        }

        info!(
            assessment = %assessment_id,
            questions = live.session().total_questions(),
            persistent = live.is_persistent(),
            "assessment loaded"
        );
        Ok(live)
    }

    /// Start a fresh session over an already fetched bank.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::Session` if `bank` is empty.
    pub fn start(
        &self,
        assessment_id: &AssessmentId,
        participant: &Participant,
        bank: Vec<BankItem>,
    ) -> Result<LiveSession, LoadError> {
        let mut rng = self.rng();
        let session = AssessmentSession::new(bank, self.settings, self.clock, &mut rng)?;
        let sync = participant.user_id().map(|user_id| {
            ProgressSync::new(
                self.storage.progress.clone(),
                ProgressKey::new(assessment_id.clone(), user_id.clone()),
                self.debounce,
            )
        });
        Ok(LiveSession::new(session, sync, rng))
    }

    async fn fetch_progress(
        &self,
        assessment_id: &AssessmentId,
        participant: &Participant,
    ) -> Option<ProgressDocument> {
        let user_id = participant.user_id()?;
        let key = ProgressKey::new(assessment_id.clone(), user_id.clone());
        match self.storage.progress.load_progress(&key).await {
            Ok(doc) => doc,
            Err(err) => {
                warn!(%err, assessment = %assessment_id, "failed to load progress; starting fresh");
                None
            }
        }
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        }
    }
}
