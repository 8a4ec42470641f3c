use std::env;
use std::time::Duration;

use assess_core::model::UserId;

use crate::error::ConfigError;
use crate::sessions::Participant;

/// Quiet period after the last change before progress is written.
pub const DEFAULT_SYNC_DEBOUNCE: Duration = Duration::from_millis(800);

/// Where sessions load from and persist to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Root of the remote collaborators, e.g. `https://host/api/flashcards`.
    pub base_url: Option<String>,
    /// Local `SQLite` store used when no `base_url` is set.
    pub db_url: Option<String>,
    pub user_id: Option<UserId>,
    pub sync_debounce: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            db_url: None,
            user_id: None,
            sync_debounce: DEFAULT_SYNC_DEBOUNCE,
        }
    }
}

impl ClientConfig {
    /// Read `ASSESS_BASE_URL`, `ASSESS_DB_URL`, `ASSESS_USER_ID` and
    /// `ASSESS_SYNC_DEBOUNCE_MS`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is present but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// # Errors
    ///
    /// Returns `ConfigError` when a variable is present but malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let user_id = match lookup("ASSESS_USER_ID") {
            Some(raw) => Some(
                raw.parse::<UserId>()
                    .map_err(|_| ConfigError::InvalidUserId { raw })?,
            ),
            None => None,
        };

        let sync_debounce = match non_empty("ASSESS_SYNC_DEBOUNCE_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::InvalidDebounce { raw })?,
            None => DEFAULT_SYNC_DEBOUNCE,
        };

        Ok(Self {
            base_url: non_empty("ASSESS_BASE_URL"),
            db_url: non_empty("ASSESS_DB_URL"),
            user_id,
            sync_debounce,
        })
    }

    /// Users without an id are anonymous and never persist progress.
    #[must_use]
    pub fn participant(&self) -> Participant {
        self.user_id
            .clone()
            .map_or(Participant::Anonymous, Participant::Registered)
    }
}
