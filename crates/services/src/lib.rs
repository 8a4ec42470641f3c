#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod sessions;

pub use assess_core::Clock;

pub use config::{ClientConfig, DEFAULT_SYNC_DEBOUNCE};
pub use error::{ConfigError, LoadError};
pub use sessions::{
    AssessmentLoader, LiveSession, MAX_SYNC_ATTEMPTS, Participant, ProgressSync, SyncOutcome,
};
