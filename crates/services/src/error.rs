//! Shared error types for the services crate.

use thiserror::Error;

use assess_core::SessionError;
use storage::repository::StorageError;

/// Errors that prevent a session from being created at all.
///
/// Restore and persistence failures never surface here; they fall back to a
/// fresh session and are only logged.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadError {
    #[error("failed to load question bank: {0}")]
    Bank(#[source] StorageError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Errors raised while reading client configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid ASSESS_SYNC_DEBOUNCE_MS value: {raw}")]
    InvalidDebounce { raw: String },
    #[error("invalid ASSESS_USER_ID value: {raw:?}")]
    InvalidUserId { raw: String },
}
