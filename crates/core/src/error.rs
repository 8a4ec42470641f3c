use thiserror::Error;

use crate::model::QuestionType;

/// Errors raised while building bank items.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BankItemError {
    #[error("bank item id cannot be empty")]
    EmptyId,
}

/// Rejected session transitions.
///
/// Every variant leaves the session exactly as it was before the call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("question bank is empty")]
    EmptyBank,

    #[error("session already completed")]
    Completed,

    #[error("question index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("{given} answer recorded for a {expected} question")]
    TypeMismatch {
        expected: QuestionType,
        given: QuestionType,
    },

    #[error("settings are locked once an answer has been recorded")]
    Locked,

    #[error("question types can only be randomized in mixed mode")]
    NotMixed,
}
