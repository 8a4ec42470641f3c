#![forbid(unsafe_code)]

pub mod error;
pub mod generate;
pub mod model;
pub mod progress;
pub mod scoring;
pub mod session;
pub mod time;

pub use error::{BankItemError, SessionError};
pub use session::{AssessmentSession, RestoreOutcome, RestoreTicket, SessionOutcome, SessionProgress};
pub use time::Clock;
