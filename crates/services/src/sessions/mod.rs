mod live;
mod loader;
mod participant;
mod sync;

// Public API of the session subsystem.
pub use live::LiveSession;
pub use loader::AssessmentLoader;
pub use participant::Participant;
pub use sync::{MAX_SYNC_ATTEMPTS, ProgressSync, SyncOutcome};
