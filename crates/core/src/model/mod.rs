mod bank;
mod ids;
mod question;
mod settings;

pub use bank::BankItem;
pub use ids::{AssessmentId, BankItemId, ParseIdError, UserId};
pub use question::{Answer, GeneratedQuestion, QuestionType};
pub use settings::{FeedbackTiming, ParseSettingError, SessionSettings, TestMode};
