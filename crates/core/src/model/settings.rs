use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Question generation policy for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestMode {
    #[default]
    MultipleChoice,
    Written,
    /// Each question independently becomes multiple-choice or written.
    Mixed,
}

/// When correctness is revealed to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackTiming {
    #[default]
    Immediate,
    End,
}

/// User-facing configuration of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub mode: TestMode,
    pub feedback: FeedbackTiming,
    pub shuffle_choices: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            mode: TestMode::default(),
            feedback: FeedbackTiming::default(),
            shuffle_choices: true,
        }
    }
}

impl SessionSettings {
    #[must_use]
    pub fn with_mode(mut self, mode: TestMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_feedback(mut self, feedback: FeedbackTiming) -> Self {
        self.feedback = feedback;
        self
    }

    #[must_use]
    pub fn with_shuffle_choices(mut self, shuffle: bool) -> Self {
        self.shuffle_choices = shuffle;
        self
    }
}

// ─── Parsing ───────────────────────────────────────────────────────────────────

/// Error type for parsing a setting value from a string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSettingError {
    kind: &'static str,
    raw: String,
}

impl fmt::Display for ParseSettingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {}", self.kind, self.raw)
    }
}

impl std::error::Error for ParseSettingError {}

impl FromStr for TestMode {
    type Err = ParseSettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "multiple-choice" | "mc" => Ok(Self::MultipleChoice),
            "written" => Ok(Self::Written),
            "mixed" => Ok(Self::Mixed),
            _ => Err(ParseSettingError {
                kind: "test mode",
                raw: s.to_owned(),
            }),
        }
    }
}

impl FromStr for FeedbackTiming {
    type Err = ParseSettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "immediate" => Ok(Self::Immediate),
            "end" => Ok(Self::End),
            _ => Err(ParseSettingError {
                kind: "feedback timing",
                raw: s.to_owned(),
            }),
        }
    }
}
