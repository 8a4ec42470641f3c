use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::ids::BankItemId;

/// How a single question is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionType {
    MultipleChoice,
    Written,
}

impl QuestionType {
    /// A question with no choices can only be answered by typing.
    #[must_use]
    pub fn from_choices(choices: &[String]) -> Self {
        if choices.is_empty() {
            Self::Written
        } else {
            Self::MultipleChoice
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MultipleChoice => "multiple-choice",
            Self::Written => "written",
        }
    }
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bank item as presented in one session.
///
/// `bank_index` is the item's position in the bank slice the session was built
/// from; the ordered list of these indices is what gets persisted as the
/// question order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedQuestion {
    bank_index: usize,
    bank_item_id: BankItemId,
    choices: Vec<String>,
    question_type: QuestionType,
}

impl GeneratedQuestion {
    #[must_use]
    pub fn multiple_choice(bank_index: usize, bank_item_id: BankItemId, choices: Vec<String>) -> Self {
        Self {
            bank_index,
            bank_item_id,
            choices,
            question_type: QuestionType::MultipleChoice,
        }
    }

    #[must_use]
    pub fn written(bank_index: usize, bank_item_id: BankItemId) -> Self {
        Self {
            bank_index,
            bank_item_id,
            choices: Vec::new(),
            question_type: QuestionType::Written,
        }
    }

    /// Rebuild a question from persisted choices; the type always follows the choices.
    #[must_use]
    pub fn restored(bank_index: usize, bank_item_id: BankItemId, choices: Vec<String>) -> Self {
        let question_type = QuestionType::from_choices(&choices);
        Self {
            bank_index,
            bank_item_id,
            choices,
            question_type,
        }
    }

    #[must_use]
    pub fn bank_index(&self) -> usize {
        self.bank_index
    }

    #[must_use]
    pub fn bank_item_id(&self) -> &BankItemId {
        &self.bank_item_id
    }

    #[must_use]
    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    #[must_use]
    pub fn question_type(&self) -> QuestionType {
        self.question_type
    }
}

/// A value the user submits for one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// One of the question's choices, compared verbatim.
    Choice(String),
    /// Free text, compared trimmed and case-insensitively.
    Written(String),
}

impl Answer {
    #[must_use]
    pub fn question_type(&self) -> QuestionType {
        match self {
            Self::Choice(_) => QuestionType::MultipleChoice,
            Self::Written(_) => QuestionType::Written,
        }
    }
}
