//! Wire shapes exchanged with the progress store and the bank source.
//!
//! Every progress field is optional on read: documents written by older
//! clients, or partially corrupted ones, still deserialize and are repaired
//! when restored into a session. Every field is written on each sync.

use serde::{Deserialize, Serialize};

use crate::error::BankItemError;
use crate::model::{BankItem, BankItemId, FeedbackTiming, QuestionType, TestMode};

/// Persisted state of one user's session for one assessment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProgressDocument {
    pub selected_answers: Option<Vec<Option<String>>>,
    pub written_answers: Option<Vec<String>>,
    pub question_types: Option<Vec<QuestionType>>,
    pub shuffle_choices: Option<bool>,
    pub feedback_mode: Option<FeedbackTiming>,
    pub test_mode: Option<TestMode>,
    pub score: Option<u32>,
    pub done: Option<bool>,
    /// Indices into the bank item array, in question order.
    pub questions_order: Option<Vec<usize>>,
    /// Per-question choice lists; empty for written questions.
    pub question_choices: Option<Vec<Vec<String>>>,
}

/// Response body of `GET .../progress`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressEnvelope {
    pub progress: Option<ProgressSlot>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressSlot {
    pub test: Option<ProgressDocument>,
}

impl ProgressEnvelope {
    #[must_use]
    pub fn into_document(self) -> Option<ProgressDocument> {
        self.progress.and_then(|slot| slot.test)
    }
}

/// Request body of `PATCH .../progress`.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressPatch<'a> {
    pub test: &'a ProgressDocument,
}

/// Response body of the bank source `GET`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankEnvelope {
    pub flashcard: BankSet,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BankSet {
    #[serde(default)]
    pub cards: Vec<BankCard>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankCard {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
}

impl BankEnvelope {
    /// Convert wire cards into bank items, preserving order.
    ///
    /// # Errors
    ///
    /// Returns `BankItemError` if any card has a blank id.
    pub fn into_items(self) -> Result<Vec<BankItem>, BankItemError> {
        self.flashcard
            .cards
            .into_iter()
            .map(|card| BankItem::new(BankItemId::new(card.id), card.question, card.answer))
            .collect()
    }

    #[must_use]
    pub fn from_items(items: &[BankItem]) -> Self {
        Self {
            flashcard: BankSet {
                cards: items
                    .iter()
                    .map(|item| BankCard {
                        id: item.id().to_string(),
                        question: item.prompt().to_owned(),
                        answer: item.answer().to_owned(),
                    })
                    .collect(),
            },
        }
    }
}
