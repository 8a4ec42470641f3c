use crate::error::BankItemError;
use crate::model::ids::BankItemId;

/// One immutable entry of a question bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankItem {
    id: BankItemId,
    prompt: String,
    answer: String,
}

impl BankItem {
    /// Build a bank item.
    ///
    /// # Errors
    ///
    /// Returns `BankItemError::EmptyId` if the id is blank.
    pub fn new(
        id: BankItemId,
        prompt: impl Into<String>,
        answer: impl Into<String>,
    ) -> Result<Self, BankItemError> {
        if id.as_str().trim().is_empty() {
            return Err(BankItemError::EmptyId);
        }
        Ok(Self {
            id,
            prompt: prompt.into(),
            answer: answer.into(),
        })
    }

    #[must_use]
    pub fn id(&self) -> &BankItemId {
        &self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// The correct answer text.
    #[must_use]
    pub fn answer(&self) -> &str {
        &self.answer
    }
}
