use assess_core::model::UserId;

/// Who is taking the assessment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Participant {
    Registered(UserId),
    /// No durable identity: progress is neither restored nor persisted.
    Anonymous,
}

impl Participant {
    #[must_use]
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::Registered(user_id) => Some(user_id),
            Self::Anonymous => None,
        }
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Registered(_))
    }
}
