use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::fmt;

use crate::error::SessionError;
use crate::generate::{assign_type, build_choices, generate_question_set};
use crate::model::{
    Answer, BankItem, BankItemId, FeedbackTiming, GeneratedQuestion, QuestionType,
    SessionSettings, TestMode,
};
use crate::progress::ProgressDocument;
use crate::scoring::{choice_matches, written_matches};
use crate::time::Clock;

//
// ─── SUPPORTING TYPES ──────────────────────────────────────────────────────────
//

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub remaining: usize,
    pub is_complete: bool,
}

/// Result of finishing a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub score: u32,
    pub total: usize,
    /// Bank items answered wrongly or left unanswered, in question order.
    pub wrong_item_ids: Vec<BankItemId>,
}

/// Captures the local-change epoch at the moment a restore was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreTicket {
    epoch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    Applied,
    /// The user changed the session after the restore was requested.
    Discarded,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// State machine for one user's pass over one assessment.
///
/// `questions`, `selected_answers` and `written_answers` always have the same
/// length. Only the slot matching a question's type is ever written.
pub struct AssessmentSession {
    bank: Vec<BankItem>,
    settings: SessionSettings,
    questions: Vec<GeneratedQuestion>,
    selected_answers: Vec<Option<String>>,
    written_answers: Vec<String>,
    score: u32,
    completed: bool,
    has_answered: bool,
    pending_regeneration: bool,
    wrong_item_ids: Vec<BankItemId>,
    local_epoch: u64,
    clock: Clock,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl AssessmentSession {
    /// Start a session with a freshly generated question set.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyBank` if `bank` has no items.
    pub fn new<R: Rng + ?Sized>(
        bank: Vec<BankItem>,
        settings: SessionSettings,
        clock: Clock,
        rng: &mut R,
    ) -> Result<Self, SessionError> {
        if bank.is_empty() {
            return Err(SessionError::EmptyBank);
        }
        let questions =
            generate_question_set(&bank, settings.mode, settings.shuffle_choices, rng);
        let len = questions.len();
        Ok(Self {
            bank,
            settings,
            questions,
            selected_answers: vec![None; len],
            written_answers: vec![String::new(); len],
            score: 0,
            completed: false,
            has_answered: false,
            pending_regeneration: false,
            wrong_item_ids: Vec::new(),
            local_epoch: 0,
            clock,
            started_at: clock.now(),
            completed_at: None,
        })
    }

    /// Start a session, restoring persisted progress when present.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyBank` if `bank` has no items.
    pub fn initialize<R: Rng + ?Sized>(
        bank: Vec<BankItem>,
        settings: SessionSettings,
        restored: Option<&ProgressDocument>,
        clock: Clock,
        rng: &mut R,
    ) -> Result<Self, SessionError> {
        let mut session = Self::new(bank, settings, clock, rng)?;
        if let Some(doc) = restored {
            session.restore_from(doc, rng);
        }
        Ok(session)
    }

    // ─── Accessors ─────────────────────────────────────────────────────────────

    #[must_use]
    pub fn bank(&self) -> &[BankItem] {
        &self.bank
    }

    #[must_use]
    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    #[must_use]
    pub fn questions(&self) -> &[GeneratedQuestion] {
        &self.questions
    }

    #[must_use]
    pub fn question(&self, index: usize) -> Option<&GeneratedQuestion> {
        self.questions.get(index)
    }

    /// The bank item behind the question at `index`.
    #[must_use]
    pub fn bank_item(&self, index: usize) -> Option<&BankItem> {
        self.questions
            .get(index)
            .and_then(|question| self.bank.get(question.bank_index()))
    }

    #[must_use]
    pub fn selected_answers(&self) -> &[Option<String>] {
        &self.selected_answers
    }

    #[must_use]
    pub fn written_answers(&self) -> &[String] {
        &self.written_answers
    }

    /// Score frozen by the last `finish`; zero while in progress.
    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed
    }

    #[must_use]
    pub fn has_answered(&self) -> bool {
        self.has_answered
    }

    /// True when a settings change is waiting for an explicit `regenerate`.
    #[must_use]
    pub fn needs_regeneration(&self) -> bool {
        self.pending_regeneration
    }

    /// True once the user has changed anything since the session was built.
    #[must_use]
    pub fn has_local_changes(&self) -> bool {
        self.local_epoch != 0
    }

    #[must_use]
    pub fn wrong_item_ids(&self) -> &[BankItemId] {
        &self.wrong_item_ids
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Time spent so far, or until completion.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.completed_at.unwrap_or_else(|| self.clock.now()) - self.started_at
    }

    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    /// Number of questions whose active slot holds an answer.
    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.questions
            .iter()
            .enumerate()
            .filter(|(index, question)| match question.question_type() {
                QuestionType::MultipleChoice => self.selected_answers[*index].is_some(),
                QuestionType::Written => !self.written_answers[*index].trim().is_empty(),
            })
            .count()
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let total = self.total_questions();
        let answered = self.answered_count();
        SessionProgress {
            total,
            answered,
            remaining: total.saturating_sub(answered),
            is_complete: self.completed,
        }
    }

    /// Present only once the session is completed.
    #[must_use]
    pub fn outcome(&self) -> Option<SessionOutcome> {
        self.completed.then(|| SessionOutcome {
            score: self.score,
            total: self.total_questions(),
            wrong_item_ids: self.wrong_item_ids.clone(),
        })
    }

    // ─── Scoring ───────────────────────────────────────────────────────────────

    /// Correctness of the answer at `index`; `None` if unanswered or out of range.
    #[must_use]
    pub fn question_correct(&self, index: usize) -> Option<bool> {
        let question = self.questions.get(index)?;
        let correct = self.bank.get(question.bank_index())?.answer();
        match question.question_type() {
            QuestionType::MultipleChoice => self
                .selected_answers
                .get(index)?
                .as_deref()
                .map(|selected| choice_matches(Some(selected), correct)),
            QuestionType::Written => {
                let text = self.written_answers.get(index)?;
                if text.trim().is_empty() {
                    None
                } else {
                    Some(written_matches(text, correct))
                }
            }
        }
    }

    /// Correctness the user is allowed to see right now.
    #[must_use]
    pub fn visible_feedback(&self, index: usize) -> Option<bool> {
        match self.settings.feedback {
            FeedbackTiming::Immediate => self.question_correct(index),
            FeedbackTiming::End if self.completed => self.question_correct(index),
            FeedbackTiming::End => None,
        }
    }

    /// Live score over the current answers. Does not mutate.
    #[must_use]
    pub fn current_score(&self) -> u32 {
        let correct = (0..self.questions.len())
            .filter(|index| self.question_correct(*index) == Some(true))
            .count();
        u32::try_from(correct).unwrap_or(u32::MAX)
    }

    fn collect_wrong_items(&self) -> Vec<BankItemId> {
        self.questions
            .iter()
            .enumerate()
            .filter(|(index, _)| self.question_correct(*index) != Some(true))
            .map(|(_, question)| question.bank_item_id().clone())
            .collect()
    }

    // ─── Transitions ───────────────────────────────────────────────────────────

    /// Record an answer into the slot matching the question's type.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` after `finish`,
    /// `SessionError::IndexOutOfRange` for a bad index, and
    /// `SessionError::TypeMismatch` if the answer kind does not fit the question.
    pub fn record_answer(&mut self, index: usize, answer: Answer) -> Result<(), SessionError> {
        if self.completed {
            return Err(SessionError::Completed);
        }
        let len = self.questions.len();
        let question = self
            .questions
            .get(index)
            .ok_or(SessionError::IndexOutOfRange { index, len })?;

        match (question.question_type(), answer) {
            (QuestionType::MultipleChoice, Answer::Choice(value)) => {
                self.selected_answers[index] = Some(value);
            }
            (QuestionType::Written, Answer::Written(value)) => {
                self.written_answers[index] = value;
            }
            (expected, answer) => {
                return Err(SessionError::TypeMismatch {
                    expected,
                    given: answer.question_type(),
                });
            }
        }

        // Blank written text does not count, so the lock matches what a reload rebuilds.
        self.has_answered = self.answered_count() > 0;
        self.touch();
        Ok(())
    }

    /// Freeze the score and mark the session completed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` if the session is already finished.
    pub fn finish(&mut self) -> Result<SessionOutcome, SessionError> {
        if self.completed {
            return Err(SessionError::Completed);
        }
        self.wrong_item_ids = self.collect_wrong_items();
        self.score = self.current_score();
        self.completed = true;
        self.completed_at = Some(self.clock.now());
        self.touch();

        Ok(SessionOutcome {
            score: self.score,
            total: self.total_questions(),
            wrong_item_ids: self.wrong_item_ids.clone(),
        })
    }

    /// Regenerate the question set and clear all answers and results.
    pub fn restart<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.questions = generate_question_set(
            &self.bank,
            self.settings.mode,
            self.settings.shuffle_choices,
            rng,
        );
        self.clear_progress();
        self.pending_regeneration = false;
        self.started_at = self.clock.now();
        self.touch();
    }

    /// Change the generation mode. Takes effect on the next `regenerate` or `restart`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Locked` once any answer has been recorded.
    pub fn set_mode(&mut self, mode: TestMode) -> Result<(), SessionError> {
        self.ensure_unlocked()?;
        if self.settings.mode != mode {
            self.settings.mode = mode;
            self.pending_regeneration = true;
        }
        self.touch();
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionError::Locked` once any answer has been recorded.
    pub fn set_shuffle_choices(&mut self, shuffle: bool) -> Result<(), SessionError> {
        self.ensure_unlocked()?;
        if self.settings.shuffle_choices != shuffle {
            self.settings.shuffle_choices = shuffle;
            self.pending_regeneration = true;
        }
        self.touch();
        Ok(())
    }

    /// Feedback timing may change at any point, including after completion.
    pub fn set_feedback_timing(&mut self, feedback: FeedbackTiming) {
        self.settings.feedback = feedback;
        self.touch();
    }

    /// Re-flip the type of every question in mixed mode.
    ///
    /// Questions that stay multiple-choice keep their existing choices; only
    /// questions that newly become multiple-choice get choices built.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Locked` once answered, `SessionError::NotMixed`
    /// outside mixed mode.
    pub fn randomize_question_types<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> Result<(), SessionError> {
        self.ensure_unlocked()?;
        if self.settings.mode != TestMode::Mixed {
            return Err(SessionError::NotMixed);
        }

        let mut questions = Vec::with_capacity(self.questions.len());
        for question in self.questions.drain(..) {
            let next = match (assign_type(TestMode::Mixed, rng), question.question_type()) {
                (QuestionType::MultipleChoice, QuestionType::MultipleChoice) => question,
                (QuestionType::MultipleChoice, QuestionType::Written) => {
                    let choices = build_choices(
                        &self.bank,
                        question.bank_index(),
                        self.settings.shuffle_choices,
                        rng,
                    );
                    GeneratedQuestion::multiple_choice(
                        question.bank_index(),
                        question.bank_item_id().clone(),
                        choices,
                    )
                }
                (QuestionType::Written, _) => GeneratedQuestion::written(
                    question.bank_index(),
                    question.bank_item_id().clone(),
                ),
            };
            questions.push(next);
        }
        self.questions = questions;
        self.touch();
        Ok(())
    }

    /// Build a new question set from the current settings.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Locked` once any answer has been recorded.
    pub fn regenerate<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), SessionError> {
        self.ensure_unlocked()?;
        self.questions = generate_question_set(
            &self.bank,
            self.settings.mode,
            self.settings.shuffle_choices,
            rng,
        );
        self.clear_progress();
        self.pending_regeneration = false;
        self.touch();
        Ok(())
    }

    fn ensure_unlocked(&self) -> Result<(), SessionError> {
        if self.has_answered {
            return Err(SessionError::Locked);
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.local_epoch = self.local_epoch.wrapping_add(1);
    }

    fn clear_progress(&mut self) {
        let len = self.questions.len();
        self.selected_answers = vec![None; len];
        self.written_answers = vec![String::new(); len];
        self.score = 0;
        self.completed = false;
        self.completed_at = None;
        self.has_answered = false;
        self.wrong_item_ids.clear();
    }

    // ─── Persistence ───────────────────────────────────────────────────────────

    /// Remember the current local-change epoch before fetching remote progress.
    #[must_use]
    pub fn begin_restore(&self) -> RestoreTicket {
        RestoreTicket {
            epoch: self.local_epoch,
        }
    }

    /// Apply fetched progress unless the user acted since `ticket` was taken.
    pub fn apply_restore<R: Rng + ?Sized>(
        &mut self,
        ticket: RestoreTicket,
        doc: &ProgressDocument,
        rng: &mut R,
    ) -> RestoreOutcome {
        if ticket.epoch != self.local_epoch {
            return RestoreOutcome::Discarded;
        }
        self.restore_from(doc, rng);
        RestoreOutcome::Applied
    }

    fn restore_from<R: Rng + ?Sized>(&mut self, doc: &ProgressDocument, rng: &mut R) {
        if let Some(mode) = doc.test_mode {
            self.settings.mode = mode;
        }
        if let Some(feedback) = doc.feedback_mode {
            self.settings.feedback = feedback;
        }
        if let Some(shuffle) = doc.shuffle_choices {
            self.settings.shuffle_choices = shuffle;
        }
        self.pending_regeneration = false;

        let bank_len = self.bank.len();
        let Some(order) = doc
            .questions_order
            .as_deref()
            .filter(|order| is_permutation(order, bank_len))
        else {
            // Answers cannot be mapped without a usable order.
            self.questions = generate_question_set(
                &self.bank,
                self.settings.mode,
                self.settings.shuffle_choices,
                rng,
            );
            self.clear_progress();
            return;
        };

        let mut questions = Vec::with_capacity(order.len());
        for (position, &bank_index) in order.iter().enumerate() {
            let persisted = doc
                .question_choices
                .as_ref()
                .and_then(|all| all.get(position));
            let choices = match persisted {
                Some(choices) => choices.clone(),
                None => {
                    let question_type = doc
                        .question_types
                        .as_ref()
                        .and_then(|types| types.get(position).copied())
                        .unwrap_or_else(|| assign_type(self.settings.mode, rng));
                    match question_type {
                        QuestionType::MultipleChoice => build_choices(
                            &self.bank,
                            bank_index,
                            self.settings.shuffle_choices,
                            rng,
                        ),
                        QuestionType::Written => Vec::new(),
                    }
                }
            };
            questions.push(GeneratedQuestion::restored(
                bank_index,
                self.bank[bank_index].id().clone(),
                choices,
            ));
        }
        self.questions = questions;
        self.clear_progress();

        for (position, question) in self.questions.iter().enumerate() {
            match question.question_type() {
                QuestionType::MultipleChoice => {
                    self.selected_answers[position] = doc
                        .selected_answers
                        .as_ref()
                        .and_then(|answers| answers.get(position))
                        .cloned()
                        .flatten()
                        .filter(|value| !value.is_empty());
                }
                QuestionType::Written => {
                    if let Some(text) = doc
                        .written_answers
                        .as_ref()
                        .and_then(|answers| answers.get(position))
                    {
                        self.written_answers[position].clone_from(text);
                    }
                }
            }
        }

        self.has_answered = self.answered_count() > 0;

        if doc.done == Some(true) {
            self.wrong_item_ids = self.collect_wrong_items();
            self.score = doc.score.unwrap_or_else(|| self.current_score());
            self.completed = true;
            self.completed_at = Some(self.clock.now());
        }
    }

    /// Serialize the full state for the progress store.
    #[must_use]
    pub fn to_progress_document(&self) -> ProgressDocument {
        ProgressDocument {
            selected_answers: Some(self.selected_answers.clone()),
            written_answers: Some(self.written_answers.clone()),
            question_types: Some(
                self.questions
                    .iter()
                    .map(GeneratedQuestion::question_type)
                    .collect(),
            ),
            shuffle_choices: Some(self.settings.shuffle_choices),
            feedback_mode: Some(self.settings.feedback),
            test_mode: Some(self.settings.mode),
            score: Some(self.score),
            done: Some(self.completed),
            questions_order: Some(
                self.questions
                    .iter()
                    .map(GeneratedQuestion::bank_index)
                    .collect(),
            ),
            question_choices: Some(
                self.questions
                    .iter()
                    .map(|question| question.choices().to_vec())
                    .collect(),
            ),
        }
    }
}

fn is_permutation(order: &[usize], len: usize) -> bool {
    if order.len() != len {
        return false;
    }
    let mut seen = vec![false; len];
    for &index in order {
        match seen.get_mut(index) {
            Some(slot) if !*slot => *slot = true,
            _ => return false,
        }
    }
    true
}

impl fmt::Debug for AssessmentSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssessmentSession")
            .field("bank_len", &self.bank.len())
            .field("settings", &self.settings)
            .field("questions_len", &self.questions.len())
            .field("has_answered", &self.has_answered)
            .field("completed", &self.completed)
            .field("score", &self.score)
            .field("local_epoch", &self.local_epoch)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{fixed_clock, fixed_now};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn item(id: &str, prompt: &str, answer: &str) -> BankItem {
        BankItem::new(BankItemId::new(id), prompt, answer).unwrap()
    }

    fn arithmetic_bank() -> Vec<BankItem> {
        vec![item("1", "2+2", "4"), item("2", "3+3", "6")]
    }

    fn capitals_bank() -> Vec<BankItem> {
        vec![
            item("fr", "Capital of France", "paris"),
            item("de", "Capital of Germany", "berlin"),
            item("it", "Capital of Italy", "rome"),
        ]
    }

    fn settings(mode: TestMode, shuffle: bool) -> SessionSettings {
        SessionSettings::default()
            .with_mode(mode)
            .with_shuffle_choices(shuffle)
    }

    fn position_of(session: &AssessmentSession, id: &str) -> usize {
        session
            .questions()
            .iter()
            .position(|q| q.bank_item_id().as_str() == id)
            .unwrap()
    }

    fn assert_lengths(session: &AssessmentSession) {
        assert_eq!(session.questions().len(), session.selected_answers().len());
        assert_eq!(session.questions().len(), session.written_answers().len());
    }

    #[test]
    fn empty_bank_is_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        let err = AssessmentSession::new(Vec::new(), SessionSettings::default(), fixed_clock(), &mut rng)
            .unwrap_err();
        assert_eq!(err, SessionError::EmptyBank);
    }

    #[test]
    fn unshuffled_choices_lead_with_the_answer_and_score_by_mapping() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut session = AssessmentSession::new(
            arithmetic_bank(),
            settings(TestMode::MultipleChoice, false),
            fixed_clock(),
            &mut rng,
        )
        .unwrap();

        for index in 0..session.total_questions() {
            let question = session.question(index).unwrap();
            let bank_item = session.bank_item(index).unwrap();
            assert_eq!(question.choices()[0], bank_item.answer());
        }

        let doc = session.to_progress_document();
        let order = doc.questions_order.unwrap();
        let first = position_of(&session, "1");
        assert_eq!(order[first], 0);

        session.record_answer(first, Answer::Choice("4".into())).unwrap();
        let outcome = session.finish().unwrap();
        assert_eq!(outcome.score, 1);
        assert_eq!(outcome.total, 2);
        assert_eq!(outcome.wrong_item_ids, vec![BankItemId::new("2")]);
        assert_eq!(session.completed_at(), Some(fixed_now()));
    }

    #[test]
    fn written_answers_are_trimmed_and_case_insensitive() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut session = AssessmentSession::new(
            capitals_bank(),
            settings(TestMode::Written, true),
            fixed_clock(),
            &mut rng,
        )
        .unwrap();
        let fr = position_of(&session, "fr");
        session.record_answer(fr, Answer::Written("  Paris ".into())).unwrap();
        assert_eq!(session.question_correct(fr), Some(true));
        assert_eq!(session.current_score(), 1);
    }

    #[test]
    fn written_answers_have_no_fuzzy_matching() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut session = AssessmentSession::new(
            capitals_bank(),
            settings(TestMode::Written, true),
            fixed_clock(),
            &mut rng,
        )
        .unwrap();
        let fr = position_of(&session, "fr");
        session.record_answer(fr, Answer::Written("Pariss".into())).unwrap();
        assert_eq!(session.question_correct(fr), Some(false));
        assert_eq!(session.current_score(), 0);
    }

    #[test]
    fn current_score_is_stable_without_mutation() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut session = AssessmentSession::new(
            capitals_bank(),
            settings(TestMode::Written, true),
            fixed_clock(),
            &mut rng,
        )
        .unwrap();
        session.record_answer(0, Answer::Written("rome".into())).unwrap();
        assert_eq!(session.current_score(), session.current_score());
        assert_eq!(session.score(), 0);
    }

    #[test]
    fn finish_freezes_score() {
        let mut rng = StdRng::seed_from_u64(6);
        let mut session = AssessmentSession::new(
            capitals_bank(),
            settings(TestMode::Written, true),
            fixed_clock(),
            &mut rng,
        )
        .unwrap();
        let de = position_of(&session, "de");
        session.record_answer(de, Answer::Written("Berlin".into())).unwrap();
        let live = session.current_score();
        let outcome = session.finish().unwrap();
        assert_eq!(outcome.score, live);

        let fr = position_of(&session, "fr");
        let err = session
            .record_answer(fr, Answer::Written("paris".into()))
            .unwrap_err();
        assert_eq!(err, SessionError::Completed);
        assert_eq!(session.score(), live);
        assert_eq!(session.finish().unwrap_err(), SessionError::Completed);
        assert_eq!(session.outcome().unwrap().score, live);
    }

    #[test]
    fn mismatched_or_out_of_range_answers_leave_state_untouched() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut session = AssessmentSession::new(
            arithmetic_bank(),
            settings(TestMode::MultipleChoice, false),
            fixed_clock(),
            &mut rng,
        )
        .unwrap();

        let err = session.record_answer(0, Answer::Written("4".into())).unwrap_err();
        assert!(matches!(err, SessionError::TypeMismatch { .. }));
        let err = session.record_answer(9, Answer::Choice("4".into())).unwrap_err();
        assert_eq!(err, SessionError::IndexOutOfRange { index: 9, len: 2 });

        assert!(!session.has_answered());
        assert!(!session.has_local_changes());
        assert!(session.written_answers().iter().all(String::is_empty));
        assert_lengths(&session);
    }

    #[test]
    fn restart_clears_everything() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut session = AssessmentSession::new(
            capitals_bank(),
            settings(TestMode::Written, true),
            fixed_clock(),
            &mut rng,
        )
        .unwrap();
        session.record_answer(1, Answer::Written("berlin".into())).unwrap();
        session.finish().unwrap();

        session.restart(&mut rng);
        assert!(!session.has_answered());
        assert!(!session.is_complete());
        assert_eq!(session.score(), 0);
        assert!(session.selected_answers().iter().all(Option::is_none));
        assert!(session.written_answers().iter().all(String::is_empty));
        assert!(session.wrong_item_ids().is_empty());
        assert_eq!(session.completed_at(), None);
        assert_lengths(&session);
    }

    #[test]
    fn settings_lock_after_first_answer() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut session = AssessmentSession::new(
            capitals_bank(),
            settings(TestMode::Mixed, true),
            fixed_clock(),
            &mut rng,
        )
        .unwrap();
        let first = session.question(0).unwrap().question_type();
        let answer = match first {
            QuestionType::MultipleChoice => Answer::Choice("paris".into()),
            QuestionType::Written => Answer::Written("paris".into()),
        };
        session.record_answer(0, answer).unwrap();

        let before = session.questions().to_vec();
        assert_eq!(session.set_mode(TestMode::Written), Err(SessionError::Locked));
        assert_eq!(session.set_shuffle_choices(false), Err(SessionError::Locked));
        assert_eq!(
            session.randomize_question_types(&mut rng),
            Err(SessionError::Locked)
        );
        assert_eq!(session.regenerate(&mut rng), Err(SessionError::Locked));
        assert_eq!(session.settings().mode, TestMode::Mixed);
        assert!(session.settings().shuffle_choices);
        assert_eq!(session.questions(), before.as_slice());

        session.set_feedback_timing(FeedbackTiming::End);
        assert_eq!(session.settings().feedback, FeedbackTiming::End);
    }

    #[test]
    fn set_mode_defers_regeneration() {
        let mut rng = StdRng::seed_from_u64(10);
        let mut session = AssessmentSession::new(
            capitals_bank(),
            settings(TestMode::MultipleChoice, true),
            fixed_clock(),
            &mut rng,
        )
        .unwrap();
        session.set_mode(TestMode::Written).unwrap();
        assert!(session.needs_regeneration());
        assert!(session
            .questions()
            .iter()
            .all(|q| q.question_type() == QuestionType::MultipleChoice));

        session.regenerate(&mut rng).unwrap();
        assert!(!session.needs_regeneration());
        assert!(session
            .questions()
            .iter()
            .all(|q| q.question_type() == QuestionType::Written));
    }

    #[test]
    fn randomize_requires_mixed_mode() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut session = AssessmentSession::new(
            capitals_bank(),
            settings(TestMode::Written, true),
            fixed_clock(),
            &mut rng,
        )
        .unwrap();
        assert_eq!(
            session.randomize_question_types(&mut rng),
            Err(SessionError::NotMixed)
        );
    }

    #[test]
    fn randomize_keeps_choices_of_questions_that_stay_multiple_choice() {
        let mut rng = StdRng::seed_from_u64(12);
        let bank = capitals_bank();
        let doc = ProgressDocument {
            test_mode: Some(TestMode::Mixed),
            questions_order: Some(vec![0, 1, 2]),
            question_choices: Some(vec![
                vec!["rome".into(), "paris".into()],
                vec!["berlin".into(), "oslo".into()],
                vec!["madrid".into(), "rome".into()],
            ]),
            ..ProgressDocument::default()
        };
        let mut session = AssessmentSession::initialize(
            bank,
            SessionSettings::default(),
            Some(&doc),
            fixed_clock(),
            &mut rng,
        )
        .unwrap();
        let before = session.questions().to_vec();

        for _ in 0..8 {
            session.randomize_question_types(&mut rng).unwrap();
            for (old, new) in before.iter().zip(session.questions()) {
                assert_eq!(old.bank_index(), new.bank_index());
                assert_eq!(new.question_type(), QuestionType::from_choices(new.choices()));
            }
        }

        // Questions that were never flipped to written keep the restored choices.
        let mut fresh = AssessmentSession::initialize(
            capitals_bank(),
            SessionSettings::default(),
            Some(&doc),
            fixed_clock(),
            &mut rng,
        )
        .unwrap();
        fresh.randomize_question_types(&mut rng).unwrap();
        for (old, new) in before.iter().zip(fresh.questions()) {
            if new.question_type() == QuestionType::MultipleChoice {
                assert_eq!(old.choices(), new.choices());
            }
        }
        assert_lengths(&fresh);
    }

    #[test]
    fn restore_uses_persisted_order_and_choices() {
        let mut rng = StdRng::seed_from_u64(13);
        let doc = ProgressDocument {
            questions_order: Some(vec![1, 0]),
            question_choices: Some(vec![
                vec!["6".into(), "4".into()],
                vec!["4".into(), "9".into(), "6".into()],
            ]),
            selected_answers: Some(vec![Some("6".into()), None]),
            ..ProgressDocument::default()
        };
        let session = AssessmentSession::initialize(
            arithmetic_bank(),
            settings(TestMode::MultipleChoice, true),
            Some(&doc),
            fixed_clock(),
            &mut rng,
        )
        .unwrap();

        let first = session.question(0).unwrap();
        assert_eq!(first.bank_item_id(), &BankItemId::new("2"));
        assert_eq!(first.choices(), ["6".to_string(), "4".to_string()]);
        assert_eq!(
            session.question(1).unwrap().choices(),
            ["4".to_string(), "9".to_string(), "6".to_string()]
        );
        assert_eq!(session.selected_answers()[0].as_deref(), Some("6"));
        assert!(session.has_answered());
        assert_eq!(session.current_score(), 1);
        assert_lengths(&session);
    }

    #[test]
    fn restore_recomputes_types_and_drops_cross_type_answers() {
        let mut rng = StdRng::seed_from_u64(14);
        let doc = ProgressDocument {
            test_mode: Some(TestMode::Mixed),
            questions_order: Some(vec![0, 1]),
            question_types: Some(vec![QuestionType::Written, QuestionType::MultipleChoice]),
            question_choices: Some(vec![vec!["4".into(), "6".into()], Vec::new()]),
            selected_answers: Some(vec![None, Some("6".into())]),
            written_answers: Some(vec!["4".into(), String::new()]),
            ..ProgressDocument::default()
        };
        let session = AssessmentSession::initialize(
            arithmetic_bank(),
            SessionSettings::default(),
            Some(&doc),
            fixed_clock(),
            &mut rng,
        )
        .unwrap();

        assert_eq!(
            session.question(0).unwrap().question_type(),
            QuestionType::MultipleChoice
        );
        assert_eq!(session.question(1).unwrap().question_type(), QuestionType::Written);
        assert_eq!(session.selected_answers(), [None::<String>, None]);
        assert_eq!(session.written_answers(), [String::new(), String::new()]);
        assert!(!session.has_answered());
        assert_eq!(session.settings().mode, TestMode::Mixed);
    }

    #[test]
    fn restore_rebuilds_missing_choices_from_types() {
        let mut rng = StdRng::seed_from_u64(15);
        let doc = ProgressDocument {
            questions_order: Some(vec![2, 0, 1]),
            question_types: Some(vec![
                QuestionType::Written,
                QuestionType::MultipleChoice,
                QuestionType::Written,
            ]),
            shuffle_choices: Some(false),
            ..ProgressDocument::default()
        };
        let session = AssessmentSession::initialize(
            capitals_bank(),
            SessionSettings::default(),
            Some(&doc),
            fixed_clock(),
            &mut rng,
        )
        .unwrap();
        let types: Vec<_> = session.questions().iter().map(|q| q.question_type()).collect();
        assert_eq!(
            types,
            vec![
                QuestionType::Written,
                QuestionType::MultipleChoice,
                QuestionType::Written
            ]
        );
        assert_eq!(session.question(1).unwrap().choices()[0], "paris");
        assert!(!session.settings().shuffle_choices);
    }

    #[test]
    fn restore_with_unusable_order_regenerates() {
        for order in [vec![0, 0], vec![0, 5], vec![0], Vec::new()] {
            let mut rng = StdRng::seed_from_u64(16);
            let doc = ProgressDocument {
                questions_order: Some(order),
                selected_answers: Some(vec![Some("4".into()), Some("6".into())]),
                done: Some(true),
                ..ProgressDocument::default()
            };
            let session = AssessmentSession::initialize(
                arithmetic_bank(),
                settings(TestMode::MultipleChoice, false),
                Some(&doc),
                fixed_clock(),
                &mut rng,
            )
            .unwrap();
            assert_eq!(session.total_questions(), 2);
            assert!(!session.has_answered());
            assert!(!session.is_complete());
            assert_lengths(&session);
        }
    }

    #[test]
    fn restore_of_finished_session_keeps_completion() {
        let mut rng = StdRng::seed_from_u64(17);
        let doc = ProgressDocument {
            questions_order: Some(vec![0, 1]),
            question_choices: Some(vec![vec!["4".into(), "6".into()], vec!["6".into(), "4".into()]]),
            selected_answers: Some(vec![Some("4".into()), Some("4".into())]),
            feedback_mode: Some(FeedbackTiming::End),
            done: Some(true),
            ..ProgressDocument::default()
        };
        let session = AssessmentSession::initialize(
            arithmetic_bank(),
            SessionSettings::default(),
            Some(&doc),
            fixed_clock(),
            &mut rng,
        )
        .unwrap();
        assert!(session.is_complete());
        assert_eq!(session.score(), 1);
        assert_eq!(session.wrong_item_ids(), [BankItemId::new("2")]);
        assert_eq!(session.visible_feedback(1), Some(false));
    }

    #[test]
    fn end_feedback_hides_correctness_until_finish() {
        let mut rng = StdRng::seed_from_u64(18);
        let mut session = AssessmentSession::new(
            capitals_bank(),
            settings(TestMode::Written, true).with_feedback(FeedbackTiming::End),
            fixed_clock(),
            &mut rng,
        )
        .unwrap();
        session.record_answer(0, Answer::Written("nowhere".into())).unwrap();
        assert_eq!(session.visible_feedback(0), None);
        session.finish().unwrap();
        assert_eq!(session.visible_feedback(0), Some(false));
    }

    #[test]
    fn restore_is_discarded_after_local_restart() {
        let mut rng = StdRng::seed_from_u64(19);
        let mut session = AssessmentSession::new(
            arithmetic_bank(),
            settings(TestMode::MultipleChoice, false),
            fixed_clock(),
            &mut rng,
        )
        .unwrap();
        let ticket = session.begin_restore();
        session.restart(&mut rng);

        let doc = ProgressDocument {
            questions_order: Some(vec![1, 0]),
            question_choices: Some(vec![vec!["6".into()], vec!["4".into()]]),
            selected_answers: Some(vec![Some("6".into()), Some("4".into())]),
            done: Some(true),
            score: Some(2),
            ..ProgressDocument::default()
        };
        assert_eq!(
            session.apply_restore(ticket, &doc, &mut rng),
            RestoreOutcome::Discarded
        );
        assert!(!session.is_complete());
        assert!(session.selected_answers().iter().all(Option::is_none));
        assert_eq!(session.score(), 0);
    }

    #[test]
    fn restore_applies_when_untouched() {
        let mut rng = StdRng::seed_from_u64(20);
        let mut session = AssessmentSession::new(
            arithmetic_bank(),
            settings(TestMode::MultipleChoice, false),
            fixed_clock(),
            &mut rng,
        )
        .unwrap();
        let ticket = session.begin_restore();
        let doc = ProgressDocument {
            questions_order: Some(vec![1, 0]),
            question_choices: Some(vec![vec!["6".into()], vec!["4".into()]]),
            selected_answers: Some(vec![Some("6".into()), None]),
            ..ProgressDocument::default()
        };
        assert_eq!(
            session.apply_restore(ticket, &doc, &mut rng),
            RestoreOutcome::Applied
        );
        assert_eq!(session.progress().answered, 1);
        assert_eq!(session.progress().remaining, 1);
    }

    #[test]
    fn progress_document_round_trips_through_restore() {
        let mut rng = StdRng::seed_from_u64(21);
        let mut session = AssessmentSession::new(
            capitals_bank(),
            settings(TestMode::Mixed, true),
            fixed_clock(),
            &mut rng,
        )
        .unwrap();
        for index in 0..session.total_questions() {
            let answer = match session.question(index).unwrap().question_type() {
                QuestionType::MultipleChoice => {
                    Answer::Choice(session.question(index).unwrap().choices()[0].clone())
                }
                QuestionType::Written => Answer::Written("rome".into()),
            };
            session.record_answer(index, answer).unwrap();
        }
        let doc = session.to_progress_document();

        let restored = AssessmentSession::initialize(
            capitals_bank(),
            SessionSettings::default(),
            Some(&doc),
            fixed_clock(),
            &mut rng,
        )
        .unwrap();
        assert_eq!(restored.questions(), session.questions());
        assert_eq!(restored.selected_answers(), session.selected_answers());
        assert_eq!(restored.written_answers(), session.written_answers());
        assert_eq!(restored.settings(), session.settings());
        assert_eq!(restored.current_score(), session.current_score());
    }

    #[test]
    fn blank_written_answer_does_not_lock_settings() {
        let mut rng = StdRng::seed_from_u64(31);
        let mut session = AssessmentSession::new(
            capitals_bank(),
            settings(TestMode::Written, true),
            fixed_clock(),
            &mut rng,
        )
        .unwrap();

        session.record_answer(0, Answer::Written("   ".into())).unwrap();
        assert!(!session.has_answered());
        assert!(session.has_local_changes());
        session.set_mode(TestMode::Mixed).unwrap();

        let reloaded = AssessmentSession::initialize(
            capitals_bank(),
            session.settings(),
            Some(&session.to_progress_document()),
            fixed_clock(),
            &mut rng,
        )
        .unwrap();
        assert_eq!(reloaded.has_answered(), session.has_answered());
    }

    #[test]
    fn clearing_the_only_answer_unlocks_settings() {
        let mut rng = StdRng::seed_from_u64(32);
        let mut session = AssessmentSession::new(
            capitals_bank(),
            settings(TestMode::Written, true),
            fixed_clock(),
            &mut rng,
        )
        .unwrap();

        session.record_answer(1, Answer::Written("berlin".into())).unwrap();
        assert_eq!(session.set_shuffle_choices(false), Err(SessionError::Locked));

        session.record_answer(1, Answer::Written(String::new())).unwrap();
        assert!(!session.has_answered());
        session.set_shuffle_choices(false).unwrap();
    }
}
