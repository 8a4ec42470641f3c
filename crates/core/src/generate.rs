//! Question-set construction.
//!
//! All functions take the random source explicitly so callers can seed it.

use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;

use crate::model::{BankItem, GeneratedQuestion, QuestionType, TestMode};

/// Upper bound on wrong answers offered next to the correct one.
pub const MAX_DISTRACTORS: usize = 3;

/// Decide how a single question is answered under `mode`.
///
/// Mixed mode is an unweighted coin flip per question with no balancing.
pub fn assign_type<R: Rng + ?Sized>(mode: TestMode, rng: &mut R) -> QuestionType {
    match mode {
        TestMode::MultipleChoice => QuestionType::MultipleChoice,
        TestMode::Written => QuestionType::Written,
        TestMode::Mixed => {
            if rng.random_bool(0.5) {
                QuestionType::MultipleChoice
            } else {
                QuestionType::Written
            }
        }
    }
}

/// Build the choice list for the bank item at `index`.
///
/// The correct answer comes first unless `shuffle` is set. Distractors are
/// distinct answers of other items that differ from the correct answer, drawn
/// uniformly without replacement. Returns an empty list for an out-of-range index.
pub fn build_choices<R: Rng + ?Sized>(
    bank: &[BankItem],
    index: usize,
    shuffle: bool,
    rng: &mut R,
) -> Vec<String> {
    let Some(item) = bank.get(index) else {
        return Vec::new();
    };
    let correct = item.answer();

    let mut seen = HashSet::new();
    let mut pool: Vec<&str> = bank
        .iter()
        .enumerate()
        .filter(|(other, _)| *other != index)
        .map(|(_, other)| other.answer())
        .filter(|answer| *answer != correct && seen.insert(*answer))
        .collect();
    let (distractors, _) = pool.partial_shuffle(rng, MAX_DISTRACTORS);

    let mut choices = Vec::with_capacity(distractors.len() + 1);
    choices.push(correct.to_owned());
    choices.extend(distractors.iter().map(|answer| (*answer).to_owned()));

    if shuffle {
        choices.shuffle(rng);
    }
    choices
}

/// Generate a fresh question set for a session.
///
/// Types and choices are decided per bank item first; the resulting question
/// order is then shuffled independently.
pub fn generate_question_set<R: Rng + ?Sized>(
    bank: &[BankItem],
    mode: TestMode,
    shuffle_choices: bool,
    rng: &mut R,
) -> Vec<GeneratedQuestion> {
    let mut questions = Vec::with_capacity(bank.len());
    for (index, item) in bank.iter().enumerate() {
        let question = match assign_type(mode, rng) {
            QuestionType::MultipleChoice => GeneratedQuestion::multiple_choice(
                index,
                item.id().clone(),
                build_choices(bank, index, shuffle_choices, rng),
            ),
            QuestionType::Written => GeneratedQuestion::written(index, item.id().clone()),
        };
        questions.push(question);
    }
    questions.shuffle(rng);
    questions
}
