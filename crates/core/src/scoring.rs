//! Correctness rules.
//!
//! Multiple-choice selections are compared verbatim against the stored answer;
//! written answers are compared trimmed and case-insensitively. The asymmetry
//! is intentional.

/// A selected choice is correct only if it is exactly the stored answer.
#[must_use]
pub fn choice_matches(selected: Option<&str>, correct: &str) -> bool {
    selected.is_some_and(|value| value == correct)
}

/// A blank written answer never scores, even against a blank correct answer.
#[must_use]
pub fn written_matches(given: &str, correct: &str) -> bool {
    let given = given.trim();
    !given.is_empty() && given.to_lowercase() == correct.trim().to_lowercase()
}
