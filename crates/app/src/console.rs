//! Line-oriented rendering and input handling for the `take` command.

use std::fmt::Write as _;

use assess_core::model::{Answer, GeneratedQuestion, QuestionType};
use assess_core::{AssessmentSession, SessionOutcome};

/// One line typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Answer(String),
    Skip,
    Finish,
    Restart,
    Quit,
    Help,
    Unknown(String),
}

impl Input {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed {
            ":skip" | ":s" => Self::Skip,
            ":finish" | ":f" => Self::Finish,
            ":restart" | ":r" => Self::Restart,
            ":quit" | ":q" => Self::Quit,
            ":help" | ":h" | "?" => Self::Help,
            command if command.starts_with(':') => Self::Unknown(command.to_owned()),
            _ => Self::Answer(line.trim_end_matches(['\r', '\n']).to_owned()),
        }
    }
}

pub const HELP: &str = "Commands: :skip  :finish  :restart  :quit  :help";

/// Turn raw input into an answer for `question`.
///
/// For multiple choice a number picks the matching option, or the option text
/// can be typed out. Anything that names no offered option gives `None`.
pub fn to_answer(question: &GeneratedQuestion, raw: &str) -> Option<Answer> {
    match question.question_type() {
        QuestionType::Written => Some(Answer::Written(raw.to_owned())),
        QuestionType::MultipleChoice => {
            let raw = raw.trim();
            let by_number = raw
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| question.choices().get(i));
            by_number
                .or_else(|| question.choices().iter().find(|choice| choice.as_str() == raw))
                .map(|choice| Answer::Choice(choice.clone()))
        }
    }
}

pub fn is_answered(session: &AssessmentSession, index: usize) -> bool {
    match session.question(index).map(GeneratedQuestion::question_type) {
        Some(QuestionType::MultipleChoice) => session
            .selected_answers()
            .get(index)
            .is_some_and(Option::is_some),
        Some(QuestionType::Written) => session
            .written_answers()
            .get(index)
            .is_some_and(|text| !text.trim().is_empty()),
        None => false,
    }
}

/// Next unanswered question at or after `from`, wrapping around once.
pub fn next_open(session: &AssessmentSession, from: usize) -> Option<usize> {
    let total = session.total_questions();
    (0..total)
        .map(|offset| (from + offset) % total)
        .find(|&index| !is_answered(session, index))
}

pub fn render_question(session: &AssessmentSession, index: usize) -> String {
    let mut out = String::new();
    let (Some(question), Some(item)) = (session.question(index), session.bank_item(index)) else {
        return out;
    };
    let progress = session.progress();
    let _ = writeln!(
        out,
        "\n[{}/{}] ({} answered) {}",
        index + 1,
        progress.total,
        progress.answered,
        item.prompt()
    );
    match question.question_type() {
        QuestionType::MultipleChoice => {
            for (n, choice) in question.choices().iter().enumerate() {
                let _ = writeln!(out, "  {}) {choice}", n + 1);
            }
            out.push_str("choice> ");
        }
        QuestionType::Written => out.push_str("answer> "),
    }
    out
}

/// Feedback line shown right after an answer, if the session reveals it now.
pub fn render_feedback(session: &AssessmentSession, index: usize) -> Option<String> {
    let correct = session.visible_feedback(index)?;
    if correct {
        return Some("correct".to_owned());
    }
    let expected = session.bank_item(index).map_or("", |item| item.answer());
    Some(format!("wrong, expected: {expected}"))
}

pub fn render_outcome(session: &AssessmentSession, outcome: &SessionOutcome) -> String {
    let mut out = format!("\nScore: {}/{}\n", outcome.score, outcome.total);
    for (index, question) in session.questions().iter().enumerate() {
        let Some(item) = session.bank_item(index) else {
            continue;
        };
        let mark = match session.question_correct(index) {
            Some(true) => "ok",
            _ => "x ",
        };
        let _ = writeln!(
            out,
            "  [{mark}] {} -> {} ({})",
            item.prompt(),
            item.answer(),
            question.question_type()
        );
    }
    out.push_str("Type :restart to try again or :quit to leave.\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use assess_core::model::BankItemId;

    fn mc_question() -> GeneratedQuestion {
        GeneratedQuestion::multiple_choice(
            0,
            BankItemId::new("a"),
            vec!["4".into(), "6".into(), "8".into()],
        )
    }

    #[test]
    fn parses_commands_and_answers() {
        assert_eq!(Input::parse(":finish\n"), Input::Finish);
        assert_eq!(Input::parse(" :q "), Input::Quit);
        assert_eq!(Input::parse(":nope"), Input::Unknown(":nope".into()));
        assert_eq!(Input::parse(" Paris \n"), Input::Answer(" Paris ".into()));
    }

    #[test]
    fn numbers_and_option_text_pick_choices() {
        let question = mc_question();
        assert_eq!(to_answer(&question, "2"), Some(Answer::Choice("6".into())));
        assert_eq!(to_answer(&question, " 3 "), Some(Answer::Choice("8".into())));
        assert_eq!(to_answer(&question, "4"), Some(Answer::Choice("4".into())));
    }

    #[test]
    fn input_naming_no_option_is_rejected() {
        let question = mc_question();
        assert_eq!(to_answer(&question, "0"), None);
        assert_eq!(to_answer(&question, "7"), None);
        assert_eq!(to_answer(&question, "four"), None);
        assert_eq!(to_answer(&question, ""), None);
    }

    #[test]
    fn written_answers_keep_raw_text() {
        let question = GeneratedQuestion::written(0, BankItemId::new("a"));
        assert_eq!(
            to_answer(&question, " Paris "),
            Some(Answer::Written(" Paris ".into()))
        );
    }
}
