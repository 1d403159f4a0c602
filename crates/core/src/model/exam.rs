use std::collections::HashSet;

use thiserror::Error;

use crate::model::ids::{ExamCode, OptionLabel};

/// Topic used for questions that do not name one.
pub const DEFAULT_TOPIC: &str = "General";

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question text cannot be empty")]
    EmptyText,

    #[error("question must offer at least one option")]
    NoOptions,

    #[error("option label cannot be empty")]
    EmptyOptionLabel,

    #[error("option label {label} appears more than once")]
    DuplicateOptionLabel { label: OptionLabel },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExamError {
    #[error("exam must contain at least one question")]
    NoQuestions,

    #[error("time limit must be > 0 minutes")]
    InvalidTimeLimit,

    #[error("question {index} is invalid: {source}")]
    InvalidQuestion {
        index: usize,
        #[source]
        source: QuestionError,
    },
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A single multiple-choice question.
///
/// Options keep the order they were supplied in; labels are unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    text: String,
    options: Vec<(OptionLabel, String)>,
    topic: Option<String>,
}

impl Question {
    /// Builds a question from its text and `(label, option text)` pairs.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the text is blank, no options are given,
    /// or a label is empty or repeated.
    pub fn new<L, T>(
        text: impl Into<String>,
        options: impl IntoIterator<Item = (L, T)>,
    ) -> Result<Self, QuestionError>
    where
        L: Into<OptionLabel>,
        T: Into<String>,
    {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }

        let mut seen = HashSet::new();
        let mut collected = Vec::new();
        for (label, option_text) in options {
            let label = label.into();
            if label.is_empty() {
                return Err(QuestionError::EmptyOptionLabel);
            }
            if !seen.insert(label.clone()) {
                return Err(QuestionError::DuplicateOptionLabel { label });
            }
            collected.push((label, option_text.into()));
        }

        if collected.is_empty() {
            return Err(QuestionError::NoOptions);
        }

        Ok(Self {
            text,
            options: collected,
            topic: None,
        })
    }

    /// Attaches a topic; blank topics are treated as absent.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        let topic = topic.into();
        self.topic = if topic.trim().is_empty() {
            None
        } else {
            Some(topic.trim().to_owned())
        };
        self
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Options in presentation order.
    pub fn options(&self) -> impl Iterator<Item = (&OptionLabel, &str)> {
        self.options
            .iter()
            .map(|(label, text)| (label, text.as_str()))
    }

    #[must_use]
    pub fn has_option(&self, label: &OptionLabel) -> bool {
        self.options.iter().any(|(l, _)| l == label)
    }

    /// Topic name, falling back to [`DEFAULT_TOPIC`].
    #[must_use]
    pub fn topic(&self) -> &str {
        self.topic.as_deref().unwrap_or(DEFAULT_TOPIC)
    }
}

//
// ─── EXAM ──────────────────────────────────────────────────────────────────────
//

/// An exam definition as loaded for one attempt. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exam {
    code: ExamCode,
    questions: Vec<Question>,
    time_limit_minutes: u32,
}

impl Exam {
    /// # Errors
    ///
    /// Returns `ExamError::NoQuestions` for an empty question list and
    /// `ExamError::InvalidTimeLimit` for a zero time limit.
    pub fn new(
        code: ExamCode,
        questions: Vec<Question>,
        time_limit_minutes: u32,
    ) -> Result<Self, ExamError> {
        if questions.is_empty() {
            return Err(ExamError::NoQuestions);
        }
        if time_limit_minutes == 0 {
            return Err(ExamError::InvalidTimeLimit);
        }

        Ok(Self {
            code,
            questions,
            time_limit_minutes,
        })
    }

    #[must_use]
    pub fn code(&self) -> &ExamCode {
        &self.code
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// Index of the final question.
    #[must_use]
    pub fn last_index(&self) -> usize {
        self.questions.len().saturating_sub(1)
    }

    #[must_use]
    pub fn time_limit_minutes(&self) -> u32 {
        self.time_limit_minutes
    }

    #[must_use]
    pub fn time_limit_seconds(&self) -> u32 {
        self.time_limit_minutes.saturating_mul(60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abcd(text: &str) -> Question {
        Question::new(text, [("A", "one"), ("B", "two"), ("C", "three"), ("D", "four")]).unwrap()
    }

    #[test]
    fn question_keeps_option_order_and_default_topic() {
        let q = Question::new("Pick", [("B", "bee"), ("A", "ay")]).unwrap();
        let labels: Vec<_> = q.options().map(|(l, _)| l.as_str().to_owned()).collect();
        assert_eq!(labels, ["B", "A"]);
        assert_eq!(q.topic(), DEFAULT_TOPIC);
        assert_eq!(q.with_topic("  Algebra ").topic(), "Algebra");
    }

    #[test]
    fn question_rejects_duplicate_and_empty_labels() {
        let err = Question::new("Pick", [("A", "x"), ("A", "y")]).unwrap_err();
        assert_eq!(
            err,
            QuestionError::DuplicateOptionLabel {
                label: OptionLabel::from("A")
            }
        );
        assert_eq!(
            Question::new("Pick", [(" ", "x")]).unwrap_err(),
            QuestionError::EmptyOptionLabel
        );
        assert_eq!(
            Question::new("Pick", Vec::<(&str, &str)>::new()).unwrap_err(),
            QuestionError::NoOptions
        );
        assert_eq!(
            Question::new("  ", [("A", "x")]).unwrap_err(),
            QuestionError::EmptyText
        );
    }

    #[test]
    fn exam_validates_questions_and_time_limit() {
        let code = ExamCode::new("EX1").unwrap();
        assert_eq!(
            Exam::new(code.clone(), Vec::new(), 10).unwrap_err(),
            ExamError::NoQuestions
        );
        assert_eq!(
            Exam::new(code.clone(), vec![abcd("Q1")], 0).unwrap_err(),
            ExamError::InvalidTimeLimit
        );

        let exam = Exam::new(code, vec![abcd("Q1"), abcd("Q2"), abcd("Q3")], 2).unwrap();
        assert_eq!(exam.question_count(), 3);
        assert_eq!(exam.last_index(), 2);
        assert_eq!(exam.time_limit_seconds(), 120);
        assert!(exam.question(3).is_none());
    }
}
