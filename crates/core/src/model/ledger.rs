use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::exam::Exam;
use crate::model::ids::OptionLabel;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("question {index} is outside the exam ({count} questions)")]
    QuestionOutOfRange { index: usize, count: usize },

    #[error("option {label} is not valid for question {index}")]
    InvalidOption { index: usize, label: OptionLabel },
}

/// Selected option per question index for one attempt.
///
/// Holds at most one label per index. Entries can be overwritten but are never
/// removed, and a failed `set` leaves the ledger untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerLedger {
    answers: BTreeMap<usize, OptionLabel>,
}

impl AnswerLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `label` as the answer to question `index`, returning the label it replaced.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::QuestionOutOfRange` if `index` is not a question of `exam`,
    /// or `LedgerError::InvalidOption` if the question has no option `label`.
    pub fn set(
        &mut self,
        exam: &Exam,
        index: usize,
        label: OptionLabel,
    ) -> Result<Option<OptionLabel>, LedgerError> {
        let question = exam
            .question(index)
            .ok_or(LedgerError::QuestionOutOfRange {
                index,
                count: exam.question_count(),
            })?;
        if !question.has_option(&label) {
            return Err(LedgerError::InvalidOption { index, label });
        }
        Ok(self.answers.insert(index, label))
    }

    /// Stored answer for `index`, or `None` when unanswered.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&OptionLabel> {
        self.answers.get(&index)
    }

    #[must_use]
    pub fn is_answered(&self, index: usize) -> bool {
        self.answers.contains_key(&index)
    }

    /// Number of answered questions.
    #[must_use]
    pub fn count(&self) -> usize {
        self.answers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// Index-ordered copy of every answer, independent of insertion order.
    #[must_use]
    pub fn to_submission(&self) -> AnswerSheet {
        AnswerSheet(self.answers.clone())
    }
}

/// Snapshot of answered questions ready to cross the grading boundary.
///
/// Serializes as a JSON object keyed by the question index (`{"0": "B"}`);
/// unanswered questions are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerSheet(BTreeMap<usize, OptionLabel>);

impl AnswerSheet {
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&OptionLabel> {
        self.0.get(&index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &OptionLabel)> {
        self.0.iter().map(|(index, label)| (*index, label))
    }
}

impl FromIterator<(usize, OptionLabel)> for AnswerSheet {
    fn from_iter<I: IntoIterator<Item = (usize, OptionLabel)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
