use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::ResultId;

/// Minimum percentage for a topic (or the whole exam) to count as passed.
pub const PASS_THRESHOLD_PERCENT: f64 = 60.0;

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ResultError {
    #[error("percentage {value} is outside 0..=100")]
    PercentageOutOfRange { value: f64 },

    #[error("correct answers ({correct}) exceed total questions ({total})")]
    CorrectExceedsTotal { correct: u32, total: u32 },

    #[error("topic name cannot be empty")]
    EmptyTopic,
}

fn check_percentage(value: f64) -> Result<f64, ResultError> {
    if (0.0..=100.0).contains(&value) {
        Ok(value)
    } else {
        Err(ResultError::PercentageOutOfRange { value })
    }
}

fn check_counts(correct: u32, total: u32) -> Result<(), ResultError> {
    if correct > total {
        return Err(ResultError::CorrectExceedsTotal { correct, total });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TopicStatus {
    Passed,
    Failed,
}

impl TopicStatus {
    #[must_use]
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= PASS_THRESHOLD_PERCENT {
            Self::Passed
        } else {
            Self::Failed
        }
    }
}

impl fmt::Display for TopicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopicStatus::Passed => f.write_str("Passed"),
            TopicStatus::Failed => f.write_str("Failed"),
        }
    }
}

/// Per-topic breakdown reported by the grader.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicScore {
    correct: u32,
    total: u32,
    percentage: f64,
    status: TopicStatus,
}

impl TopicScore {
    /// # Errors
    ///
    /// Returns `ResultError` if the percentage is outside `0..=100` or
    /// `correct` exceeds `total`.
    pub fn new(
        correct: u32,
        total: u32,
        percentage: f64,
        status: TopicStatus,
    ) -> Result<Self, ResultError> {
        check_counts(correct, total)?;
        let percentage = check_percentage(percentage)?;
        Ok(Self {
            correct,
            total,
            percentage,
            status,
        })
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    #[must_use]
    pub fn percentage(&self) -> f64 {
        self.percentage
    }

    #[must_use]
    pub fn status(&self) -> TopicStatus {
        self.status
    }
}

/// Graded outcome of one submission. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionResult {
    result_id: Option<ResultId>,
    overall_percentage: f64,
    correct_answers: u32,
    total_questions: u32,
    topic_scores: BTreeMap<String, TopicScore>,
}

impl SubmissionResult {
    /// # Errors
    ///
    /// Returns `ResultError` if the overall percentage is outside `0..=100`,
    /// `correct_answers` exceeds `total_questions`, or a topic name is blank.
    pub fn new(
        overall_percentage: f64,
        correct_answers: u32,
        total_questions: u32,
        topic_scores: BTreeMap<String, TopicScore>,
    ) -> Result<Self, ResultError> {
        let overall_percentage = check_percentage(overall_percentage)?;
        check_counts(correct_answers, total_questions)?;
        if topic_scores.keys().any(|name| name.trim().is_empty()) {
            return Err(ResultError::EmptyTopic);
        }

        Ok(Self {
            result_id: None,
            overall_percentage,
            correct_answers,
            total_questions,
            topic_scores,
        })
    }

    #[must_use]
    pub fn with_result_id(mut self, id: ResultId) -> Self {
        self.result_id = Some(id);
        self
    }

    #[must_use]
    pub fn result_id(&self) -> Option<ResultId> {
        self.result_id
    }

    #[must_use]
    pub fn overall_percentage(&self) -> f64 {
        self.overall_percentage
    }

    #[must_use]
    pub fn correct_answers(&self) -> u32 {
        self.correct_answers
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.total_questions
    }

    #[must_use]
    pub fn topic_scores(&self) -> &BTreeMap<String, TopicScore> {
        &self.topic_scores
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.overall_percentage >= PASS_THRESHOLD_PERCENT
    }
}
