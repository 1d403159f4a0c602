//! Shared error types for the services crate.

use std::fmt;

use exam_core::model::{LedgerError, OptionLabel, SessionPhase};
use gateway::GatewayError;
use serde::Serialize;
use thiserror::Error;

/// Errors returned by session operations.
///
/// Every variant is a precondition failure: the session is left exactly as it was.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("session already started")]
    AlreadyStarted,
    #[error("select an answer before continuing (question {index})")]
    UnansweredQuestion { index: usize },
    #[error("option {label} is not valid for question {index}")]
    InvalidOption { index: usize, label: OptionLabel },
    #[error("question {index} is outside the exam ({count} questions)")]
    QuestionOutOfRange { index: usize, count: usize },
    #[error("already at the first question")]
    AtFirstQuestion,
    #[error("already at the last question")]
    AtLastQuestion,
    #[error("session is busy submitting")]
    SessionBusy,
    #[error("a submission is already in progress")]
    SubmissionInProgress,
    #[error("operation not allowed while session is {0}")]
    InvalidPhase(SessionPhase),
    #[error("session has been closed")]
    Closed,
}

impl From<LedgerError> for SessionError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidOption { index, label } => Self::InvalidOption { index, label },
            LedgerError::QuestionOutOfRange { index, count } => {
                Self::QuestionOutOfRange { index, count }
            }
        }
    }
}

/// Errors emitted while opening an exam attempt.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoaderError {
    #[error("student name cannot be empty")]
    EmptyStudentName,
    #[error("exam code cannot be empty")]
    EmptyExamCode,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Whether a failed submission is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    /// The grading service could not be reached; retrying may help.
    Unavailable,
    /// The grading service refused the submission.
    Rejected,
}

/// Last submission failure, kept on the session for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl SubmissionFailure {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind == FailureKind::Unavailable
    }

    /// Message suitable for showing to the student.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self.kind {
            FailureKind::Unavailable => {
                format!("Service unavailable, please retry ({})", self.message)
            }
            FailureKind::Rejected => format!("Submission rejected: {}", self.message),
        }
    }
}

impl From<&GatewayError> for SubmissionFailure {
    fn from(err: &GatewayError) -> Self {
        let kind = if err.is_retryable() {
            FailureKind::Unavailable
        } else {
            FailureKind::Rejected
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

impl fmt::Display for SubmissionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_errors_map_to_failure_kinds() {
        let down = SubmissionFailure::from(&GatewayError::Unreachable("timeout".into()));
        assert!(down.is_retryable());
        assert!(down.user_message().starts_with("Service unavailable"));

        let refused = SubmissionFailure::from(&GatewayError::Rejected("unknown exam".into()));
        assert_eq!(refused.kind, FailureKind::Rejected);
        assert!(refused.user_message().starts_with("Submission rejected"));

        let garbled = SubmissionFailure::from(&GatewayError::InvalidResponse("eof".into()));
        assert!(!garbled.is_retryable());
    }

    #[test]
    fn ledger_errors_keep_their_detail() {
        let err: SessionError = LedgerError::InvalidOption {
            index: 2,
            label: "E".into(),
        }
        .into();
        assert_eq!(
            err,
            SessionError::InvalidOption {
                index: 2,
                label: "E".into()
            }
        );
    }
}
