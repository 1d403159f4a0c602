use exam_core::model::{SessionPhase, SubmissionResult};

use super::view::QuestionView;
use crate::error::SubmissionFailure;

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub unanswered: usize,
    pub current_index: usize,
}

/// Published copy of the session state, refreshed after every event.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub progress: SessionProgress,
    pub remaining_seconds: u32,
    pub question: Option<QuestionView>,
    pub last_failure: Option<SubmissionFailure>,
    pub result: Option<SubmissionResult>,
}

impl SessionSnapshot {
    /// True when finishing now would submit no answers at all, so the caller
    /// should ask the student to confirm first.
    #[must_use]
    pub fn needs_empty_confirmation(&self) -> bool {
        self.phase.accepts_submission() && self.progress.answered == 0
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.phase.is_terminal()
    }

    /// True once the countdown has run out, whatever phase the automatic
    /// submission has since moved the session to.
    #[must_use]
    pub fn timed_out(&self) -> bool {
        self.phase != SessionPhase::NotStarted && self.remaining_seconds == 0
    }
}
