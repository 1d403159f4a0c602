use std::fmt;

use serde::Serialize;

/// Lifecycle of one exam attempt.
///
/// `NotStarted → InProgress → Submitting → Completed`, with
/// `InProgress → Expired → Submitting` as the timeout path. A failed submission
/// drops `Submitting` back to `InProgress` (time left) or `Expired` (time out).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum SessionPhase {
    #[default]
    NotStarted,
    InProgress,
    Submitting,
    Completed,
    Expired,
}

impl SessionPhase {
    /// Whether answers can be selected and questions navigated.
    #[must_use]
    pub fn is_navigable(self) -> bool {
        matches!(self, SessionPhase::InProgress)
    }

    /// Whether `submit` is accepted in this phase.
    #[must_use]
    pub fn accepts_submission(self) -> bool {
        matches!(self, SessionPhase::InProgress | SessionPhase::Expired)
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionPhase::Completed)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::NotStarted => "not started",
            SessionPhase::InProgress => "in progress",
            SessionPhase::Submitting => "submitting",
            SessionPhase::Completed => "completed",
            SessionPhase::Expired => "expired",
        };
        f.write_str(name)
    }
}
