use chrono::{DateTime, Utc};
use std::fmt;

use exam_core::model::{
    AnswerLedger, Exam, OptionLabel, Question, SessionPhase, SubmissionResult,
};
use gateway::SubmissionRequest;

use super::progress::{SessionProgress, SessionSnapshot};
use super::view::QuestionView;
use crate::error::{SessionError, SubmissionFailure};

//
// ─── ATTEMPT ───────────────────────────────────────────────────────────────────
//

/// State that only exists once an exam has been started.
#[derive(Debug, Clone)]
struct Attempt {
    exam: Exam,
    current: usize,
    ledger: AnswerLedger,
    remaining_seconds: u32,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

/// What a clock tick did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Remaining time updated; the attempt continues.
    Continue,
    /// Time ran out: the session moved to `Expired` and must be submitted.
    Expired,
    /// The session was not in progress, so the tick changed nothing.
    Ignored,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// State machine for one student's attempt at one exam.
///
/// Pure and synchronous: it owns no timer and performs no I/O. The session
/// driver feeds it ticks and gateway outcomes, one event at a time. Every
/// operation that returns an error leaves the session unchanged.
pub struct ExamSession {
    student_name: String,
    phase: SessionPhase,
    attempt: Option<Attempt>,
    last_failure: Option<SubmissionFailure>,
    result: Option<SubmissionResult>,
}

impl ExamSession {
    #[must_use]
    pub fn new(student_name: impl Into<String>) -> Self {
        Self {
            student_name: student_name.into(),
            phase: SessionPhase::NotStarted,
            attempt: None,
            last_failure: None,
            result: None,
        }
    }

    /// Begin the attempt and return the time budget in seconds.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyStarted` unless the session is `NotStarted`.
    pub fn start(&mut self, exam: Exam, started_at: DateTime<Utc>) -> Result<u32, SessionError> {
        if self.phase != SessionPhase::NotStarted {
            return Err(SessionError::AlreadyStarted);
        }

        let remaining_seconds = exam.time_limit_seconds();
        self.attempt = Some(Attempt {
            exam,
            current: 0,
            ledger: AnswerLedger::new(),
            remaining_seconds,
            started_at,
            finished_at: None,
        });
        self.phase = SessionPhase::InProgress;
        Ok(remaining_seconds)
    }

    fn navigable(&mut self) -> Result<&mut Attempt, SessionError> {
        if !self.phase.is_navigable() {
            return Err(match self.phase {
                SessionPhase::Submitting => SessionError::SessionBusy,
                other => SessionError::InvalidPhase(other),
            });
        }
        self.attempt
            .as_mut()
            .ok_or(SessionError::InvalidPhase(self.phase))
    }

    /// Record `label` for the current question, replacing any earlier choice.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::SessionBusy` while submitting, `InvalidPhase`
    /// outside `InProgress`, and `InvalidOption` for labels the question lacks.
    pub fn select(&mut self, label: OptionLabel) -> Result<(), SessionError> {
        let attempt = self.navigable()?;
        let index = attempt.current;
        attempt.ledger.set(&attempt.exam, index, label)?;
        Ok(())
    }

    /// Move to the next question. The current one must be answered first.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnansweredQuestion` if the current question has no
    /// answer and `SessionError::AtLastQuestion` on the final question.
    pub fn next(&mut self) -> Result<usize, SessionError> {
        let attempt = self.navigable()?;
        if !attempt.ledger.is_answered(attempt.current) {
            return Err(SessionError::UnansweredQuestion {
                index: attempt.current,
            });
        }
        if attempt.current >= attempt.exam.last_index() {
            return Err(SessionError::AtLastQuestion);
        }
        attempt.current += 1;
        Ok(attempt.current)
    }

    /// Move back one question. Never requires an answer and never clears one.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AtFirstQuestion` on the first question.
    pub fn previous(&mut self) -> Result<usize, SessionError> {
        let attempt = self.navigable()?;
        if attempt.current == 0 {
            return Err(SessionError::AtFirstQuestion);
        }
        attempt.current -= 1;
        Ok(attempt.current)
    }

    /// Apply a clock tick carrying the seconds left.
    pub fn tick(&mut self, remaining_seconds: u32) -> TickOutcome {
        if self.phase != SessionPhase::InProgress {
            return TickOutcome::Ignored;
        }
        let Some(attempt) = self.attempt.as_mut() else {
            return TickOutcome::Ignored;
        };

        attempt.remaining_seconds = remaining_seconds.min(attempt.remaining_seconds);
        if attempt.remaining_seconds == 0 {
            self.phase = SessionPhase::Expired;
            return TickOutcome::Expired;
        }
        TickOutcome::Continue
    }

    /// Enter `Submitting` and snapshot the answers for the grader.
    ///
    /// A submission with no answers is allowed; asking for confirmation is up
    /// to the caller.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::SubmissionInProgress` while already submitting and
    /// `SessionError::InvalidPhase` unless `InProgress` or `Expired`.
    pub fn begin_submission(&mut self) -> Result<SubmissionRequest, SessionError> {
        match self.phase {
            SessionPhase::InProgress | SessionPhase::Expired => {}
            SessionPhase::Submitting => return Err(SessionError::SubmissionInProgress),
            other => return Err(SessionError::InvalidPhase(other)),
        }
        let attempt = self
            .attempt
            .as_ref()
            .ok_or(SessionError::InvalidPhase(self.phase))?;

        let request = SubmissionRequest {
            student_name: self.student_name.clone(),
            exam_code: attempt.exam.code().clone(),
            answers: attempt.ledger.to_submission(),
        };
        self.last_failure = None;
        self.phase = SessionPhase::Submitting;
        Ok(request)
    }

    /// Store the graded result and finish the attempt.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidPhase` unless `Submitting`.
    pub fn complete_submission(
        &mut self,
        result: SubmissionResult,
        finished_at: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Submitting {
            return Err(SessionError::InvalidPhase(self.phase));
        }
        if let Some(attempt) = self.attempt.as_mut() {
            attempt.finished_at = Some(finished_at);
        }
        self.result = Some(result);
        self.phase = SessionPhase::Completed;
        Ok(())
    }

    /// Record a failed submission and fall back to `InProgress` when time
    /// remains, or `Expired` when it does not. Returns the resulting phase.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidPhase` unless `Submitting`.
    pub fn fail_submission(
        &mut self,
        failure: SubmissionFailure,
    ) -> Result<SessionPhase, SessionError> {
        if self.phase != SessionPhase::Submitting {
            return Err(SessionError::InvalidPhase(self.phase));
        }
        self.phase = if self.remaining_seconds() > 0 {
            SessionPhase::InProgress
        } else {
            SessionPhase::Expired
        };
        self.last_failure = Some(failure);
        Ok(self.phase)
    }

    /// Discard the attempt and return to `NotStarted`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::SessionBusy` while submitting.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        if self.phase == SessionPhase::Submitting {
            return Err(SessionError::SessionBusy);
        }
        self.phase = SessionPhase::NotStarted;
        self.attempt = None;
        self.last_failure = None;
        self.result = None;
        Ok(())
    }

    #[must_use]
    pub fn student_name(&self) -> &str {
        &self.student_name
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn exam(&self) -> Option<&Exam> {
        self.attempt.as_ref().map(|a| &a.exam)
    }

    #[must_use]
    pub fn ledger(&self) -> Option<&AnswerLedger> {
        self.attempt.as_ref().map(|a| &a.ledger)
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.attempt.as_ref().map_or(0, |a| a.current)
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.attempt
            .as_ref()
            .and_then(|a| a.exam.question(a.current))
    }

    #[must_use]
    pub fn answer(&self, index: usize) -> Option<&OptionLabel> {
        self.attempt.as_ref().and_then(|a| a.ledger.get(index))
    }

    #[must_use]
    pub fn remaining_seconds(&self) -> u32 {
        self.attempt.as_ref().map_or(0, |a| a.remaining_seconds)
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.attempt.as_ref().map(|a| a.started_at)
    }

    #[must_use]
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.attempt.as_ref().and_then(|a| a.finished_at)
    }

    #[must_use]
    pub fn result(&self) -> Option<&SubmissionResult> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn last_failure(&self) -> Option<&SubmissionFailure> {
        self.last_failure.as_ref()
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let total = self.exam().map_or(0, Exam::question_count);
        let answered = self.ledger().map_or(0, AnswerLedger::count);
        SessionProgress {
            total,
            answered,
            unanswered: total.saturating_sub(answered),
            current_index: self.current_index(),
        }
    }

    /// Read-only copy of everything a presenter needs.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            progress: self.progress(),
            remaining_seconds: self.remaining_seconds(),
            question: self.attempt.as_ref().and_then(|a| {
                QuestionView::from_exam(&a.exam, a.current, &a.ledger)
            }),
            last_failure: self.last_failure.clone(),
            result: self.result.clone(),
        }
    }
}

impl fmt::Debug for ExamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExamSession")
            .field("phase", &self.phase)
            .field("exam_code", &self.exam().map(Exam::code))
            .field("current", &self.current_index())
            .field("answered", &self.ledger().map_or(0, AnswerLedger::count))
            .field("remaining_seconds", &self.remaining_seconds())
            .field("has_result", &self.result.is_some())
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{ExamCode, Question};
    use exam_core::time::fixed_now;
    use gateway::GatewayError;
    use std::collections::BTreeMap;

    fn build_exam(questions: usize, minutes: u32) -> Exam {
        let questions = (1..=questions)
            .map(|i| {
                Question::new(
                    format!("Question {i}"),
                    [("A", "alpha"), ("B", "beta"), ("C", "gamma"), ("D", "delta")],
                )
                .unwrap()
            })
            .collect();
        Exam::new(ExamCode::new("EXAM-1").unwrap(), questions, minutes).unwrap()
    }

    fn started(questions: usize) -> ExamSession {
        let mut session = ExamSession::new("Ada");
        session.start(build_exam(questions, 1), fixed_now()).unwrap();
        session
    }

    fn graded() -> SubmissionResult {
        SubmissionResult::new(100.0, 1, 1, BTreeMap::new()).unwrap()
    }

    #[test]
    fn start_initializes_attempt() {
        let mut session = ExamSession::new("Ada");
        assert_eq!(session.phase(), SessionPhase::NotStarted);

        let budget = session.start(build_exam(3, 1), fixed_now()).unwrap();
        assert_eq!(budget, 60);
        assert_eq!(session.phase(), SessionPhase::InProgress);
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.remaining_seconds(), 60);
        assert_eq!(session.progress().answered, 0);
        assert_eq!(session.started_at(), Some(fixed_now()));
    }

    #[test]
    fn starting_twice_fails() {
        let mut session = started(3);
        let err = session.start(build_exam(2, 5), fixed_now()).unwrap_err();
        assert_eq!(err, SessionError::AlreadyStarted);
        assert_eq!(session.exam().unwrap().question_count(), 3);
    }

    #[test]
    fn reselecting_keeps_only_last_label() {
        let mut session = started(3);
        for label in ["A", "C", "B", "D", "B"] {
            session.select(label.into()).unwrap();
        }
        assert_eq!(session.answer(0), Some(&OptionLabel::from("B")));
        assert_eq!(session.progress().answered, 1);
    }

    #[test]
    fn invalid_option_is_rejected_without_side_effects() {
        let mut session = started(3);
        session.select("A".into()).unwrap();
        let err = session.select("Z".into()).unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidOption {
                index: 0,
                label: "Z".into()
            }
        );
        assert_eq!(session.answer(0), Some(&OptionLabel::from("A")));
    }

    #[test]
    fn next_requires_an_answer_and_never_moves_on_failure() {
        let mut session = started(3);
        session.select("B".into()).unwrap();
        assert_eq!(session.next().unwrap(), 1);

        let err = session.next().unwrap_err();
        assert_eq!(err, SessionError::UnansweredQuestion { index: 1 });
        assert_eq!(session.current_index(), 1);
    }

    #[test]
    fn next_stops_at_last_question() {
        let mut session = started(2);
        session.select("A".into()).unwrap();
        session.next().unwrap();
        session.select("A".into()).unwrap();
        assert_eq!(session.next().unwrap_err(), SessionError::AtLastQuestion);
        assert_eq!(session.current_index(), 1);
    }

    #[test]
    fn previous_then_next_restores_position_and_answers() {
        let mut session = started(4);
        for label in ["A", "B", "C"] {
            session.select(label.into()).unwrap();
            session.next().unwrap();
        }
        assert_eq!(session.current_index(), 3);
        let before = session.ledger().unwrap().clone();

        for _ in 0..3 {
            session.previous().unwrap();
        }
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.previous().unwrap_err(), SessionError::AtFirstQuestion);
        for _ in 0..3 {
            session.next().unwrap();
        }

        assert_eq!(session.current_index(), 3);
        assert_eq!(session.ledger().unwrap(), &before);
    }

    #[test]
    fn previous_does_not_require_answer() {
        let mut session = started(3);
        session.select("A".into()).unwrap();
        session.next().unwrap();
        assert_eq!(session.previous().unwrap(), 0);
    }

    #[test]
    fn navigation_before_start_is_invalid_phase() {
        let mut session = ExamSession::new("Ada");
        assert_eq!(
            session.select("A".into()).unwrap_err(),
            SessionError::InvalidPhase(SessionPhase::NotStarted)
        );
        assert_eq!(
            session.next().unwrap_err(),
            SessionError::InvalidPhase(SessionPhase::NotStarted)
        );
        assert_eq!(
            session.begin_submission().unwrap_err(),
            SessionError::InvalidPhase(SessionPhase::NotStarted)
        );
    }

    #[test]
    fn tick_to_zero_expires_once() {
        let mut session = started(3);
        assert_eq!(session.tick(59), TickOutcome::Continue);
        assert_eq!(session.remaining_seconds(), 59);
        assert_eq!(session.tick(0), TickOutcome::Expired);
        assert_eq!(session.phase(), SessionPhase::Expired);
        assert_eq!(session.tick(0), TickOutcome::Ignored);

        assert_eq!(
            session.select("A".into()).unwrap_err(),
            SessionError::InvalidPhase(SessionPhase::Expired)
        );
        assert_eq!(
            session.previous().unwrap_err(),
            SessionError::InvalidPhase(SessionPhase::Expired)
        );
    }

    #[test]
    fn submitting_blocks_edits_and_second_submit() {
        let mut session = started(3);
        session.select("B".into()).unwrap();
        let request = session.begin_submission().unwrap();
        assert_eq!(request.student_name, "Ada");
        assert_eq!(request.exam_code.as_str(), "EXAM-1");
        assert_eq!(request.answers.get(0), Some(&OptionLabel::from("B")));
        assert_eq!(request.answers.len(), 1);

        assert_eq!(session.phase(), SessionPhase::Submitting);
        assert_eq!(session.select("A".into()).unwrap_err(), SessionError::SessionBusy);
        assert_eq!(session.next().unwrap_err(), SessionError::SessionBusy);
        assert_eq!(session.previous().unwrap_err(), SessionError::SessionBusy);
        assert_eq!(session.reset().unwrap_err(), SessionError::SessionBusy);
        assert_eq!(
            session.begin_submission().unwrap_err(),
            SessionError::SubmissionInProgress
        );
        assert_eq!(session.tick(30), TickOutcome::Ignored);
        assert_eq!(session.answer(0), Some(&OptionLabel::from("B")));
    }

    #[test]
    fn failed_submission_with_time_left_returns_to_in_progress() {
        let mut session = started(3);
        session.tick(45);
        session.begin_submission().unwrap();

        let failure = SubmissionFailure::from(&GatewayError::Unreachable("down".into()));
        let phase = session.fail_submission(failure).unwrap();
        assert_eq!(phase, SessionPhase::InProgress);
        assert_eq!(session.remaining_seconds(), 45);
        assert!(session.last_failure().unwrap().is_retryable());

        session.begin_submission().unwrap();
        assert!(session.last_failure().is_none());
        session.complete_submission(graded(), fixed_now()).unwrap();
        assert_eq!(session.phase(), SessionPhase::Completed);
        assert_eq!(session.finished_at(), Some(fixed_now()));
        assert!(session.result().is_some());
    }

    #[test]
    fn failed_submission_after_expiry_stays_expired() {
        let mut session = started(3);
        session.tick(0);
        session.begin_submission().unwrap();

        let failure = SubmissionFailure::from(&GatewayError::Rejected("unknown exam".into()));
        assert_eq!(session.fail_submission(failure).unwrap(), SessionPhase::Expired);
        assert_eq!(
            session.next().unwrap_err(),
            SessionError::InvalidPhase(SessionPhase::Expired)
        );
        assert!(session.begin_submission().is_ok());
    }

    #[test]
    fn completed_session_rejects_everything_but_reset() {
        let mut session = started(1);
        session.begin_submission().unwrap();
        session.complete_submission(graded(), fixed_now()).unwrap();

        assert_eq!(
            session.begin_submission().unwrap_err(),
            SessionError::InvalidPhase(SessionPhase::Completed)
        );
        assert_eq!(
            session.complete_submission(graded(), fixed_now()).unwrap_err(),
            SessionError::InvalidPhase(SessionPhase::Completed)
        );

        session.reset().unwrap();
        assert_eq!(session.phase(), SessionPhase::NotStarted);
        assert!(session.exam().is_none());
        assert!(session.result().is_none());
        session.start(build_exam(2, 1), fixed_now()).unwrap();
    }

    #[test]
    fn empty_submission_is_permitted() {
        let mut session = started(3);
        assert!(session.snapshot().needs_empty_confirmation());

        let request = session.begin_submission().unwrap();
        assert!(request.answers.is_empty());
        assert_eq!(session.phase(), SessionPhase::Submitting);
    }
}
