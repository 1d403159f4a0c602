use std::sync::Arc;

use exam_core::model::{Exam, OptionLabel, SessionPhase, SubmissionResult};
use gateway::{GatewayError, GradingGateway};
use tokio::sync::{mpsc, oneshot, watch};

use super::progress::SessionSnapshot;
use super::service::{ExamSession, TickOutcome};
use crate::WallClock;
use crate::countdown::Countdown;
use crate::error::{SessionError, SubmissionFailure};

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

enum Command {
    Start { exam: Exam, reply: Reply<()> },
    Select { label: OptionLabel, reply: Reply<()> },
    Next { reply: Reply<usize> },
    Previous { reply: Reply<usize> },
    Submit { reply: Reply<()> },
    Reset { reply: Reply<()> },
    Leave { reply: oneshot::Sender<()> },
}

/// Events raised by the countdown and the grading task, tagged with the clock
/// run they belong to so stale ones can be dropped.
enum Internal {
    Tick { run: u64, remaining: u32 },
    Expired { run: u64 },
    Graded(Result<SubmissionResult, GatewayError>),
}

/// Owns one `ExamSession` and applies every event to it in order.
///
/// Commands, countdown ticks and grading outcomes all arrive as messages, so
/// nothing mutates the session concurrently.
struct SessionDriver {
    session: ExamSession,
    countdown: Countdown,
    clock_run: u64,
    clock: WallClock,
    grading: Arc<dyn GradingGateway>,
    commands: mpsc::UnboundedReceiver<Command>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
    state: watch::Sender<SessionSnapshot>,
}

impl SessionDriver {
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Leave { reply }) => {
                        self.shutdown();
                        let _ = reply.send(());
                        return;
                    }
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(event) = self.internal_rx.recv() => {
                    let expired = self.handle_internal(event);
                    self.publish();
                    if expired {
                        // Subscribers get a turn to see Expired before grading starts.
                        tokio::task::yield_now().await;
                        self.submit_on_expiry();
                        self.publish();
                    }
                }
            }
        }
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let clock_running = self.countdown.is_running();
        self.countdown.cancel();
        self.clock_run += 1;
        tracing::info!(
            student = self.session.student_name(),
            phase = %self.session.phase(),
            clock_running,
            "exam session closed"
        );
    }

    fn publish(&self) {
        self.state.send_replace(self.session.snapshot());
    }

    /// Publish the new state before answering, so a caller that awaits the
    /// reply and then reads the snapshot sees its own effect.
    fn answer<T>(&self, reply: Reply<T>, result: Result<T, SessionError>) {
        self.publish();
        let _ = reply.send(result);
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start { exam, reply } => {
                let code = exam.code().clone();
                let result = self
                    .session
                    .start(exam, self.clock.now())
                    .map(|budget| {
                        tracing::info!(exam_code = %code, seconds = budget, "exam started");
                        self.start_clock(budget);
                    });
                self.answer(reply, result);
            }
            Command::Select { label, reply } => {
                let result = self.session.select(label);
                self.answer(reply, result);
            }
            Command::Next { reply } => {
                let result = self.session.next();
                if let Err(err) = &result {
                    tracing::debug!(%err, "next rejected");
                }
                self.answer(reply, result);
            }
            Command::Previous { reply } => {
                let result = self.session.previous();
                self.answer(reply, result);
            }
            Command::Submit { reply } => {
                let result = self.dispatch_submission();
                self.answer(reply, result);
            }
            Command::Reset { reply } => {
                let result = self.session.reset().map(|()| {
                    self.countdown.cancel();
                    self.clock_run += 1;
                });
                self.answer(reply, result);
            }
            Command::Leave { .. } => {}
        }
    }

    /// Applies one internal event. Returns true when a tick just expired the
    /// session, leaving the automatic submission to the caller.
    fn handle_internal(&mut self, event: Internal) -> bool {
        match event {
            Internal::Tick { run, remaining } if run == self.clock_run => {
                if self.session.tick(remaining) == TickOutcome::Expired {
                    tracing::info!("time expired");
                    return true;
                }
            }
            Internal::Expired { run } if run == self.clock_run => {
                // The zero tick has already been applied; this only confirms it.
                tracing::debug!("countdown finished");
            }
            Internal::Tick { .. } | Internal::Expired { .. } => {
                tracing::debug!("dropping event from a cancelled countdown");
            }
            Internal::Graded(Ok(result)) => {
                let overall = result.overall_percentage();
                match self.session.complete_submission(result, self.clock.now()) {
                    Ok(()) => tracing::info!(overall, "submission graded"),
                    Err(err) => tracing::warn!(%err, "graded result arrived out of phase"),
                }
            }
            Internal::Graded(Err(err)) => {
                tracing::warn!(%err, retryable = err.is_retryable(), "submission failed");
                match self.session.fail_submission(SubmissionFailure::from(&err)) {
                    Ok(SessionPhase::InProgress) => {
                        self.start_clock(self.session.remaining_seconds());
                    }
                    Ok(_) => {}
                    Err(err) => tracing::warn!(%err, "submission failure arrived out of phase"),
                }
            }
        }
        false
    }

    fn submit_on_expiry(&mut self) {
        tracing::info!("submitting automatically");
        if let Err(err) = self.dispatch_submission() {
            tracing::warn!(%err, "automatic submission could not start");
        }
    }

    fn start_clock(&mut self, seconds: u32) {
        self.clock_run += 1;
        let run = self.clock_run;
        let tick_tx = self.internal_tx.clone();
        let expire_tx = self.internal_tx.clone();
        self.countdown.start(
            seconds,
            move |remaining| {
                let _ = tick_tx.send(Internal::Tick { run, remaining });
            },
            move || {
                let _ = expire_tx.send(Internal::Expired { run });
            },
        );
    }

    fn dispatch_submission(&mut self) -> Result<(), SessionError> {
        let request = self.session.begin_submission()?;
        self.countdown.cancel();
        self.clock_run += 1;

        tracing::info!(
            exam_code = %request.exam_code,
            answered = request.answers.len(),
            "submitting exam"
        );
        let grading = Arc::clone(&self.grading);
        let tx = self.internal_tx.clone();
        tokio::spawn(async move {
            let outcome = grading.submit(&request).await;
            let _ = tx.send(Internal::Graded(outcome));
        });
        Ok(())
    }
}

/// Cloneable handle to a running exam session.
///
/// Every call is forwarded to the session task and answered in order. Dropping
/// every handle, or calling [`SessionHandle::leave`], stops the session and
/// its countdown.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Spawn a session task for `student_name` that grades through `grading`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn spawn(
        student_name: impl Into<String>,
        grading: Arc<dyn GradingGateway>,
        clock: WallClock,
    ) -> Self {
        let session = ExamSession::new(student_name);
        let (state, state_rx) = watch::channel(session.snapshot());
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();

        let driver = SessionDriver {
            session,
            countdown: Countdown::new(),
            clock_run: 0,
            clock,
            grading,
            commands,
            internal_tx,
            internal_rx,
            state,
        };
        tokio::spawn(driver.run());

        Self {
            commands: commands_tx,
            state: state_rx,
        }
    }

    async fn call<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| SessionError::Closed)?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// # Errors
    ///
    /// Returns `SessionError::AlreadyStarted` if an attempt is already running.
    pub async fn start(&self, exam: Exam) -> Result<(), SessionError> {
        self.call(|reply| Command::Start { exam, reply }).await
    }

    /// # Errors
    ///
    /// See [`ExamSession::select`].
    pub async fn select(&self, label: impl Into<OptionLabel>) -> Result<(), SessionError> {
        let label = label.into();
        self.call(|reply| Command::Select { label, reply }).await
    }

    /// Returns the new question index.
    ///
    /// # Errors
    ///
    /// See [`ExamSession::next`].
    pub async fn next(&self) -> Result<usize, SessionError> {
        self.call(|reply| Command::Next { reply }).await
    }

    /// Returns the new question index.
    ///
    /// # Errors
    ///
    /// See [`ExamSession::previous`].
    pub async fn previous(&self) -> Result<usize, SessionError> {
        self.call(|reply| Command::Previous { reply }).await
    }

    /// Hand the answers to the grader. Returns once the submission is under
    /// way; watch the snapshot (or [`SessionHandle::wait_until_settled`]) for
    /// the outcome.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::SubmissionInProgress` while a submission is
    /// outstanding. See [`ExamSession::begin_submission`].
    pub async fn submit(&self) -> Result<(), SessionError> {
        self.call(|reply| Command::Submit { reply }).await
    }

    /// # Errors
    ///
    /// Returns `SessionError::SessionBusy` while submitting.
    pub async fn reset(&self) -> Result<(), SessionError> {
        self.call(|reply| Command::Reset { reply }).await
    }

    /// Stop the session and its countdown. Later calls fail with `Closed`.
    pub async fn leave(&self) {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Leave { reply }).is_ok() {
            let _ = rx.await;
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver that is notified whenever the session state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.clone()
    }

    /// Wait until `predicate` holds for the published state.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Closed` if the session stops first.
    pub async fn wait_for(
        &self,
        predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Result<SessionSnapshot, SessionError> {
        let mut rx = self.state.clone();
        let snapshot = rx
            .wait_for(predicate)
            .await
            .map_err(|_| SessionError::Closed)?;
        Ok(snapshot.clone())
    }

    /// Wait until no submission is outstanding.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Closed` if the session stops first.
    pub async fn wait_until_settled(&self) -> Result<SessionSnapshot, SessionError> {
        self.wait_for(|s| s.phase != SessionPhase::Submitting).await
    }
}
