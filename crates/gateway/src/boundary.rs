use async_trait::async_trait;
use exam_core::model::{AnswerSheet, Exam, ExamCode, SubmissionResult};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::config::GatewayConfig;
use crate::http::HttpGateway;

/// Failures reported across the loading and grading boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("exam {0} not found")]
    ExamNotFound(ExamCode),

    #[error("grading service unreachable: {0}")]
    Unreachable(String),

    #[error("submission rejected: {0}")]
    Rejected(String),

    #[error("invalid response from grading service: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// Whether repeating the same request may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Unreachable(_))
    }
}

/// Answers handed to the grader for one attempt.
///
/// This is also the wire body of the submit call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionRequest {
    pub student_name: String,
    pub exam_code: ExamCode,
    pub answers: AnswerSheet,
}

/// Loads exam definitions by code.
#[async_trait]
pub trait ExamSource: Send + Sync {
    /// Fetch the exam published under `code`.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::ExamNotFound` for unknown codes, or another
    /// `GatewayError` if the boundary fails.
    async fn load_exam(&self, code: &ExamCode) -> Result<Exam, GatewayError>;
}

/// Grades a submitted answer sheet.
#[async_trait]
pub trait GradingGateway: Send + Sync {
    /// Send the answers for grading and return the graded result.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Unreachable` when the service cannot be reached and
    /// `GatewayError::Rejected` when it refuses the submission.
    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionResult, GatewayError>;

    /// Check whether the grading service is up.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Unreachable` if the service reports itself unhealthy.
    async fn health(&self) -> Result<(), GatewayError> {
        Ok(())
    }
}

#[derive(Default)]
struct InMemoryState {
    exams: HashMap<ExamCode, Exam>,
    scripted: VecDeque<Result<SubmissionResult, GatewayError>>,
    fallback: Option<SubmissionResult>,
    submissions: Vec<SubmissionRequest>,
    healthy: bool,
}

/// In-process loader and grader for tests and offline runs.
///
/// Submissions are answered from a script of queued outcomes, then from the
/// fallback result. Nothing is graded here; every request is recorded.
#[derive(Clone)]
pub struct InMemoryGateway {
    state: Arc<Mutex<InMemoryState>>,
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGateway {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(InMemoryState {
                healthy: true,
                ..InMemoryState::default()
            })),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, InMemoryState>, GatewayError> {
        self.state
            .lock()
            .map_err(|e| GatewayError::Unreachable(e.to_string()))
    }

    /// Publish an exam under its own code.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Unreachable` if the internal lock is poisoned.
    pub fn insert_exam(&self, exam: Exam) -> Result<(), GatewayError> {
        self.lock()?.exams.insert(exam.code().clone(), exam);
        Ok(())
    }

    /// Queue the outcome of the next unanswered submission.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Unreachable` if the internal lock is poisoned.
    pub fn push_outcome(
        &self,
        outcome: Result<SubmissionResult, GatewayError>,
    ) -> Result<(), GatewayError> {
        self.lock()?.scripted.push_back(outcome);
        Ok(())
    }

    /// Result returned once the scripted outcomes run out.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Unreachable` if the internal lock is poisoned.
    pub fn set_fallback(&self, result: SubmissionResult) -> Result<(), GatewayError> {
        self.lock()?.fallback = Some(result);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `GatewayError::Unreachable` if the internal lock is poisoned.
    pub fn set_healthy(&self, healthy: bool) -> Result<(), GatewayError> {
        self.lock()?.healthy = healthy;
        Ok(())
    }

    /// Every submission received so far, oldest first.
    #[must_use]
    pub fn submissions(&self) -> Vec<SubmissionRequest> {
        self.lock()
            .map(|state| state.submissions.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ExamSource for InMemoryGateway {
    async fn load_exam(&self, code: &ExamCode) -> Result<Exam, GatewayError> {
        let guard = self.lock()?;
        guard
            .exams
            .get(code)
            .cloned()
            .ok_or_else(|| GatewayError::ExamNotFound(code.clone()))
    }
}

#[async_trait]
impl GradingGateway for InMemoryGateway {
    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionResult, GatewayError> {
        let mut guard = self.lock()?;
        guard.submissions.push(request.clone());
        if let Some(outcome) = guard.scripted.pop_front() {
            return outcome;
        }
        guard
            .fallback
            .clone()
            .ok_or_else(|| GatewayError::Rejected("no grading outcome configured".into()))
    }

    async fn health(&self) -> Result<(), GatewayError> {
        if self.lock()?.healthy {
            Ok(())
        } else {
            Err(GatewayError::Unreachable("service reported unhealthy".into()))
        }
    }
}

/// Loader and grader behind trait objects, so callers can swap backends.
#[derive(Clone)]
pub struct Gateways {
    pub exams: Arc<dyn ExamSource>,
    pub grading: Arc<dyn GradingGateway>,
}

impl Gateways {
    /// Use one value as both loader and grader.
    #[must_use]
    pub fn shared<G>(gateway: G) -> Self
    where
        G: ExamSource + GradingGateway + 'static,
    {
        let gateway = Arc::new(gateway);
        let exams: Arc<dyn ExamSource> = gateway.clone();
        let grading: Arc<dyn GradingGateway> = gateway;
        Self { exams, grading }
    }

    /// # Errors
    ///
    /// Returns `GatewayError::Unreachable` if the HTTP client cannot be built.
    pub fn http(config: GatewayConfig) -> Result<Self, GatewayError> {
        Ok(Self::shared(HttpGateway::new(config)?))
    }
}
