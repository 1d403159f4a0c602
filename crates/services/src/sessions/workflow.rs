use std::sync::Arc;

use exam_core::model::ExamCode;
use gateway::{ExamSource, GatewayError, Gateways, GradingGateway};

use super::driver::SessionHandle;
use crate::WallClock;
use crate::error::LoaderError;

/// Opens exam attempts: validates the student's input, loads the exam and
/// hands back a running session.
#[derive(Clone)]
pub struct ExamLoopService {
    clock: WallClock,
    exams: Arc<dyn ExamSource>,
    grading: Arc<dyn GradingGateway>,
}

impl ExamLoopService {
    #[must_use]
    pub fn new(
        clock: WallClock,
        exams: Arc<dyn ExamSource>,
        grading: Arc<dyn GradingGateway>,
    ) -> Self {
        Self {
            clock,
            exams,
            grading,
        }
    }

    #[must_use]
    pub fn from_gateways(clock: WallClock, gateways: Gateways) -> Self {
        Self::new(clock, gateways.exams, gateways.grading)
    }

    /// Load `exam_code` and start a timed attempt for `student_name`.
    ///
    /// Both inputs are trimmed before use.
    ///
    /// # Errors
    ///
    /// Returns `LoaderError::EmptyStudentName` or `LoaderError::EmptyExamCode`
    /// for blank input, `LoaderError::Gateway` when the exam cannot be loaded
    /// (including `GatewayError::ExamNotFound`).
    pub async fn start_attempt(
        &self,
        student_name: &str,
        exam_code: &str,
    ) -> Result<SessionHandle, LoaderError> {
        let student_name = student_name.trim();
        if student_name.is_empty() {
            return Err(LoaderError::EmptyStudentName);
        }
        let code = ExamCode::new(exam_code).map_err(|_| LoaderError::EmptyExamCode)?;

        let exam = self.exams.load_exam(&code).await.inspect_err(|err| {
            tracing::warn!(exam_code = %code, %err, "could not load exam");
        })?;
        tracing::info!(
            exam_code = %code,
            questions = exam.question_count(),
            minutes = exam.time_limit_minutes(),
            "exam loaded"
        );

        let handle = SessionHandle::spawn(student_name, Arc::clone(&self.grading), self.clock);
        handle.start(exam).await?;
        Ok(handle)
    }

    /// Ask the grading service whether it is up.
    ///
    /// # Errors
    ///
    /// Returns the gateway error when the service is down or unreachable.
    pub async fn check_backend(&self) -> Result<(), GatewayError> {
        self.grading.health().await
    }
}
