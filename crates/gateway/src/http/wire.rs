//! JSON bodies exchanged with the exam service and their mapping to domain types.
//!
//! The service speaks Spanish field names (`pregunta`, `opciones`, `tema`) and
//! status words (`Aprobado`/`Reprobado`); English aliases are accepted too.

use std::collections::BTreeMap;

use exam_core::model::{
    Exam, ExamCode, ExamError, Question, ResultId, SubmissionResult, TopicScore, TopicStatus,
};
use serde::Deserialize;
use serde_json::Value;

use crate::boundary::GatewayError;

fn invalid<E: core::fmt::Display>(e: E) -> GatewayError {
    GatewayError::InvalidResponse(e.to_string())
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExamBody {
    pub questions: Vec<QuestionBody>,
    pub time_limit: u32,
    #[serde(default)]
    pub is_version: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QuestionBody {
    #[serde(alias = "text")]
    pub pregunta: String,
    #[serde(alias = "options")]
    pub opciones: BTreeMap<String, String>,
    #[serde(default, alias = "topic")]
    pub tema: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitBody {
    #[serde(default)]
    pub result_id: Option<String>,
    pub correct_answers: u32,
    pub total_questions: u32,
    pub overall_percentage: f64,
    #[serde(default)]
    pub topic_scores: BTreeMap<String, TopicScoreBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TopicScoreBody {
    pub percentage: f64,
    pub status: String,
    pub correct: u32,
    pub total: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HealthBody {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

pub(crate) fn parse_topic_status(raw: &str) -> Result<TopicStatus, GatewayError> {
    match raw.trim() {
        "Aprobado" | "Passed" | "passed" => Ok(TopicStatus::Passed),
        "Reprobado" | "Failed" | "failed" => Ok(TopicStatus::Failed),
        other => Err(GatewayError::InvalidResponse(format!(
            "unknown topic status: {other}"
        ))),
    }
}

pub(crate) fn map_exam(code: &ExamCode, body: ExamBody) -> Result<Exam, GatewayError> {
    tracing::debug!(
        exam_code = %code,
        questions = body.questions.len(),
        is_version = body.is_version,
        "mapping exam body"
    );
    let mut questions = Vec::with_capacity(body.questions.len());
    for (index, raw) in body.questions.into_iter().enumerate() {
        let question = Question::new(raw.pregunta, raw.opciones)
            .map_err(|source| invalid(ExamError::InvalidQuestion { index, source }))?;
        let question = match raw.tema {
            Some(topic) => question.with_topic(topic),
            None => question,
        };
        questions.push(question);
    }
    Exam::new(code.clone(), questions, body.time_limit).map_err(invalid)
}

/// Maps a 200 submit body. Only bodies with `success: true` count as graded;
/// an `error` message or a missing or false `success` is a rejection.
pub(crate) fn map_submission(body: Value) -> Result<SubmissionResult, GatewayError> {
    if let Some(message) = body.get("error").and_then(Value::as_str) {
        return Err(GatewayError::Rejected(message.to_owned()));
    }
    if body.get("success").and_then(Value::as_bool) != Some(true) {
        return Err(GatewayError::Rejected("grading service reported failure".into()));
    }

    let body: SubmitBody = serde_json::from_value(body).map_err(invalid)?;

    let mut topics = BTreeMap::new();
    for (name, score) in body.topic_scores {
        let status = parse_topic_status(&score.status)?;
        let score =
            TopicScore::new(score.correct, score.total, score.percentage, status).map_err(invalid)?;
        topics.insert(name, score);
    }

    let result = SubmissionResult::new(
        body.overall_percentage,
        body.correct_answers,
        body.total_questions,
        topics,
    )
    .map_err(invalid)?;

    match body.result_id {
        Some(raw) => {
            let id: ResultId = raw.parse().map_err(invalid)?;
            Ok(result.with_result_id(id))
        }
        None => Ok(result),
    }
}

pub(crate) fn map_health(body: HealthBody) -> Result<(), GatewayError> {
    if body.status.eq_ignore_ascii_case("ok") {
        return Ok(());
    }
    Err(GatewayError::Unreachable(
        body.message.unwrap_or_else(|| format!("status {}", body.status)),
    ))
}
