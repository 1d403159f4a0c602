#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use exam_core::model::{Exam, ExamCode, Question, SubmissionResult, TopicScore, TopicStatus};
use gateway::{GatewayError, GradingGateway, InMemoryGateway, SubmissionRequest};
use tokio::sync::Notify;

pub fn exam(code: &str, minutes: u32) -> Exam {
    let questions = vec![
        Question::new("Capital of France?", [("A", "Rome"), ("B", "Paris"), ("C", "Madrid")])
            .unwrap()
            .with_topic("Geography"),
        Question::new("2 + 2?", [("A", "4"), ("B", "5")])
            .unwrap()
            .with_topic("Math"),
        Question::new("Largest ocean?", [("A", "Atlantic"), ("B", "Indian"), ("C", "Pacific")])
            .unwrap()
            .with_topic("Geography"),
    ];
    Exam::new(ExamCode::new(code).unwrap(), questions, minutes).unwrap()
}

pub fn graded(correct: u32, total: u32) -> SubmissionResult {
    let percentage = f64::from(correct) * 100.0 / f64::from(total);
    let mut topics = BTreeMap::new();
    topics.insert(
        "General".to_owned(),
        TopicScore::new(
            correct,
            total,
            percentage,
            TopicStatus::from_percentage(percentage),
        )
        .unwrap(),
    );
    SubmissionResult::new(percentage, correct, total, topics).unwrap()
}

/// Grader that holds every submission until the test releases it.
#[derive(Clone)]
pub struct GatedGateway {
    pub inner: InMemoryGateway,
    gate: Arc<Notify>,
}

impl GatedGateway {
    pub fn new(inner: InMemoryGateway) -> Self {
        Self {
            inner,
            gate: Arc::new(Notify::new()),
        }
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }
}

#[async_trait]
impl GradingGateway for GatedGateway {
    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionResult, GatewayError> {
        self.gate.notified().await;
        self.inner.submit(request).await
    }
}
