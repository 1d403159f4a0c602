use exam_core::model::{AnswerLedger, Exam, OptionLabel, SubmissionResult};
use serde::Serialize;

/// Remaining time at or below which the countdown should be highlighted.
pub const LOW_TIME_THRESHOLD_SECS: u32 = 300;

/// Formats seconds as `m:ss`.
#[must_use]
pub fn format_remaining(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[must_use]
pub fn is_low_time(secs: u32) -> bool {
    secs <= LOW_TIME_THRESHOLD_SECS
}

/// Formats a percentage rounded to two decimals, dropping trailing zeros.
#[must_use]
pub fn format_percentage(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    let text = format!("{rounded:.2}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{text}%")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionView {
    pub label: OptionLabel,
    pub text: String,
    pub selected: bool,
}

/// The question currently on screen, with the stored answer already applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    pub index: usize,
    pub position_label: String,
    pub text: String,
    pub options: Vec<OptionView>,
    pub selected: Option<OptionLabel>,
    pub can_go_back: bool,
    pub is_last: bool,
}

impl QuestionView {
    #[must_use]
    pub fn from_exam(exam: &Exam, index: usize, ledger: &AnswerLedger) -> Option<Self> {
        let question = exam.question(index)?;
        let selected = ledger.get(index).cloned();
        let options = question
            .options()
            .map(|(label, text)| OptionView {
                label: label.clone(),
                text: text.to_owned(),
                selected: selected.as_ref() == Some(label),
            })
            .collect();

        Some(Self {
            index,
            position_label: format!("Question {} of {}", index + 1, exam.question_count()),
            text: question.text().to_owned(),
            options,
            selected,
            can_go_back: index > 0,
            is_last: index == exam.last_index(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicRow {
    pub name: String,
    pub percentage: String,
    pub status: String,
    pub fraction: String,
}

/// Display-ready grading result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultView {
    pub overall: String,
    pub passed: bool,
    pub status: String,
    pub correct_answers: u32,
    pub total_questions: u32,
    pub fraction: String,
    pub topics: Vec<TopicRow>,
}

impl From<&SubmissionResult> for ResultView {
    fn from(result: &SubmissionResult) -> Self {
        let passed = result.passed();
        // topic_scores is a BTreeMap, so rows come out sorted by topic name
        let topics = result
            .topic_scores()
            .iter()
            .map(|(name, score)| TopicRow {
                name: name.clone(),
                percentage: format_percentage(score.percentage()),
                status: score.status().to_string(),
                fraction: format!("{}/{}", score.correct(), score.total()),
            })
            .collect();

        Self {
            overall: format_percentage(result.overall_percentage()),
            passed,
            status: if passed { "Passed" } else { "Failed" }.to_owned(),
            correct_answers: result.correct_answers(),
            total_questions: result.total_questions(),
            fraction: format!("{}/{}", result.correct_answers(), result.total_questions()),
            topics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{ExamCode, Question, TopicScore, TopicStatus};
    use std::collections::BTreeMap;

    #[test]
    fn remaining_time_is_minutes_and_padded_seconds() {
        assert_eq!(format_remaining(3_600), "60:00");
        assert_eq!(format_remaining(65), "1:05");
        assert_eq!(format_remaining(0), "0:00");
        assert!(is_low_time(300));
        assert!(!is_low_time(301));
    }

    #[test]
    fn percentages_drop_trailing_zeros() {
        assert_eq!(format_percentage(100.0), "100%");
        assert_eq!(format_percentage(85.5), "85.5%");
        assert_eq!(format_percentage(66.666_666), "66.67%");
        assert_eq!(format_percentage(0.0), "0%");
    }

    #[test]
    fn question_view_marks_selection_and_bounds() {
        let questions = vec![
            Question::new("First", [("A", "a"), ("B", "b")]).unwrap(),
            Question::new("Second", [("A", "a"), ("B", "b")]).unwrap(),
        ];
        let exam = Exam::new(ExamCode::new("VIEW").unwrap(), questions, 1).unwrap();
        let mut ledger = AnswerLedger::new();
        ledger.set(&exam, 1, "B".into()).unwrap();

        let first = QuestionView::from_exam(&exam, 0, &ledger).unwrap();
        assert_eq!(first.position_label, "Question 1 of 2");
        assert!(!first.can_go_back);
        assert!(!first.is_last);
        assert!(first.selected.is_none());

        let second = QuestionView::from_exam(&exam, 1, &ledger).unwrap();
        assert!(second.is_last);
        assert!(second.options[1].selected);
        assert!(!second.options[0].selected);

        assert!(QuestionView::from_exam(&exam, 2, &ledger).is_none());
    }

    #[test]
    fn result_view_formats_topics_in_name_order() {
        let mut topics = BTreeMap::new();
        topics.insert(
            "Math".to_owned(),
            TopicScore::new(0, 1, 0.0, TopicStatus::Failed).unwrap(),
        );
        topics.insert(
            "Geography".to_owned(),
            TopicScore::new(2, 2, 100.0, TopicStatus::Passed).unwrap(),
        );
        let result = SubmissionResult::new(66.666_7, 2, 3, topics).unwrap();

        let view = ResultView::from(&result);
        assert_eq!(view.overall, "66.67%");
        assert!(view.passed);
        assert_eq!(view.status, "Passed");
        assert_eq!(view.fraction, "2/3");
        assert_eq!(view.topics[0].name, "Geography");
        assert_eq!(view.topics[0].percentage, "100%");
        assert_eq!(view.topics[1].status, "Failed");
        assert_eq!(view.topics[1].fraction, "0/1");
    }
}
