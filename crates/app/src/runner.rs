//! Line-oriented terminal front end for one exam attempt.

use std::error::Error;
use std::io::Write;

use exam_core::model::{OptionLabel, SessionPhase};
use services::session::{format_remaining, is_low_time};
use services::{ExamLoopService, QuestionView, ResultView, SessionHandle, SessionSnapshot};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

pub struct RunOptions {
    pub exam_code: Option<String>,
    pub student: Option<String>,
    pub json: bool,
}

enum Flow {
    Continue,
    Quit,
}

/// What has already been shown, so phase changes are announced once.
#[derive(Default)]
struct Screen {
    phase: SessionPhase,
    warned_low_time: bool,
    announced_timeout: bool,
    confirming_empty: bool,
}

pub async fn run(service: &ExamLoopService, options: RunOptions) -> Result<(), Box<dyn Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let student = match options.student {
        Some(name) => name,
        None => prompt(&mut lines, "Your name: ").await?,
    };
    let exam_code = match options.exam_code {
        Some(code) => code,
        None => prompt(&mut lines, "Exam code: ").await?,
    };

    let session = service.start_attempt(&student, &exam_code).await?;
    let mut updates = session.subscribe();
    let first = updates.borrow_and_update().clone();
    let mut screen = Screen {
        phase: first.phase,
        ..Screen::default()
    };

    print_help();
    render(&first);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    session.leave().await;
                    return Ok(());
                };
                if let Flow::Quit = handle_line(&session, &mut screen, line.trim()).await {
                    session.leave().await;
                    println!("Left the exam without submitting.");
                    return Ok(());
                }
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let snapshot = updates.borrow_and_update().clone();
                if screen.observe(&snapshot) {
                    session.leave().await;
                    return print_result(&snapshot, options.json);
                }
            }
        }
    }
}

async fn prompt(lines: &mut Lines<BufReader<Stdin>>, label: &str) -> Result<String, Box<dyn Error>> {
    print!("{label}");
    std::io::stdout().flush()?;
    let line = lines.next_line().await?.ok_or("input closed")?;
    Ok(line.trim().to_owned())
}

fn print_help() {
    println!("Type an option label to answer. Commands:");
    println!("  n  next question    p  previous question");
    println!("  f  finish and submit    t  time left    q  quit");
}

async fn handle_line(session: &SessionHandle, screen: &mut Screen, input: &str) -> Flow {
    if screen.confirming_empty {
        screen.confirming_empty = false;
        if matches!(input, "y" | "yes") {
            submit(session).await;
        } else {
            println!("Submission cancelled.");
        }
        return Flow::Continue;
    }

    match input {
        "" => {}
        "q" => return Flow::Quit,
        "?" | "h" => print_help(),
        "t" => {
            let remaining = session.snapshot().remaining_seconds;
            println!("Time left: {}", format_remaining(remaining));
        }
        "n" => match session.next().await {
            Ok(_) => render(&session.snapshot()),
            Err(err) => println!("{err}"),
        },
        "p" => match session.previous().await {
            Ok(_) => render(&session.snapshot()),
            Err(err) => println!("{err}"),
        },
        "f" => {
            if session.snapshot().needs_empty_confirmation() {
                println!("No answers selected. Submit anyway? [y/N]");
                screen.confirming_empty = true;
            } else {
                submit(session).await;
            }
        }
        other => {
            let label = resolve_label(&session.snapshot(), other);
            match session.select(label).await {
                Ok(()) => render(&session.snapshot()),
                Err(err) => println!("{err}"),
            }
        }
    }
    Flow::Continue
}

/// Match typed input against the current options ignoring ASCII case.
fn resolve_label(snapshot: &SessionSnapshot, input: &str) -> OptionLabel {
    snapshot
        .question
        .as_ref()
        .and_then(|question| {
            question
                .options
                .iter()
                .find(|option| option.label.as_str().eq_ignore_ascii_case(input))
        })
        .map_or_else(|| OptionLabel::from(input), |option| option.label.clone())
}

async fn submit(session: &SessionHandle) {
    if let Err(err) = session.submit().await {
        println!("{err}");
    }
}

impl Screen {
    /// Announce what changed since the last snapshot. Returns true once the
    /// attempt is graded.
    fn observe(&mut self, snapshot: &SessionSnapshot) -> bool {
        let previous = std::mem::replace(&mut self.phase, snapshot.phase);

        if snapshot.phase == SessionPhase::InProgress
            && is_low_time(snapshot.remaining_seconds)
            && !self.warned_low_time
        {
            self.warned_low_time = true;
            println!(
                "Hurry up: {} left.",
                format_remaining(snapshot.remaining_seconds)
            );
        }

        // Expired may be replaced by Submitting before this task sees it.
        if snapshot.timed_out() && !self.announced_timeout {
            self.announced_timeout = true;
            println!("Time is up.");
        }

        if previous == snapshot.phase {
            return false;
        }
        match (previous, snapshot.phase) {
            (_, SessionPhase::Submitting) => println!("Submitting your answers..."),
            (SessionPhase::Submitting, SessionPhase::InProgress | SessionPhase::Expired) => {
                if let Some(failure) = &snapshot.last_failure {
                    println!("{failure}");
                }
                println!("Type f to try again.");
            }
            (_, SessionPhase::Completed) => return true,
            _ => {}
        }
        false
    }
}

fn render(snapshot: &SessionSnapshot) {
    let Some(question) = &snapshot.question else {
        return;
    };
    println!();
    println!(
        "{}  [{}]",
        question.position_label,
        format_remaining(snapshot.remaining_seconds)
    );
    render_question(question);
}

fn render_question(question: &QuestionView) {
    println!("{}", question.text);
    for option in &question.options {
        let mark = if option.selected { "x" } else { " " };
        println!("  ({mark}) {}) {}", option.label, option.text);
    }
    if question.is_last {
        println!("Last question: type f to finish.");
    }
}

fn print_result(snapshot: &SessionSnapshot, json: bool) -> Result<(), Box<dyn Error>> {
    let Some(result) = &snapshot.result else {
        return Ok(());
    };
    let view = ResultView::from(result);

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!();
    println!("Result: {} ({}, {} correct)", view.status, view.overall, view.fraction);
    for topic in &view.topics {
        println!(
            "  {:<24} {:>8}  {:<7} {}",
            topic.name, topic.percentage, topic.status, topic.fraction
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use services::session::OptionView;

    fn snapshot_with_options(labels: &[&str]) -> SessionSnapshot {
        let options = labels
            .iter()
            .map(|label| OptionView {
                label: OptionLabel::from(*label),
                text: String::new(),
                selected: false,
            })
            .collect();
        SessionSnapshot {
            phase: SessionPhase::InProgress,
            remaining_seconds: 600,
            question: Some(QuestionView {
                index: 0,
                position_label: "Question 1 of 1".into(),
                text: "Pick one".into(),
                options,
                selected: None,
                can_go_back: false,
                is_last: true,
            }),
            ..SessionSnapshot::default()
        }
    }

    #[test]
    fn typed_labels_match_ignoring_case() {
        let snapshot = snapshot_with_options(&["A", "B"]);
        assert_eq!(resolve_label(&snapshot, "b"), OptionLabel::from("B"));
        assert_eq!(resolve_label(&snapshot, "Z"), OptionLabel::from("Z"));
    }

    #[test]
    fn completion_is_reported_once_the_phase_changes() {
        let mut screen = Screen {
            phase: SessionPhase::InProgress,
            ..Screen::default()
        };
        let mut snapshot = snapshot_with_options(&["A"]);

        snapshot.phase = SessionPhase::Submitting;
        assert!(!screen.observe(&snapshot));

        snapshot.phase = SessionPhase::Completed;
        assert!(screen.observe(&snapshot));
        assert!(!screen.observe(&snapshot));
    }

    #[test]
    fn low_time_warning_fires_once() {
        let mut screen = Screen {
            phase: SessionPhase::InProgress,
            ..Screen::default()
        };
        let mut snapshot = snapshot_with_options(&["A"]);
        snapshot.remaining_seconds = 300;

        screen.observe(&snapshot);
        assert!(screen.warned_low_time);
        snapshot.remaining_seconds = 299;
        screen.observe(&snapshot);
        assert!(screen.warned_low_time);
    }

    #[test]
    fn timeout_is_announced_even_when_expired_is_skipped() {
        let mut screen = Screen {
            phase: SessionPhase::InProgress,
            ..Screen::default()
        };
        let mut snapshot = snapshot_with_options(&["A"]);
        snapshot.remaining_seconds = 1;
        screen.observe(&snapshot);
        assert!(!screen.announced_timeout);

        snapshot.phase = SessionPhase::Submitting;
        snapshot.remaining_seconds = 0;
        assert!(!screen.observe(&snapshot));
        assert!(screen.announced_timeout);

        snapshot.phase = SessionPhase::Expired;
        screen.observe(&snapshot);
        assert!(screen.announced_timeout);
    }

    #[test]
    fn manual_submission_is_not_a_timeout() {
        let mut screen = Screen {
            phase: SessionPhase::InProgress,
            ..Screen::default()
        };
        let mut snapshot = snapshot_with_options(&["A"]);
        snapshot.phase = SessionPhase::Submitting;
        snapshot.remaining_seconds = 42;

        screen.observe(&snapshot);
        assert!(!screen.announced_timeout);
    }
}
