//! Terminal output shared by the commands.

use comfy_table::{Cell, Table};

use examdesk_core::model::Question;
use examdesk_core::pipeline::{SubmissionAttempt, SubmissionStatus};
use examdesk_core::scoring::{AnswerReview, ScoreReport, Verdict};
use examdesk_core::session::ExamSession;
use examdesk_core::timer::format_clock;

pub fn print_question(session: &ExamSession) {
    let Some(question) = session.current_question() else {
        return;
    };
    let nav = session.navigator();
    println!();
    println!(
        "Question {}/{}  [{} left, {} answered]",
        nav.current_index() + 1,
        nav.total(),
        format_clock(session.remaining_secs()),
        nav.answers().len()
    );
    print_prompt(question);
    match nav.answers().get(&question.id) {
        Some(choice) => println!("Your answer: {choice}"),
        None => println!("Not answered yet"),
    }
}

fn print_prompt(question: &Question) {
    println!("{}", question.prompt);
    for (key, text) in &question.options {
        println!("  {key}) {text}");
    }
}

/// One line per question: number, marker for answered, marker for current.
pub fn print_progress(session: &ExamSession) {
    let nav = session.navigator();
    let mut line = String::new();
    for (i, q) in nav.questions().iter().enumerate() {
        let answered = if nav.answers().get(&q.id).is_some() { "*" } else { "" };
        let current = if i == nav.current_index() { ">" } else { " " };
        line.push_str(&format!("{current}{}{answered:<2}", i + 1));
        if (i + 1) % 10 == 0 {
            println!("{}", line.trim_end());
            line.clear();
        }
    }
    if !line.is_empty() {
        println!("{}", line.trim_end());
    }
    println!("(* answered, > current)");
}

pub fn print_help() {
    println!("Commands:");
    println!("  <key>       answer the current question (e.g. a)");
    println!("  n, next     next question");
    println!("  p, prev     previous question");
    println!("  g <number>  jump to a question");
    println!("  l, list     show progress");
    println!("  t, time     show remaining time");
    println!("  s, submit   finish and submit");
    println!("  q, quit     leave; progress stays saved");
}

/// Describe a submission snapshot in one line.
pub fn submission_line(attempt: &SubmissionAttempt) -> String {
    match attempt.status {
        SubmissionStatus::Idle => "Preparing submission...".to_string(),
        SubmissionStatus::Submitting => format!("Submitting (attempt {})...", attempt.attempt_count),
        SubmissionStatus::Retrying => {
            let reason = attempt
                .last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "error".to_string());
            format!(
                "Attempt {} failed ({reason}); retrying in {:.1}s",
                attempt.attempt_count,
                attempt.next_retry_delay_ms as f64 / 1000.0
            )
        }
        SubmissionStatus::Succeeded => "Result delivered.".to_string(),
        SubmissionStatus::Failed => format!(
            "Result NOT delivered after {} attempt(s).",
            attempt.attempt_count
        ),
    }
}

pub fn score_table(candidate: &str, report: &ScoreReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Candidate", candidate]);
    let rows = [
        ("Score", format!("{:.2} / {:.2}", report.score, report.total_marks)),
        ("Result", if report.pass { "PASS" } else { "FAIL" }.to_string()),
        ("Correct", report.correct.to_string()),
        ("Wrong", report.wrong.to_string()),
        ("Unanswered", report.unanswered().to_string()),
        ("Attempted", format!("{} of {}", report.attempted, report.total)),
        ("Accuracy", format!("{:.1}%", report.accuracy_percent())),
    ];
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    table
}

pub fn review_table(reviews: &[AnswerReview]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["#", "Question", "Your answer", "Correct", "Verdict"]);
    for r in reviews {
        let verdict = match r.verdict {
            Verdict::Correct => "correct",
            Verdict::Wrong => "wrong",
            Verdict::Unanswered => "-",
        };
        table.add_row(vec![
            Cell::new(r.index + 1),
            Cell::new(&r.question_id),
            Cell::new(r.selected.as_ref().map(|o| o.to_string()).unwrap_or_default()),
            Cell::new(&r.correct_option),
            Cell::new(verdict),
        ]);
    }
    table
}
