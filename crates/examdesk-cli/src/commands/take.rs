//! The `examdesk take` command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;

use examdesk_client::config::load_config_from;
use examdesk_client::HttpBackend;
use examdesk_core::model::OptionKey;
use examdesk_core::persistence::PersistenceAdapter;
use examdesk_core::pipeline::SubmissionPipeline;
use examdesk_core::session::{ExamSession, SessionPhase, StartOutcome, TickOutcome};
use examdesk_core::timer::format_clock;
use examdesk_store::FileStore;

use crate::render;

enum Flow {
    Continue,
    Quit,
}

pub async fn execute(candidate: String, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    config.validate()?;
    tracing::debug!(
        base_url = %config.backend.base_url,
        store = %config.store_dir.display(),
        "configuration loaded"
    );

    let backend = Arc::new(HttpBackend::new(&config.backend)?);
    let store = FileStore::open(&config.store_dir)
        .with_context(|| format!("failed to open store: {}", config.store_dir.display()))?;
    let persistence = PersistenceAdapter::new(Arc::new(store));
    let pipeline = SubmissionPipeline::new(backend.clone(), config.retry_policy());
    let mut session = ExamSession::new(config.exam_config(), persistence, pipeline);

    let started = match session.start(&candidate, backend.as_ref()).await {
        Ok(outcome) => outcome,
        Err(e) if e.is_retryable() => {
            anyhow::bail!("{e}. Check the connection and run `examdesk take` again.")
        }
        Err(e) => return Err(e).context("could not start the exam"),
    };

    let name = session.candidate().unwrap_or_default().to_string();
    match started {
        StartOutcome::Fresh => {
            println!(
                "Welcome, {name}. {} questions, {} on the clock. Type h for help.",
                session.navigator().total(),
                format_clock(session.remaining_secs())
            );
        }
        StartOutcome::Resumed => {
            println!(
                "Welcome back, {name}. Resuming at question {} with {} left.",
                session.navigator().current_index() + 1,
                format_clock(session.remaining_secs())
            );
        }
        StartOutcome::Expired => println!("Welcome back, {name}. Your time has run out."),
        StartOutcome::ResumedSubmission => {
            println!("Welcome back, {name}. Resending your unsent result.")
        }
        StartOutcome::AlreadyDelivered => {
            println!("Welcome back, {name}. Your result was already delivered.")
        }
    }

    if session.phase() == SessionPhase::Running {
        render::print_question(&session);
        if let Flow::Quit = run_exam(&mut session).await? {
            println!("Progress saved. Run the same command to continue.");
            return Ok(());
        }
    }

    deliver(&mut session).await
}

async fn run_exam(session: &mut ExamSession) -> Result<Flow> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    while session.phase() == SessionPhase::Running {
        tokio::select! {
            _ = ticker.tick() => match session.tick() {
                TickOutcome::Running { remaining_secs } if remaining_secs == 300 || remaining_secs == 60 => {
                    println!("{} left.", format_clock(remaining_secs));
                }
                TickOutcome::Expired => println!("\nTime is up. Submitting your answers."),
                _ => {}
            },
            line = lines.next_line() => {
                let line = line.context("failed to read input")?;
                match line {
                    Some(line) => {
                        if let Flow::Quit = handle_command(session, line.trim()) {
                            return Ok(Flow::Quit);
                        }
                    }
                    None => return Ok(Flow::Quit),
                }
            }
        }
    }
    Ok(Flow::Continue)
}

fn handle_command(session: &mut ExamSession, input: &str) -> Flow {
    let (command, arg) = match input.split_once(char::is_whitespace) {
        Some((c, rest)) => (c, rest.trim()),
        None => (input, ""),
    };

    let moved = match command {
        "" => return Flow::Continue,
        "n" | "next" => session.next(),
        "p" | "prev" => session.previous(),
        "g" | "go" => match arg.parse::<usize>() {
            Ok(n) if n >= 1 => session.jump_to(n - 1),
            _ => {
                println!("Usage: g <question number>");
                return Flow::Continue;
            }
        },
        "l" | "list" => {
            render::print_progress(session);
            return Flow::Continue;
        }
        "t" | "time" => {
            println!("{} left.", format_clock(session.remaining_secs()));
            return Flow::Continue;
        }
        "s" | "submit" => {
            session.submit();
            return Flow::Continue;
        }
        "q" | "quit" => return Flow::Quit,
        "h" | "help" => {
            render::print_help();
            return Flow::Continue;
        }
        key => {
            match session.select_current(&OptionKey::from(key)) {
                Ok(()) => println!("Saved answer {key}."),
                Err(e) => println!("{e}. Type h for help."),
            }
            return Flow::Continue;
        }
    };

    match moved {
        Ok(true) => render::print_question(session),
        Ok(false) => println!("No question there."),
        Err(e) => println!("{e}"),
    }
    Flow::Continue
}

/// Follow the submission to its end and print the result.
async fn deliver(session: &mut ExamSession) -> Result<()> {
    if let Some(mut rx) = session.subscribe_submission() {
        let mut last = None;
        loop {
            let snapshot = rx.borrow_and_update().clone();
            let key = (snapshot.status, snapshot.attempt_count);
            if last != Some(key) {
                println!("{}", render::submission_line(&snapshot));
                last = Some(key);
            }
            if snapshot.status.is_terminal() || rx.changed().await.is_err() {
                break;
            }
        }
    }

    let outcome = session.wait_for_outcome().await.cloned();
    let name = session.display_name().unwrap_or_default().to_string();
    if let Some(report) = session.score_report() {
        println!("\n{}", render::score_table(&name, report));
    }
    if let Some(receipt) = session.receipt().filter(|r| r.was_renamed) {
        if let Some(saved) = &receipt.saved_name {
            println!("Your result was recorded as \"{saved}\".");
        }
    }

    match outcome {
        Some(outcome) if outcome.succeeded() => Ok(()),
        Some(outcome) => anyhow::bail!(
            "your result was not delivered after {} attempt(s). It is saved on this machine; \
             run `examdesk take --candidate \"{}\"` again to resend it",
            outcome.attempt.attempt_count,
            session.candidate().unwrap_or_default()
        ),
        None => Ok(()),
    }
}
