//! The `examdesk score` command: grade a saved answers file without a backend.

use std::path::PathBuf;

use anyhow::{Context, Result};

use examdesk_client::config::load_config_from;
use examdesk_core::model::AnswerMap;
use examdesk_core::{parser, scoring};

use crate::render;

pub fn execute(
    questions_path: PathBuf,
    answers_path: PathBuf,
    review: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    config.validate()?;

    let questions = parser::parse_question_file(&questions_path)?;
    anyhow::ensure!(!questions.is_empty(), "question set is empty");

    let content = std::fs::read_to_string(&answers_path)
        .with_context(|| format!("failed to read answers: {}", answers_path.display()))?;
    let mut answers: AnswerMap = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse answers: {}", answers_path.display()))?;

    let before = answers.len();
    answers.retain_valid(&questions);
    if answers.len() < before {
        eprintln!(
            "Ignoring {} answer(s) for unknown questions or options.",
            before - answers.len()
        );
    }

    let report = scoring::score(&questions, &answers, &config.marking_scheme());
    let label = answers_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    println!("{}", render::score_table(&label, &report));

    if review {
        let reviews = scoring::review(&questions, &answers);
        println!("\n{}", render::review_table(&reviews));
    }

    Ok(())
}
