//! The `examdesk validate` command.

use std::path::PathBuf;

use anyhow::Result;

use examdesk_core::parser;

pub fn execute(questions_path: PathBuf) -> Result<()> {
    let questions = parser::read_questions_lenient(&questions_path)?;
    println!(
        "Question set: {} ({} questions)",
        questions_path.display(),
        questions.len()
    );

    let warnings = parser::validate_questions(&questions);
    for w in &warnings {
        let prefix = w
            .question_id
            .as_ref()
            .map(|id| format!("  [{id}]"))
            .unwrap_or_else(|| "  ".to_string());
        println!("{prefix} WARNING: {}", w.message);
    }

    if warnings.is_empty() {
        println!("Question set valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
