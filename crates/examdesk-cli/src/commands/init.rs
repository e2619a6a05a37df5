//! The `examdesk init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    write_if_missing("examdesk.toml", SAMPLE_CONFIG)?;
    write_if_missing("questions.sample.json", SAMPLE_QUESTIONS)?;

    println!("\nNext steps:");
    println!("  1. Point backend.base_url in examdesk.toml at your exam server");
    println!("  2. Run: examdesk validate --questions questions.sample.json");
    println!("  3. Run: examdesk take --candidate \"Your Name\"");

    Ok(())
}

fn write_if_missing(path: &str, content: &str) -> Result<()> {
    if Path::new(path).exists() {
        println!("{path} already exists, skipping.");
    } else {
        std::fs::write(path, content)?;
        println!("Created {path}");
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# examdesk configuration

store_dir = "./examdesk-sessions"

[backend]
base_url = "http://localhost:3000"
questions_path = "questions.json"
submit_path = "api/save-answer"
# exam_config_path = "api/exam-config"
timeout_secs = 15

[exam]
duration_secs = 3600
mark_per_question = 1.25
negative_marking = 0.25
pass_mark = 40.0

[retry]
max_attempts = 10
base_delay_ms = 1000
max_delay_ms = 30000
"#;

const SAMPLE_QUESTIONS: &str = r#"[
  {
    "id": 1,
    "question": "Which planet is closest to the Sun?",
    "options": { "a": "Venus", "b": "Mercury", "c": "Mars", "d": "Earth" },
    "correctAnswer": "b"
  },
  {
    "id": 2,
    "question": "What is 7 x 8?",
    "options": { "a": "54", "b": "56", "c": "63", "d": "48" },
    "correctAnswer": "b"
  },
  {
    "id": 3,
    "question": "Which gas do plants absorb for photosynthesis?",
    "options": { "a": "Oxygen", "b": "Nitrogen", "c": "Carbon dioxide", "d": "Helium" },
    "correctAnswer": "c"
  }
]
"#;
