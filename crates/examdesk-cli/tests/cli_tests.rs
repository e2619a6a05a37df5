//! CLI integration tests using assert_cmd.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use examdesk_core::model::SessionState;
use examdesk_core::persistence::PersistenceAdapter;
use examdesk_store::FileStore;

fn examdesk() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("examdesk").unwrap();
    cmd.env_remove("EXAMDESK_BASE_URL")
        .env_remove("EXAMDESK_STORE_DIR")
        .env_remove("RUST_LOG");
    cmd
}

fn sample_set() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../question-sets/general-knowledge.json")
}

fn write_config(dir: &Path, base_url: &str, max_attempts: u32) -> PathBuf {
    let path = dir.join("examdesk.toml");
    let content = format!(
        r#"store_dir = '{}'

[backend]
base_url = "{base_url}"
timeout_secs = 5

[exam]
duration_secs = 600

[retry]
max_attempts = {max_attempts}
base_delay_ms = 1
max_delay_ms = 5
"#,
        dir.join("sessions").display()
    );
    fs::write(&path, content).unwrap();
    path
}

fn persistence(dir: &Path) -> PersistenceAdapter {
    PersistenceAdapter::new(Arc::new(FileStore::open(dir.join("sessions")).unwrap()))
}

async fn serve_questions(server: &MockServer) {
    let body = fs::read_to_string(sample_set()).unwrap();
    Mock::given(method("GET"))
        .and(path("/questions.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[test]
fn validate_sample_set() {
    examdesk()
        .arg("validate")
        .arg("--questions")
        .arg(sample_set())
        .assert()
        .success()
        .stdout(predicate::str::contains("5 questions"))
        .stdout(predicate::str::contains("Question set valid."));
}

#[test]
fn validate_reports_authoring_problems() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("broken.json");
    fs::write(
        &file,
        r#"[
            {"id": 1, "question": "One?", "options": {"a": "x", "b": "y"}, "correctAnswer": "c"},
            {"id": 1, "question": "", "options": {"a": "x"}, "correctAnswer": "a"}
        ]"#,
    )
    .unwrap();

    examdesk()
        .arg("validate")
        .arg("--questions")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("duplicate question ID: 1"))
        .stdout(predicate::str::contains("not one of the options"))
        .stdout(predicate::str::contains("4 warning(s) found."));
}

#[test]
fn validate_nonexistent_file() {
    examdesk()
        .arg("validate")
        .arg("--questions")
        .arg("nonexistent.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn score_answers_file() {
    let dir = TempDir::new().unwrap();
    let answers = dir.path().join("rafi.json");
    fs::write(&answers, r#"{"1": "a", "2": "b", "3": "a"}"#).unwrap();

    examdesk()
        .current_dir(dir.path())
        .env("HOME", dir.path())
        .arg("score")
        .arg("--questions")
        .arg(sample_set())
        .arg("--answers")
        .arg(&answers)
        .arg("--review")
        .assert()
        .success()
        .stdout(predicate::str::contains("2.25 / 6.25"))
        .stdout(predicate::str::contains("FAIL"))
        .stdout(predicate::str::contains("66.7%"))
        .stdout(predicate::str::contains("wrong"));
}

#[test]
fn init_creates_usable_files() {
    let dir = TempDir::new().unwrap();

    examdesk()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created examdesk.toml"))
        .stdout(predicate::str::contains("Created questions.sample.json"));

    examdesk()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));

    examdesk()
        .current_dir(dir.path())
        .arg("validate")
        .arg("--questions")
        .arg("questions.sample.json")
        .assert()
        .success()
        .stdout(predicate::str::contains("Question set valid."));

    examdesk()
        .current_dir(dir.path())
        .arg("discard")
        .arg("--candidate")
        .arg("Nobody")
        .arg("--config")
        .arg("examdesk.toml")
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing saved for Nobody."));
}

#[test]
fn discard_removes_saved_progress() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "http://localhost:3000", 3);
    persistence(dir.path())
        .save("Mina", &SessionState::fresh("Mina", 600))
        .unwrap();

    examdesk()
        .arg("discard")
        .arg("--candidate")
        .arg("Mina")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Discarded saved progress for Mina."));

    assert!(persistence(dir.path()).load("Mina").is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn take_answers_and_delivers() {
    let server = MockServer::start().await;
    serve_questions(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/save-answer"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "savedName": "Rafi",
            "wasRenamed": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), &server.uri(), 3);

    examdesk()
        .arg("take")
        .arg("--candidate")
        .arg("Rafi")
        .arg("--config")
        .arg(&config)
        .write_stdin("a\nn\nb\ns\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Welcome, Rafi"))
        .stdout(predicate::str::contains("Saved answer b."))
        .stdout(predicate::str::contains("Result delivered."))
        .stdout(predicate::str::contains("2.50 / 6.25"));

    let requests = server.received_requests().await.unwrap();
    let post = requests
        .iter()
        .find(|r| r.method.as_str() == "POST")
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&post.body).unwrap();
    assert_eq!(body["studentName"], "Rafi");
    assert_eq!(body["answers"], serde_json::json!({"1": "a", "2": "b"}));
    assert_eq!(body["score"], 2.5);
    assert_eq!(body["questionFile"], "questions.json");
    assert!(persistence(dir.path()).load_pending("Rafi").is_none());

    examdesk()
        .arg("take")
        .arg("--candidate")
        .arg("Rafi")
        .arg("--config")
        .arg(&config)
        .write_stdin("s\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("already delivered"))
        .stdout(predicate::str::contains("2.50 / 6.25"));

    examdesk()
        .arg("discard")
        .arg("--candidate")
        .arg("Rafi")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Discarded saved progress for Rafi."));
    assert!(persistence(dir.path()).load_delivered("Rafi").is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn undelivered_result_is_resent_next_time() {
    let server = MockServer::start().await;
    serve_questions(&server).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), &server.uri(), 2);

    examdesk()
        .arg("take")
        .arg("--candidate")
        .arg("Rafi")
        .arg("--config")
        .arg(&config)
        .write_stdin("c\ns\n")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Result NOT delivered after 2 attempt(s)."))
        .stdout(predicate::str::contains("0.00 / 6.25"))
        .stderr(predicate::str::contains("not delivered"));
    assert!(persistence(dir.path()).load_pending("Rafi").is_some());

    server.reset().await;
    serve_questions(&server).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "savedName": "Rafi (2)",
            "wasRenamed": true
        })))
        .mount(&server)
        .await;

    examdesk()
        .arg("take")
        .arg("--candidate")
        .arg("Rafi")
        .arg("--config")
        .arg(&config)
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains("Resending your unsent result."))
        .stdout(predicate::str::contains("recorded as \"Rafi (2)\""));
    assert!(persistence(dir.path()).load_pending("Rafi").is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn quit_keeps_progress() {
    let server = MockServer::start().await;
    serve_questions(&server).await;

    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), &server.uri(), 3);

    examdesk()
        .arg("take")
        .arg("--candidate")
        .arg("Rafi")
        .arg("--config")
        .arg(&config)
        .write_stdin("n\ng 9223372036854775809\ng 3\nc\nq\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("No question there."))
        .stdout(predicate::str::contains("Question 3/5"))
        .stdout(predicate::str::contains("Progress saved."));

    let saved = persistence(dir.path()).load("Rafi").unwrap();
    assert_eq!(saved.current_index, 2);
    assert_eq!(saved.answers.len(), 1);
    assert!(server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .all(|r| r.method.as_str() == "GET"));

    examdesk()
        .arg("take")
        .arg("--candidate")
        .arg("Rafi")
        .arg("--config")
        .arg(&config)
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains("Resuming at question 3"));
}

#[tokio::test(flavor = "multi_thread")]
async fn unavailable_question_set_fails_to_start() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), &server.uri(), 3);

    examdesk()
        .arg("take")
        .arg("--candidate")
        .arg("Rafi")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("question set unavailable"))
        .stderr(predicate::str::contains("run `examdesk take` again"));

    assert!(persistence(dir.path()).load("Rafi").is_none());
}
