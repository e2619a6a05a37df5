//! HTTP collaborator: question-set fetch, exam-type resolution and result submission.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use examdesk_core::error::{StartupError, SubmissionError};
use examdesk_core::model::Question;
use examdesk_core::pipeline::{Submission, SubmissionReceipt};
use examdesk_core::traits::{LoadedQuestions, QuestionSource, SubmissionBackend};

use crate::config::BackendSettings;

/// Talks to the exam backend over HTTP.
pub struct HttpBackend {
    base_url: String,
    questions_path: String,
    submit_path: String,
    exam_config_path: Option<String>,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(settings: &BackendSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            questions_path: settings.questions_path.clone(),
            submit_path: settings.submit_path.clone(),
            exam_config_path: settings.exam_config_path.clone(),
            timeout_secs: settings.timeout_secs,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    /// Ask the backend which question file is active.
    ///
    /// Any failure falls back to `None`, meaning the configured default file.
    #[instrument(skip(self))]
    pub async fn resolve_question_file(&self, config_path: &str) -> Option<String> {
        let response = match self
            .client
            .get(self.url(config_path))
            .header("cache-control", "no-store")
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::warn!(status = r.status().as_u16(), "exam config unavailable, using default question file");
                return None;
            }
            Err(e) => {
                tracing::warn!("exam config request failed, using default question file: {e}");
                return None;
            }
        };

        let config: ExamConfigResponse = match response.json().await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("exam config is malformed, using default question file: {e}");
                return None;
            }
        };

        let file = config
            .types
            .get(&config.current_type)
            .and_then(|v| serde_json::from_value::<ExamType>(v.clone()).ok())
            .map(|t| t.question_file)
            .filter(|f| !f.trim().is_empty());
        match &file {
            Some(f) => tracing::info!(exam_type = %config.current_type, file = %f, "resolved question file"),
            None => tracing::warn!(exam_type = %config.current_type, "exam type has no question file"),
        }
        file
    }

    fn classify(&self, e: reqwest::Error) -> SubmissionError {
        if e.is_timeout() {
            SubmissionError::Timeout(self.timeout_secs)
        } else {
            SubmissionError::Network(e.to_string())
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExamConfigResponse {
    current_type: String,
    #[serde(flatten)]
    types: HashMap<String, serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExamType {
    question_file: String,
}

#[async_trait]
impl QuestionSource for HttpBackend {
    #[instrument(skip(self))]
    async fn fetch_questions(&self) -> Result<LoadedQuestions, StartupError> {
        let resolved = match &self.exam_config_path {
            Some(path) => self.resolve_question_file(path).await,
            None => None,
        };
        let file = resolved.unwrap_or_else(|| self.questions_path.clone());
        let url = self.url(&file);

        let response = self
            .client
            .get(&url)
            .header("cache-control", "no-store")
            .send()
            .await
            .map_err(|e| StartupError::Unavailable(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StartupError::Unavailable(format!(
                "HTTP {} from {url}",
                status.as_u16()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| StartupError::Unavailable(format!("{url}: {e}")))?;
        let questions: Vec<Question> =
            serde_json::from_str(&body).map_err(|e| StartupError::Malformed(e.to_string()))?;

        tracing::debug!(count = questions.len(), file = %file, "fetched question set");
        Ok(LoadedQuestions {
            source_file: Some(file),
            questions,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptBody {
    #[serde(default)]
    saved_name: Option<String>,
    #[serde(default)]
    was_renamed: bool,
}

#[async_trait]
impl SubmissionBackend for HttpBackend {
    #[instrument(skip(self, submission), fields(submission = %submission.id))]
    async fn submit(&self, submission: &Submission) -> Result<SubmissionReceipt, SubmissionError> {
        let response = self
            .client
            .post(self.url(&self.submit_path))
            .header("Idempotency-Key", submission.id.to_string())
            .json(&submission.payload)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(SubmissionError::Rejected {
                status: status.as_u16(),
                message: body,
            });
        }

        // Any 2xx is success, even when the body is not the expected JSON.
        let receipt = match serde_json::from_str::<ReceiptBody>(&body) {
            Ok(r) => SubmissionReceipt {
                saved_name: r.saved_name,
                was_renamed: r.was_renamed,
            },
            Err(e) => {
                tracing::debug!("unrecognised success body: {e}");
                SubmissionReceipt::default()
            }
        };
        if receipt.was_renamed {
            tracing::info!(saved_name = ?receipt.saved_name, "backend stored the result under a new name");
        }
        Ok(receipt)
    }
}
