//! `examdesk.toml` loading and validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use examdesk_core::pipeline::RetryPolicy;
use examdesk_core::scoring::MarkingScheme;
use examdesk_core::session::ExamConfig;

/// Where the backend lives and which resources to use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Base URL; `${VAR}` references are resolved from the environment.
    pub base_url: String,
    /// Question-set resource, relative to `base_url` or absolute.
    pub questions_path: String,
    /// Result submission endpoint.
    pub submit_path: String,
    /// Optional exam-type endpoint that names the active question file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exam_config_path: Option<String>,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            questions_path: "questions.json".to_string(),
            submit_path: "api/save-answer".to_string(),
            exam_config_path: None,
            timeout_secs: 15,
        }
    }
}

/// Duration and marking scheme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExamSettings {
    pub duration_secs: u64,
    pub mark_per_question: f64,
    pub negative_marking: f64,
    pub pass_mark: f64,
}

impl Default for ExamSettings {
    fn default() -> Self {
        let marking = MarkingScheme::default();
        Self {
            duration_secs: 3600,
            mark_per_question: marking.mark_per_question,
            negative_marking: marking.negative_marking,
            pass_mark: marking.pass_mark,
        }
    }
}

/// Submission retry schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

/// Top-level examdesk configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamdeskConfig {
    #[serde(default)]
    pub backend: BackendSettings,
    #[serde(default)]
    pub exam: ExamSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    /// Directory for saved sessions and pending results.
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("./examdesk-sessions")
}

impl Default for ExamdeskConfig {
    fn default() -> Self {
        Self {
            backend: BackendSettings::default(),
            exam: ExamSettings::default(),
            retry: RetrySettings::default(),
            store_dir: default_store_dir(),
        }
    }
}

impl ExamdeskConfig {
    pub fn exam_config(&self) -> ExamConfig {
        ExamConfig {
            duration_secs: self.exam.duration_secs,
            marking: self.marking_scheme(),
        }
    }

    pub fn marking_scheme(&self) -> MarkingScheme {
        MarkingScheme {
            mark_per_question: self.exam.mark_per_question,
            negative_marking: self.exam.negative_marking,
            pass_mark: self.exam.pass_mark,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_delay: Duration::from_millis(self.retry.max_delay_ms),
        }
    }

    /// Reject settings the session engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.exam.duration_secs == 0 {
            anyhow::bail!("exam.duration_secs must be greater than 0");
        }
        for (name, value) in [
            ("exam.mark_per_question", self.exam.mark_per_question),
            ("exam.negative_marking", self.exam.negative_marking),
            ("exam.pass_mark", self.exam.pass_mark),
        ] {
            if !value.is_finite() || value < 0.0 {
                anyhow::bail!("{name} must be a non-negative number, got {value}");
            }
        }
        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            anyhow::bail!(
                "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.retry.base_delay_ms,
                self.retry.max_delay_ms
            );
        }
        if self.backend.base_url.trim().is_empty() {
            anyhow::bail!("backend.base_url is empty");
        }
        Ok(())
    }

    /// Render as TOML, for `examdesk init`.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to render config")
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
///
/// Unset variables resolve to the empty string.
pub fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        let var_name = &rest[start + 2..start + len];
        result.push_str(&rest[..start]);
        // Substituted values are not scanned again.
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + len + 1..];
    }
    result.push_str(rest);
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `examdesk.toml` in the current directory
/// 2. `~/.config/examdesk/config.toml`
///
/// Environment variable overrides: `EXAMDESK_BASE_URL`, `EXAMDESK_STORE_DIR`.
pub fn load_config() -> Result<ExamdeskConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ExamdeskConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("examdesk.toml");
            if local.exists() {
                Some(local)
            } else {
                global_config_path().filter(|p| p.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config");
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<ExamdeskConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ExamdeskConfig::default(),
    };

    apply_overrides(&mut config, |name| std::env::var(name).ok());
    config.backend.base_url = resolve_env_vars(&config.backend.base_url);
    Ok(config)
}

fn apply_overrides(config: &mut ExamdeskConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup("EXAMDESK_BASE_URL") {
        config.backend.base_url = url;
    }
    if let Some(dir) = lookup("EXAMDESK_STORE_DIR") {
        config.store_dir = PathBuf::from(dir);
    }
}

fn global_config_path() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(|h| {
        PathBuf::from(h)
            .join(".config")
            .join("examdesk")
            .join("config.toml")
    })
}
