//! examdesk-client: Backend collaborators and configuration.
//!
//! Implements the `QuestionSource` and `SubmissionBackend` traits over HTTP,
//! loads `examdesk.toml`, and provides a scripted mock for tests.

pub mod config;
pub mod http;
pub mod mock;

pub use config::{load_config, load_config_from, ExamdeskConfig};
pub use http::HttpBackend;
pub use mock::MockBackend;
