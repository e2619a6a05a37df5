//! examdesk-core: Exam session engine.
//!
//! Question navigation, the exam countdown, autosave and resume, scoring with
//! negative marking, and the retrying submission pipeline. Network and storage
//! collaborators are reached only through the traits in [`traits`] and
//! [`persistence::KeyValueStore`].

pub mod error;
pub mod model;
pub mod navigator;
pub mod parser;
pub mod persistence;
pub mod pipeline;
pub mod scoring;
pub mod session;
pub mod timer;
pub mod traits;
