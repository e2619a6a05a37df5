//! examdesk-store: Durable local storage for examdesk sessions.
//!
//! Implements [`examdesk_core::persistence::KeyValueStore`] on a plain
//! directory so a crashed or closed terminal can resume where it left off.

pub mod file;

pub use file::FileStore;
