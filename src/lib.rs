//! kithub - snippet store for an HTML/CSS/JS playground
//!
//! Snippets are named bundles of markup, style and script. They are kept in
//! an embedded sled database when one can be opened, and in a single JSON
//! file otherwise. Callers construct a [`SnippetStore`] once and share it;
//! which backend it uses is decided on first use and never changes.

pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod storage;

pub use config::{BackendPreference, Config, StoreConfig};
pub use error::{Result, StoreError};
pub use models::{Snippet, SnippetDraft, SnippetPatch};
pub use storage::{BackendKind, SnippetStore, SortKey, SortOrder, StoreStats};
