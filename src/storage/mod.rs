//! Snippet persistence
//!
//! A [`SnippetStore`] owns exactly one [`SnippetBackend`], picked the first
//! time the store is used:
//!
//! - **`structured`**: an embedded sled database with secondary indexes
//! - **`flat`**: a single JSON file holding the whole collection
//!
//! Defaulting, merging and timestamp rules live in the store, so both
//! backends only ever see complete records.

pub mod flat;
pub mod store;
pub mod structured;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::Snippet;

pub use flat::FlatFileBackend;
pub use store::{SnippetStore, StoreStats};
pub use structured::SledBackend;

/// Directory name of the sled database inside the data directory
pub const DB_NAME: &str = "kithub-db";
/// File name of the flat backend inside the data directory
pub const FLAT_KEY: &str = "kithub_snippets.json";
/// Layout version recorded in the structured database. Version 2 changed
/// the index key encoding.
pub const SCHEMA_VERSION: u32 = 2;

/// Which storage medium a store instance is using
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Structured,
    Flat,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Structured => write!(f, "structured (sled)"),
            BackendKind::Flat => write!(f, "flat (json file)"),
        }
    }
}

/// Fields that carry a secondary index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortKey {
    Name,
    CreatedAt,
    UpdatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortKey {
    /// Order two snippets by this key, ties broken by id
    pub fn compare(&self, a: &Snippet, b: &Snippet) -> std::cmp::Ordering {
        let primary = match self {
            SortKey::Name => a.name.cmp(&b.name),
            SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            SortKey::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

impl std::str::FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "name" => Ok(SortKey::Name),
            "created" | "createdat" | "created_at" => Ok(SortKey::CreatedAt),
            "updated" | "updatedat" | "updated_at" => Ok(SortKey::UpdatedAt),
            other => Err(format!("unknown sort key: {}", other)),
        }
    }
}

/// Raw record storage. Implementations must be thread-safe.
///
/// `put` receives fully stamped snippets and overwrites by id.
#[async_trait]
pub trait SnippetBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn get(&self, id: &str) -> Result<Option<Snippet>>;

    /// Every stored snippet, ordered by id
    async fn list(&self) -> Result<Vec<Snippet>>;

    async fn put(&self, snippet: &Snippet) -> Result<()>;

    /// Removing an id that is not stored is not an error
    async fn remove(&self, id: &str) -> Result<()>;

    async fn clear(&self) -> Result<()>;

    /// Every stored snippet in ascending `key` order
    async fn list_sorted(&self, key: SortKey) -> Result<Vec<Snippet>> {
        let mut snippets = self.list().await?;
        snippets.sort_by(|a, b| key.compare(a, b));
        Ok(snippets)
    }
}
