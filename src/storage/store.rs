use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::OnceCell;
use tokio::time::{Instant, sleep};

use super::{BackendKind, FlatFileBackend, SledBackend, SnippetBackend, SortKey, SortOrder};
use crate::config::{BackendPreference, StoreConfig};
use crate::error::{Result, StoreError};
use crate::models::{Snippet, SnippetDraft, SnippetPatch, next_timestamp};

/// Usage statistics reported by [`SnippetStore::stats`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total: usize,
    pub backend: BackendKind,
    /// Byte length of the whole collection serialized as compact JSON
    pub total_size: usize,
}

/// Asynchronous snippet store.
///
/// The backend is chosen on first use and kept for the lifetime of the
/// store. Operations issued while that choice is still being made wait for
/// it instead of failing. A database locked by another process is not a
/// reason to fall back: the store waits up to `lock_timeout`, then the
/// operation fails with `Locked` and the next one tries again.
pub struct SnippetStore {
    config: StoreConfig,
    backend: OnceCell<Box<dyn SnippetBackend>>,
}

impl SnippetStore {
    /// Create a store; the backend is opened lazily
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            backend: OnceCell::new(),
        }
    }

    /// Create a store and wait for its backend
    pub async fn open(config: StoreConfig) -> Result<Self> {
        let store = Self::new(config);
        store.ready().await?;
        Ok(store)
    }

    /// Build a store around an already opened backend
    pub fn with_backend(config: StoreConfig, backend: Box<dyn SnippetBackend>) -> Self {
        Self {
            config,
            backend: OnceCell::new_with(Some(backend)),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Wait until the backend is selected and return which one it is
    pub async fn ready(&self) -> Result<BackendKind> {
        Ok(self.backend().await?.kind())
    }

    async fn backend(&self) -> Result<&dyn SnippetBackend> {
        let backend = self
            .backend
            .get_or_try_init(|| select_backend(&self.config))
            .await?;
        Ok(&**backend)
    }

    /// Insert or overwrite a snippet.
    ///
    /// A missing id is generated, `created_at` is kept when supplied and
    /// `updated_at` is set to now.
    pub async fn save(&self, draft: SnippetDraft) -> Result<Snippet> {
        let snippet = draft.stamp(Utc::now());
        self.backend().await?.put(&snippet).await?;
        debug!("Saved snippet {} ({})", snippet.id, snippet.name);
        Ok(snippet)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Snippet>> {
        self.backend().await?.get(id).await
    }

    /// Every snippet, ordered by id
    pub async fn get_all(&self) -> Result<Vec<Snippet>> {
        self.backend().await?.list().await
    }

    /// Every snippet ordered by one of the indexed fields, ties broken by id
    pub async fn list_sorted(&self, key: SortKey, order: SortOrder) -> Result<Vec<Snippet>> {
        let mut snippets = self.backend().await?.list_sorted(key).await?;
        if order == SortOrder::Descending {
            snippets.reverse();
        }
        Ok(snippets)
    }

    /// Merge `patch` into the stored snippet `id`.
    ///
    /// The id never changes and `updated_at` always moves forward.
    pub async fn update(&self, id: &str, patch: SnippetPatch) -> Result<Snippet> {
        let backend = self.backend().await?;
        let current = backend
            .get(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let snippet = current
            .merged_with(patch)
            .stamp(next_timestamp(current.updated_at));
        backend.put(&snippet).await?;
        debug!("Updated snippet {}", snippet.id);
        Ok(snippet)
    }

    /// Remove a snippet. Unknown ids are not an error.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.backend().await?.remove(id).await?;
        debug!("Deleted snippet {}", id);
        Ok(true)
    }

    pub async fn clear(&self) -> Result<bool> {
        self.backend().await?.clear().await?;
        info!("Cleared all snippets");
        Ok(true)
    }

    /// Pretty-printed JSON array of every snippet
    pub async fn export_all(&self) -> Result<String> {
        let snippets = self.get_all().await?;
        Ok(serde_json::to_string_pretty(&snippets)?)
    }

    /// Save every snippet of an exported JSON array.
    ///
    /// The whole payload is validated before anything is written: anything
    /// other than an array of objects, including non-object elements such as
    /// `[1, 2]`, fails with `Format`. Ids in the payload are kept; missing
    /// ones are generated.
    pub async fn import_all(&self, text: &str) -> Result<Vec<Snippet>> {
        let drafts = parse_import(text)?;

        let mut saved = Vec::with_capacity(drafts.len());
        for draft in drafts {
            saved.push(self.save(draft).await?);
        }

        info!("Imported {} snippets", saved.len());
        Ok(saved)
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        let backend = self.backend().await?;
        let snippets = backend.list().await?;

        Ok(StoreStats {
            total: snippets.len(),
            backend: backend.kind(),
            total_size: serde_json::to_string(&snippets)?.len(),
        })
    }
}

fn parse_import(text: &str) -> Result<Vec<SnippetDraft>> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| StoreError::Format(e.to_string()))?;

    let Value::Array(items) = value else {
        return Err(StoreError::Format("expected a JSON array of snippets".into()));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value(item)
                .map_err(|e| StoreError::Format(format!("entry {}: {}", index, e)))
        })
        .collect()
}

/// Pick the backend for a store. Once picked it is never revisited.
async fn select_backend(config: &StoreConfig) -> Result<Box<dyn SnippetBackend>> {
    let flat = || Box::new(FlatFileBackend::new(config.flat_path())) as Box<dyn SnippetBackend>;

    if config.backend == BackendPreference::Flat {
        info!("Using flat file storage at {}", config.flat_path().display());
        return Ok(flat());
    }

    if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
        warn!("{}; falling back to flat file storage", e);
        return Ok(flat());
    }

    match open_structured(config).await {
        Ok(backend) => {
            info!("Using structured storage at {}", config.database_path().display());
            Ok(Box::new(backend))
        }
        Err(e @ StoreError::Locked(_)) => Err(e),
        Err(e) => {
            warn!("{}; falling back to flat file storage", e);
            Ok(flat())
        }
    }
}

/// Open the database, backing off while another process holds its lock
async fn open_structured(config: &StoreConfig) -> Result<SledBackend> {
    let path = config.database_path();
    let deadline = Instant::now() + config.lock_timeout;
    let mut delay = Duration::from_millis(20);

    loop {
        match SledBackend::open(&path) {
            Err(StoreError::Locked(_)) if Instant::now() < deadline => {
                debug!("{} is locked, retrying in {:?}", path.display(), delay);
                sleep(delay).await;
                delay = (delay * 2).min(Duration::from_millis(320));
            }
            result => return result,
        }
    }
}
