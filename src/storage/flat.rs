use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, warn};
use tokio::fs;
use tokio::sync::Mutex;

use super::{BackendKind, SnippetBackend};
use crate::error::Result;
use crate::models::Snippet;

/// Fallback storage: the whole collection serialized as one JSON array.
///
/// A missing file is an empty collection. So is a file that cannot be read
/// or parsed; that case is logged and the next write replaces it.
pub struct FlatFileBackend {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FlatFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Vec<Snippet> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("Failed to read {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };

        match serde_json::from_str(&content) {
            Ok(snippets) => snippets,
            Err(e) => {
                warn!(
                    "Ignoring unreadable snippet file {}: {}",
                    self.path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    async fn write_all(&self, snippets: &[Snippet]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string(snippets)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl SnippetBackend for FlatFileBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Flat
    }

    async fn get(&self, id: &str) -> Result<Option<Snippet>> {
        Ok(self.read_all().await.into_iter().find(|s| s.id == id))
    }

    async fn list(&self) -> Result<Vec<Snippet>> {
        let mut snippets = self.read_all().await;
        snippets.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(snippets)
    }

    async fn put(&self, snippet: &Snippet) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut snippets = self.read_all().await;

        match snippets.iter_mut().find(|s| s.id == snippet.id) {
            Some(existing) => *existing = snippet.clone(),
            None => snippets.push(snippet.clone()),
        }

        self.write_all(&snippets).await?;
        debug!("flat: stored snippet {}", snippet.id);
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut snippets = self.read_all().await;
        snippets.retain(|s| s.id != id);
        self.write_all(&snippets).await
    }

    async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
