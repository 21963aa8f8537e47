use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::Result;
use crate::models::SnippetDraft;

/// Unsaved editor contents, kept in a single slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Autosave {
    pub html: String,
    pub css: String,
    pub js: String,
    pub timestamp: DateTime<Utc>,
}

impl Autosave {
    pub fn new(html: impl Into<String>, css: impl Into<String>, js: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            css: css.into(),
            js: js.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.timestamp).to_std().unwrap_or(Duration::ZERO)
    }

    /// The contents as a draft for `SnippetStore::save`
    pub fn to_draft(&self, name: impl Into<String>) -> SnippetDraft {
        SnippetDraft::new(name)
            .with_html(self.html.clone())
            .with_css(self.css.clone())
            .with_js(self.js.clone())
    }
}

/// File-backed autosave slot
#[derive(Debug, Clone)]
pub struct AutosaveSlot {
    path: PathBuf,
    max_age: Duration,
}

impl AutosaveSlot {
    pub fn new(path: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            path: path.into(),
            max_age,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the slot
    pub async fn write(&self, autosave: &Autosave) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&self.path, serde_json::to_string(autosave)?).await?;
        Ok(())
    }

    /// Whatever is in the slot, regardless of age. Unreadable content counts
    /// as an empty slot.
    pub async fn read(&self) -> Option<Autosave> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read autosave {}: {}", self.path.display(), e);
                return None;
            }
        };

        serde_json::from_str(&content)
            .map_err(|e| warn!("Ignoring corrupt autosave {}: {}", self.path.display(), e))
            .ok()
    }

    /// The autosave if it is recent enough to offer for restore
    pub async fn recoverable(&self) -> Option<Autosave> {
        self.recoverable_at(Utc::now()).await
    }

    pub async fn recoverable_at(&self, now: DateTime<Utc>) -> Option<Autosave> {
        self.read()
            .await
            .filter(|autosave| autosave.age(now) < self.max_age)
    }

    pub async fn discard(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
