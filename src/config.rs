//! Configuration
//!
//! Settings come from an optional `config.toml` in the user's config
//! directory; the CLI may override the data directory and backend.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::storage::{DB_NAME, FLAT_KEY};

const APP_DIR: &str = "kithub";
const CONFIG_FILE: &str = "config.toml";
const AUTOSAVE_FILE: &str = "autosave.json";

/// Drafts older than this are not offered for restore
pub const DEFAULT_AUTOSAVE_MAX_AGE_SECS: u64 = 60 * 60;

/// How long to wait for another process to release the database
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 2_000;

/// Whether the store may try the structured database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendPreference {
    /// Try the structured database, fall back to the flat file
    #[default]
    Auto,
    /// Never open the structured database
    Flat,
}

impl FromStr for BackendPreference {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(BackendPreference::Auto),
            "flat" => Ok(BackendPreference::Flat),
            other => Err(format!("unknown backend '{}', expected auto or flat", other)),
        }
    }
}

impl fmt::Display for BackendPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendPreference::Auto => write!(f, "auto"),
            BackendPreference::Flat => write!(f, "flat"),
        }
    }
}

/// Everything a `SnippetStore` needs to pick and open its backend
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub backend: BackendPreference,
    /// Upper bound on waiting for a database held by another process
    pub lock_timeout: Duration,
}

impl StoreConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            backend: BackendPreference::Auto,
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
        }
    }

    pub fn with_backend(mut self, backend: BackendPreference) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DB_NAME)
    }

    pub fn flat_path(&self) -> PathBuf {
        self.data_dir.join(FLAT_KEY)
    }

    pub fn autosave_path(&self) -> PathBuf {
        self.data_dir.join(AUTOSAVE_FILE)
    }
}

/// Contents of `config.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: Option<PathBuf>,
    pub backend: BackendPreference,
    pub autosave_max_age_secs: u64,
    pub lock_timeout_ms: u64,
    /// Template catalog used instead of the bundled one
    pub templates_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            backend: BackendPreference::Auto,
            autosave_max_age_secs: DEFAULT_AUTOSAVE_MAX_AGE_SECS,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            templates_file: None,
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load the config file at `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| StoreError::Config(e.to_string()))
    }

    pub fn autosave_max_age(&self) -> Duration {
        Duration::from_secs(self.autosave_max_age_secs)
    }

    /// Resolve the store settings, applying overrides from the command line
    pub fn store_config(
        &self,
        data_dir: Option<PathBuf>,
        backend: Option<BackendPreference>,
    ) -> Result<StoreConfig> {
        let data_dir = match data_dir.or_else(|| self.data_dir.clone()) {
            Some(dir) => dir,
            None => dirs::data_dir()
                .map(|dir| dir.join(APP_DIR))
                .ok_or_else(|| StoreError::Config("failed to get data directory".into()))?,
        };

        Ok(StoreConfig {
            data_dir,
            backend: backend.unwrap_or(self.backend),
            lock_timeout: Duration::from_millis(self.lock_timeout_ms),
        })
    }
}
