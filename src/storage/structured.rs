use std::io;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use sled::Transactional;
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult};

use super::{BackendKind, SCHEMA_VERSION, SnippetBackend, SortKey};
use crate::error::{Result, StoreError};
use crate::models::Snippet;

const RECORD_TREE: &str = "snippets";
const NAME_INDEX: &str = "idx_name";
const CREATED_INDEX: &str = "idx_createdAt";
const UPDATED_INDEX: &str = "idx_updatedAt";
const META_TREE: &str = "meta";
const SCHEMA_KEY: &str = "schema_version";

/// Snippet storage backed by sled.
///
/// Records live in one tree keyed by id. Each secondary index is its own
/// tree whose keys are the encoded field followed by the id and whose values
/// are the id, so entries are non-unique on the field and iterate in
/// `(field, id)` order.
pub struct SledBackend {
    db: sled::Db,
    records: sled::Tree,
    by_name: sled::Tree,
    by_created: sled::Tree,
    by_updated: sled::Tree,
}

impl SledBackend {
    /// Open (creating on first use) the database at `path`.
    ///
    /// A database held by another process is reported as `Locked`; every
    /// other failure as `BackendUnavailable`.
    pub fn open(path: &Path) -> Result<Self> {
        let db = sled::open(path).map_err(|e| {
            if is_lock_conflict(&e) {
                StoreError::Locked(path.display().to_string())
            } else {
                unavailable(e)
            }
        })?;
        Self::from_db(db)
    }

    pub fn from_db(db: sled::Db) -> Result<Self> {
        let meta = db.open_tree(META_TREE).map_err(unavailable)?;
        let stored = match meta.get(SCHEMA_KEY).map_err(unavailable)? {
            Some(raw) => Some(decode_version(&raw)?),
            None => None,
        };
        if let Some(version) = stored.filter(|v| *v > SCHEMA_VERSION) {
            return Err(StoreError::BackendUnavailable(format!(
                "database schema version {} is newer than supported version {}",
                version, SCHEMA_VERSION
            )));
        }

        let backend = Self {
            records: db.open_tree(RECORD_TREE).map_err(unavailable)?,
            by_name: db.open_tree(NAME_INDEX).map_err(unavailable)?,
            by_created: db.open_tree(CREATED_INDEX).map_err(unavailable)?,
            by_updated: db.open_tree(UPDATED_INDEX).map_err(unavailable)?,
            db,
        };

        if stored != Some(SCHEMA_VERSION) {
            if let Some(version) = stored {
                info!("sled: upgrading schema {} to {}", version, SCHEMA_VERSION);
                backend.rebuild_indexes().map_err(unavailable)?;
            }
            meta.insert(SCHEMA_KEY, SCHEMA_VERSION.to_be_bytes().to_vec())
                .map_err(unavailable)?;
            backend.db.flush().map_err(unavailable)?;
        }

        Ok(backend)
    }

    /// Regenerate every index entry from the records
    fn rebuild_indexes(&self) -> Result<()> {
        for tree in [&self.by_name, &self.by_created, &self.by_updated] {
            tree.clear()?;
        }
        for item in self.records.iter() {
            let (id, raw) = item?;
            let [name_key, created_key, updated_key] = index_keys(&decode(&raw)?);
            self.by_name.insert(name_key, id.clone())?;
            self.by_created.insert(created_key, id.clone())?;
            self.by_updated.insert(updated_key, id)?;
        }
        Ok(())
    }

    fn index(&self, key: SortKey) -> &sled::Tree {
        match key {
            SortKey::Name => &self.by_name,
            SortKey::CreatedAt => &self.by_created,
            SortKey::UpdatedAt => &self.by_updated,
        }
    }
}

fn unavailable(err: impl std::fmt::Display) -> StoreError {
    StoreError::BackendUnavailable(err.to_string())
}

// sled wraps the failed file lock in a generic io error
fn is_lock_conflict(err: &sled::Error) -> bool {
    match err {
        sled::Error::Io(e) => {
            e.kind() == io::ErrorKind::WouldBlock
                || e.to_string().contains("could not acquire lock")
        }
        _ => false,
    }
}

fn decode_version(raw: &[u8]) -> Result<u32> {
    let bytes: [u8; 4] = raw
        .try_into()
        .map_err(|_| unavailable("corrupt schema version"))?;
    Ok(u32::from_be_bytes(bytes))
}

/// Big-endian seconds with the sign bit flipped, then nanoseconds: fixed
/// width, and byte order is chronological for any representable instant
fn timestamp_key(ts: &DateTime<Utc>) -> Vec<u8> {
    let mut key = Vec::with_capacity(12);
    key.extend_from_slice(&((ts.timestamp() as u64) ^ (1 << 63)).to_be_bytes());
    key.extend_from_slice(&ts.timestamp_subsec_nanos().to_be_bytes());
    key
}

/// Escape `0x00` as `0x00 0xFF` and terminate with `0x00 0x00`, so a name
/// that is a prefix of another still sorts first regardless of the id
fn name_key(name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(name.len() + 2);
    for &byte in name.as_bytes() {
        key.push(byte);
        if byte == 0 {
            key.push(0xFF);
        }
    }
    key.extend_from_slice(&[0, 0]);
    key
}

fn index_key(mut field: Vec<u8>, id: &str) -> Vec<u8> {
    field.extend_from_slice(id.as_bytes());
    field
}

/// The three index keys of a record, in name/created/updated order
fn index_keys(snippet: &Snippet) -> [Vec<u8>; 3] {
    [
        index_key(name_key(&snippet.name), &snippet.id),
        index_key(timestamp_key(&snippet.created_at), &snippet.id),
        index_key(timestamp_key(&snippet.updated_at), &snippet.id),
    ]
}

fn decode(raw: &[u8]) -> Result<Snippet> {
    Ok(serde_json::from_slice(raw)?)
}

#[async_trait]
impl SnippetBackend for SledBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Structured
    }

    async fn get(&self, id: &str) -> Result<Option<Snippet>> {
        self.records
            .get(id.as_bytes())?
            .map(|raw| decode(&raw))
            .transpose()
    }

    async fn list(&self) -> Result<Vec<Snippet>> {
        self.records
            .iter()
            .map(|item| {
                let (_, raw) = item?;
                decode(&raw)
            })
            .collect()
    }

    async fn put(&self, snippet: &Snippet) -> Result<()> {
        let bytes = serde_json::to_vec(snippet)?;
        let [name_key, created_key, updated_key] = index_keys(snippet);

        (&self.records, &self.by_name, &self.by_created, &self.by_updated).transaction(
            |(records, by_name, by_created, by_updated)| -> ConflictableTransactionResult<(), serde_json::Error> {
                if let Some(old) = records.insert(snippet.id.as_bytes(), bytes.as_slice())? {
                    let old: Snippet =
                        serde_json::from_slice(&old).map_err(ConflictableTransactionError::Abort)?;
                    let [old_name, old_created, old_updated] = index_keys(&old);
                    by_name.remove(old_name)?;
                    by_created.remove(old_created)?;
                    by_updated.remove(old_updated)?;
                }

                by_name.insert(name_key.as_slice(), snippet.id.as_bytes())?;
                by_created.insert(created_key.as_slice(), snippet.id.as_bytes())?;
                by_updated.insert(updated_key.as_slice(), snippet.id.as_bytes())?;
                Ok(())
            },
        )?;

        self.db.flush()?;
        debug!("sled: stored snippet {}", snippet.id);
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        (&self.records, &self.by_name, &self.by_created, &self.by_updated).transaction(
            |(records, by_name, by_created, by_updated)| -> ConflictableTransactionResult<(), serde_json::Error> {
                if let Some(old) = records.remove(id.as_bytes())? {
                    let old: Snippet =
                        serde_json::from_slice(&old).map_err(ConflictableTransactionError::Abort)?;
                    let [old_name, old_created, old_updated] = index_keys(&old);
                    by_name.remove(old_name)?;
                    by_created.remove(old_created)?;
                    by_updated.remove(old_updated)?;
                }
                Ok(())
            },
        )?;

        self.db.flush()?;
        debug!("sled: removed snippet {}", id);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        for tree in [&self.records, &self.by_name, &self.by_created, &self.by_updated] {
            tree.clear()?;
        }
        self.db.flush()?;
        Ok(())
    }

    async fn list_sorted(&self, key: SortKey) -> Result<Vec<Snippet>> {
        let mut snippets = Vec::new();
        for item in self.index(key).iter() {
            let (_, id) = item?;
            // An index entry without a record would be a torn write; skip it.
            if let Some(raw) = self.records.get(&id)? {
                snippets.push(decode(&raw)?);
            }
        }
        Ok(snippets)
    }
}
