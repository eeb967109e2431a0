//! JSON-file-backed store.
//!
//! The whole map lives in one pretty-printed JSON file, loaded at open and
//! rewritten atomically (tempfile + rename) on every `set`. Suits the small
//! per-author record counts this service sees; not a general database.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::sync::Mutex;

use super::Store;

/// Store backed by a single JSON file on disk.
pub struct FileStore {
    path: PathBuf,
    data: Mutex<BTreeMap<String, serde_json::Value>>,
}

impl FileStore {
    /// Open the store at `path`, creating parent directories as needed. A
    /// missing file is an empty store; a malformed file is an error rather
    /// than silent data loss.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let data = if path.exists() {
            let raw = std::fs::read(&path)
                .with_context(|| format!("failed to read store file {}", path.display()))?;
            serde_json::from_slice(&raw)
                .with_context(|| format!("store file {} is not valid JSON", path.display()))?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    fn write_out(path: &Path, data: &BTreeMap<String, serde_json::Value>) -> Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let raw = serde_json::to_vec_pretty(data).context("failed to serialize store")?;

        let tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
        std::fs::write(tmp.path(), raw).context("failed to write store temp file")?;
        tmp.persist(path)
            .with_context(|| format!("failed to replace store file {}", path.display()))?;
        Ok(())
    }
}

impl Store for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let data = self.data.lock().await;
        match data.get(key) {
            Some(value) => Ok(Some(serde_json::to_vec(value)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let value: serde_json::Value =
            serde_json::from_slice(value).context("store values must be JSON documents")?;

        let mut data = self.data.lock().await;
        data.insert(key.to_string(), value);
        Self::write_out(&self.path, &data)
    }
}
