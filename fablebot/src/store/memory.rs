//! In-memory store, for tests and ephemeral runs.

use std::collections::HashMap;

use anyhow::Result;
use tokio::sync::Mutex;

use super::Store;

/// Store that keeps everything in a map and forgets it on drop.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.data.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.data.lock().await.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trip() {
        let store = MemoryStore::new();
        assert!(store.get("k").await.unwrap().is_none());
        store.set("k", b"v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().unwrap(), b"v");
    }
}
