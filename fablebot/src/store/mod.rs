//! Persistent key-value storage for author records.
//!
//! The store is the external persistence collaborator: opaque string keys
//! mapped to JSON documents, one key per author. Two implementations are
//! provided, a JSON-file-backed store for production and an in-memory store
//! for tests.

mod file;
#[cfg(test)]
mod memory;

use std::future::Future;

use anyhow::Result;

pub use file::FileStore;
#[cfg(test)]
pub use memory::MemoryStore;

/// Namespace prefix for every key written by this service.
const KEY_PREFIX: &str = "dev.fablebot";

/// Storage key for one author's record.
pub fn author_key(author_id: &str) -> String {
    format!("{KEY_PREFIX}.author.{author_id}")
}

/// Key-value storage over opaque keys and JSON document values.
pub trait Store: Send + Sync + 'static {
    /// Fetch the value stored under `key`, if any.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Store `value` under `key`, replacing any previous value. The write
    /// must be durable before this returns.
    fn set(&self, key: &str, value: &[u8]) -> impl Future<Output = Result<()>> + Send;
}
