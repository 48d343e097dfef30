//! Blob Storage Abstraction
//!
//! Key/value persistence for audio blobs. Each entry carries the time it was
//! written so callers can apply age-based eviction.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::{BridgeError, Result};

/// A blob and the moment it was stored.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredBlob {
    pub data: Bytes,
    pub stored_at: DateTime<Utc>,
}

impl StoredBlob {
    pub fn new(data: Bytes, stored_at: DateTime<Utc>) -> Self {
        Self { data, stored_at }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Entry metadata returned by [`BlobStore::entries`], without the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobInfo {
    pub key: String,
    pub stored_at: DateTime<Utc>,
    pub size: u64,
}

/// Persistent blob store trait
///
/// Implementations:
/// - Desktop: one file per entry under the cache directory
/// - Web: IndexedDB object store
/// - Tests: [`MemoryBlobStore`]
///
/// Writes for different keys must not block each other. Writing an existing
/// key replaces the previous blob.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::{BlobStore, StoredBlob};
///
/// async fn remember(store: &dyn BlobStore, key: &str, data: Bytes) -> Result<()> {
///     store.put(key, StoredBlob::new(data, Utc::now())).await
/// }
/// ```
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Open the underlying storage. Called once before any other operation.
    async fn open(&self) -> Result<()>;

    /// Read an entry, `None` if the key was never stored or has been deleted.
    async fn get(&self, key: &str) -> Result<Option<StoredBlob>>;

    /// Insert or replace an entry.
    async fn put(&self, key: &str, blob: StoredBlob) -> Result<()>;

    /// Delete an entry. Returns `true` if something was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// List metadata for every stored entry.
    async fn entries(&self) -> Result<Vec<BlobInfo>>;

    /// Remove every entry.
    async fn clear(&self) -> Result<()> {
        for info in self.entries().await? {
            self.delete(&info.key).await?;
        }
        Ok(())
    }
}

/// In-memory blob store.
///
/// Contents do not survive the process. Can be constructed in a failing mode
/// to model storage that is unavailable on the host.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    entries: RwLock<HashMap<String, StoredBlob>>,
    unavailable: Option<String>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose `open` always fails with the given reason.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            unavailable: Some(reason.into()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn ensure_available(&self) -> Result<()> {
        match &self.unavailable {
            Some(reason) => Err(BridgeError::NotAvailable(reason.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn open(&self) -> Result<()> {
        self.ensure_available()
    }

    async fn get(&self, key: &str) -> Result<Option<StoredBlob>> {
        self.ensure_available()?;
        Ok(self.entries.read().get(key).cloned())
    }

    async fn put(&self, key: &str, blob: StoredBlob) -> Result<()> {
        self.ensure_available()?;
        self.entries.write().insert(key.to_string(), blob);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.ensure_available()?;
        Ok(self.entries.write().remove(key).is_some())
    }

    async fn entries(&self) -> Result<Vec<BlobInfo>> {
        self.ensure_available()?;
        Ok(self
            .entries
            .read()
            .iter()
            .map(|(key, blob)| BlobInfo {
                key: key.clone(),
                stored_at: blob.stored_at,
                size: blob.size(),
            })
            .collect())
    }

    async fn clear(&self) -> Result<()> {
        self.ensure_available()?;
        self.entries.write().clear();
        Ok(())
    }
}
