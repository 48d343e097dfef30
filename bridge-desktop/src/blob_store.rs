//! File-backed blob store using Tokio
//!
//! Every entry is two files under the store root: `<digest>.blob` with the raw
//! payload and `<digest>.meta.json` with the key, write time and size. The
//! digest is the SHA-256 of the key, so arbitrary track ids map to safe file
//! names and writes for different keys never touch the same file.
//!
//! Payloads are written first and metadata last, each through a temp file.
//! A crash can leave a temp file or a payload with no metadata behind; those
//! are not entries and are swept when the store is opened.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{BlobInfo, BlobStore, StoredBlob},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

const BLOB_EXTENSION: &str = "blob";
const META_SUFFIX: &str = ".meta.json";
const TMP_MARKER: &str = ".tmp-";

#[derive(Debug, Serialize, Deserialize)]
struct BlobMeta {
    key: String,
    stored_at: DateTime<Utc>,
    size: u64,
}

/// Default cache root for the desktop player.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("flacstore")
        .join("tracks")
}

/// Default directory downloaded tracks are written to.
pub fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Tokio-based blob store rooted at a directory
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    /// Create a store under the platform cache directory
    pub fn new() -> Self {
        Self::with_root(default_cache_dir())
    }

    /// Create a store rooted at a custom directory
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn digest(key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn blob_path(&self, digest: &str) -> PathBuf {
        self.root.join(format!("{}.{}", digest, BLOB_EXTENSION))
    }

    fn meta_path(&self, digest: &str) -> PathBuf {
        self.root.join(format!("{}{}", digest, META_SUFFIX))
    }

    async fn read_meta(path: &Path) -> Result<Option<BlobMeta>> {
        match fs::read(path).await {
            Ok(raw) => match serde_json::from_slice::<BlobMeta>(&raw) {
                Ok(meta) => Ok(Some(meta)),
                Err(e) => {
                    warn!(path = ?path, error = %e, "Ignoring unreadable blob metadata");
                    Ok(None)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BridgeError::Io(e)),
        }
    }

    async fn remove_if_present(path: &Path) -> Result<bool> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BridgeError::Io(e)),
        }
    }

    /// Write to a sibling temp file and rename over the target.
    async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
        let tmp = path.with_extension(format!(
            "{}{}",
            TMP_MARKER.trim_start_matches('.'),
            uuid::Uuid::new_v4().simple()
        ));
        fs::write(&tmp, data).await?;
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(BridgeError::Io(e));
        }
        Ok(())
    }

    /// Delete temp files and payloads without metadata. Returns how many
    /// files went.
    async fn sweep_orphans(&self) -> Result<usize> {
        let mut names = HashSet::new();
        let mut read_dir = fs::read_dir(&self.root).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            if let Ok(name) = entry.file_name().into_string() {
                names.insert(name);
            }
        }

        let blob_suffix = format!(".{}", BLOB_EXTENSION);
        let mut removed = 0;
        for name in &names {
            let orphan = if name.contains(TMP_MARKER) {
                true
            } else if let Some(digest) = name.strip_suffix(blob_suffix.as_str()) {
                !names.contains(&format!("{}{}", digest, META_SUFFIX))
            } else {
                false
            };
            if orphan && Self::remove_if_present(&self.root.join(name)).await? {
                debug!(file = %name, "Removed orphaned cache file");
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl Default for FileBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn open(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await.map_err(|e| {
            BridgeError::Storage(format!(
                "cannot create cache directory {}: {}",
                self.root.display(),
                e
            ))
        })?;

        let metadata = fs::metadata(&self.root).await?;
        if metadata.permissions().readonly() {
            return Err(BridgeError::Storage(format!(
                "cache directory {} is read-only",
                self.root.display()
            )));
        }

        let removed = self.sweep_orphans().await?;
        if removed > 0 {
            info!(path = ?self.root, removed, "Swept interrupted cache writes");
        }
        debug!(path = ?self.root, "Opened blob store");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredBlob>> {
        let digest = Self::digest(key);
        let Some(meta) = Self::read_meta(&self.meta_path(&digest)).await? else {
            return Ok(None);
        };

        let data = match fs::read(self.blob_path(&digest)).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(key, "Blob metadata without payload, discarding");
                Self::remove_if_present(&self.meta_path(&digest)).await?;
                return Ok(None);
            }
            Err(e) => return Err(BridgeError::Io(e)),
        };

        if meta.key != key || data.len() as u64 != meta.size {
            warn!(key, expected = meta.size, actual = data.len(), "Blob entry is inconsistent, discarding");
            self.delete(key).await?;
            return Ok(None);
        }

        debug!(key, size = data.len(), "Read blob");
        Ok(Some(StoredBlob::new(Bytes::from(data), meta.stored_at)))
    }

    async fn put(&self, key: &str, blob: StoredBlob) -> Result<()> {
        let digest = Self::digest(key);
        let meta = BlobMeta {
            key: key.to_string(),
            stored_at: blob.stored_at,
            size: blob.size(),
        };
        let meta_json = serde_json::to_vec(&meta)
            .map_err(|e| BridgeError::OperationFailed(format!("metadata encoding failed: {}", e)))?;

        Self::write_atomic(&self.blob_path(&digest), &blob.data).await?;
        Self::write_atomic(&self.meta_path(&digest), &meta_json).await?;

        debug!(key, size = blob.size(), "Wrote blob");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let digest = Self::digest(key);
        let meta_removed = Self::remove_if_present(&self.meta_path(&digest)).await?;
        let blob_removed = Self::remove_if_present(&self.blob_path(&digest)).await?;
        Ok(meta_removed || blob_removed)
    }

    async fn entries(&self) -> Result<Vec<BlobInfo>> {
        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(&self.root).await?;

        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            let is_meta = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(META_SUFFIX));
            if !is_meta {
                continue;
            }

            if let Some(meta) = Self::read_meta(&path).await? {
                entries.push(BlobInfo {
                    key: meta.key,
                    stored_at: meta.stored_at,
                    size: meta.size,
                });
            }
        }

        debug!(path = ?self.root, count = entries.len(), "Listed blob entries");
        Ok(entries)
    }
}
