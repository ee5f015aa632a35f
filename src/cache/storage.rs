/// Blob storage backends for the persistent tier
///
/// The persistent tier is a single JSON blob read and written whole. A
/// backend only moves that blob; parsing, versioning and eviction live in
/// the manager.
use crate::errors::{CacheError, CacheResult};
use parking_lot::Mutex;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Durable get/set of one serialized blob
///
/// Calls are synchronous and may block on IO; the async read path of
/// `TieredCache` runs them on tokio's blocking pool.
pub trait BlobStore: Send + Sync {
    /// `Ok(None)` when nothing has been stored yet
    fn load(&self) -> CacheResult<Option<String>>;

    /// Atomically replace the stored blob
    fn save(&self, blob: &str) -> CacheResult<()>;

    /// Delete the stored blob; succeeds when already absent
    fn remove(&self) -> CacheResult<()>;
}

/// Blob kept in a single JSON file
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    path: PathBuf,
}

impl FileBlobStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlobStore for FileBlobStore {
    fn load(&self) -> CacheResult<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::Io(e)),
        }
    }

    fn save(&self, blob: &str) -> CacheResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| {
            CacheError::StoreWriteFailure(format!(
                "Failed to create store directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        // Write to a sibling temp file and rename, so readers never see a partial blob
        let mut temp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| {
            CacheError::StoreWriteFailure(format!("Failed to create temp file: {}", e))
        })?;
        temp.write_all(blob.as_bytes())
            .and_then(|_| temp.flush())
            .map_err(|e| CacheError::StoreWriteFailure(format!("Failed to write store: {}", e)))?;
        temp.persist(&self.path).map_err(|e| {
            CacheError::StoreWriteFailure(format!(
                "Failed to replace {}: {}",
                self.path.display(),
                e.error
            ))
        })?;

        Ok(())
    }

    fn remove(&self) -> CacheResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io(e)),
        }
    }
}

/// In-process blob store for tests and ephemeral tools
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blob: Mutex<Option<String>>,
    fail_writes: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an existing blob (e.g. one written by an older version)
    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self {
            blob: Mutex::new(Some(blob.into())),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make every `save` fail, as a full quota would
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn contents(&self) -> Option<String> {
        self.blob.lock().clone()
    }
}

impl BlobStore for MemoryBlobStore {
    fn load(&self) -> CacheResult<Option<String>> {
        Ok(self.blob.lock().clone())
    }

    fn save(&self, blob: &str) -> CacheResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::StoreWriteFailure(
                "storage quota exceeded".to_string(),
            ));
        }
        *self.blob.lock() = Some(blob.to_string());
        Ok(())
    }

    fn remove(&self) -> CacheResult<()> {
        *self.blob.lock() = None;
        Ok(())
    }
}
