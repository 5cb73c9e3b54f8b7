//! In-memory filesystem backend for testing
//!
//! Provides a fast, ephemeral store that exists only in memory, plus a
//! deny list for exercising permission failures without touching disk.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use super::backend::{clamp_chunk_len, FileStat, VfsBackend, MAX_CHUNK_LEN};
use super::error::{FsError, Result};

/// In-memory filesystem backend
///
/// Thread-safe via internal `RwLock`.
#[derive(Debug, Default)]
pub struct MemoryFs {
    files: RwLock<HashMap<String, Vec<u8>>>,
    denied: RwLock<HashSet<String>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with initial file contents
    pub fn with_files(files: Vec<(&str, &[u8])>) -> Self {
        let fs = Self::new();
        {
            let mut map = fs.files.write().unwrap_or_else(PoisonError::into_inner);
            for (path, content) in files {
                map.insert(path.to_string(), content.to_vec());
            }
        }
        fs
    }

    /// Make every operation on `path` fail with `PermissionDenied`
    pub fn deny(&self, path: &str) {
        self.denied
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string());
    }

    /// Current contents of `path`, if any
    pub fn contents(&self, path: &str) -> Option<Vec<u8>> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    pub fn file_count(&self) -> usize {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn check(&self, path: &str) -> Result<()> {
        if path.trim().is_empty() {
            return Err(FsError::InvalidArgument(format!("Invalid path: {path:?}")));
        }
        if self
            .denied
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(path)
        {
            return Err(FsError::PermissionDenied(path.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl VfsBackend for MemoryFs {
    async fn stat(&self, path: &str) -> Result<FileStat> {
        self.check(path)?;
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .map(|data| FileStat::file(data.len() as u64))
            .ok_or_else(|| FsError::NotFound(path.to_string()))
    }

    async fn read_chunk(&self, path: &str, offset: u64, length: u64) -> Result<Vec<u8>> {
        self.check(path)?;
        let length = clamp_chunk_len(length, MAX_CHUNK_LEN);
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        let data = files
            .get(path)
            .ok_or_else(|| FsError::NotFound(path.to_string()))?;

        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
        let len = usize::try_from(length).unwrap_or(usize::MAX);
        let end = start.saturating_add(len).min(data.len());
        Ok(data[start..end].to_vec())
    }

    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        self.check(path)?;
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string(), data.to_vec());
        Ok(())
    }
}
