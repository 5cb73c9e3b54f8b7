use async_trait::async_trait;

use crate::Result;

/// Hard ceiling on the bytes served by a single chunk read (5 MiB)
pub const MAX_CHUNK_LEN: u64 = 5 * 1024 * 1024;

/// Clamp a requested chunk length to `cap`, never above [`MAX_CHUNK_LEN`]
pub fn clamp_chunk_len(requested: u64, cap: u64) -> u64 {
    requested.min(cap).min(MAX_CHUNK_LEN)
}

/// File metadata returned by stat operations
#[derive(Debug, Clone)]
pub struct FileStat {
    /// `false` for directories and other non-regular entries
    pub is_file: bool,
    pub size: u64,
}

impl FileStat {
    pub const fn file(size: u64) -> Self {
        Self { is_file: true, size }
    }
}

/// Storage seam for the host file service
///
/// Implementations must open a fresh handle for every `read_chunk` and
/// release it before returning, on success and on error alike.
#[async_trait]
pub trait VfsBackend: Send + Sync {
    /// Get file metadata
    async fn stat(&self, path: &str) -> Result<FileStat>;

    /// Read up to `length` bytes starting at `offset`
    ///
    /// `length` is clamped to [`MAX_CHUNK_LEN`]. Fewer bytes come back at
    /// end of file; an offset past the end yields an empty buffer.
    async fn read_chunk(&self, path: &str, offset: u64, length: u64) -> Result<Vec<u8>>;

    /// Write entire file contents (create or overwrite)
    async fn write(&self, path: &str, data: &[u8]) -> Result<()>;
}
