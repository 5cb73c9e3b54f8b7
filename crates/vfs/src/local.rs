use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::backend::{clamp_chunk_len, FileStat, VfsBackend, MAX_CHUNK_LEN};
use super::error::{FsError, Result};

/// Local filesystem backend
///
/// Paths are absolute host paths, usually picked by the user through a
/// dialog. Blocking IO runs on the tokio blocking pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl LocalFs {
    pub const fn new() -> Self {
        Self
    }

    fn resolve(path: &str) -> Result<PathBuf> {
        if path.trim().is_empty() {
            return Err(FsError::InvalidArgument(format!("Invalid path: {path:?}")));
        }
        Ok(PathBuf::from(path))
    }
}

/// Positioned read against a handle that lives only for this call
fn read_range(path: &Path, offset: u64, length: u64) -> Result<Vec<u8>> {
    let display = path.display().to_string();
    let mut file = File::open(path).map_err(|e| FsError::from_io(&display, &e))?;
    let size = file
        .metadata()
        .map_err(|e| FsError::from_io(&display, &e))?
        .len();

    // Never allocate past the end of the file
    let want = length.min(size.saturating_sub(offset));
    if want == 0 {
        return Ok(Vec::new());
    }

    file.seek(SeekFrom::Start(offset))
        .map_err(|e| FsError::from_io(&display, &e))?;

    let mut buffer = Vec::with_capacity(usize::try_from(want).unwrap_or(0));
    file.take(want)
        .read_to_end(&mut buffer)
        .map_err(|e| FsError::from_io(&display, &e))?;
    Ok(buffer)
}

fn join_error(err: &tokio::task::JoinError) -> FsError {
    FsError::Io {
        path: String::new(),
        message: format!("blocking task failed: {err}"),
    }
}

#[async_trait]
impl VfsBackend for LocalFs {
    async fn stat(&self, path: &str) -> Result<FileStat> {
        let resolved = Self::resolve(path)?;
        let display = path.to_string();
        tokio::task::spawn_blocking(move || {
            let meta = fs::metadata(&resolved).map_err(|e| FsError::from_io(&display, &e))?;
            Ok(FileStat {
                is_file: meta.is_file(),
                size: meta.len(),
            })
        })
        .await
        .map_err(|e| join_error(&e))?
    }

    async fn read_chunk(&self, path: &str, offset: u64, length: u64) -> Result<Vec<u8>> {
        let resolved = Self::resolve(path)?;
        let length = clamp_chunk_len(length, MAX_CHUNK_LEN);
        let data = tokio::task::spawn_blocking(move || read_range(&resolved, offset, length))
            .await
            .map_err(|e| join_error(&e))??;
        tracing::trace!(path, offset, len = data.len(), "Read chunk");
        Ok(data)
    }

    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let resolved = Self::resolve(path)?;
        let display = path.to_string();
        let data = data.to_vec();
        let len = data.len();
        tokio::task::spawn_blocking(move || {
            fs::write(&resolved, data).map_err(|e| FsError::from_io(&display, &e))
        })
        .await
        .map_err(|e| join_error(&e))??;
        tracing::debug!(path, len, "Wrote file");
        Ok(())
    }
}
