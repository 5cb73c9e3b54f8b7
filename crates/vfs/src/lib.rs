//! Bounded file access for the firedoc host
//!
//! Every read is a positioned, capped read against a fresh handle, so any
//! number of reads of the same file may be in flight at once.

pub mod backend;
pub mod error;
pub mod local;
pub mod memory;

pub use backend::{clamp_chunk_len, FileStat, VfsBackend, MAX_CHUNK_LEN};
pub use error::{FsError, Result};
pub use local::LocalFs;
pub use memory::MemoryFs;
