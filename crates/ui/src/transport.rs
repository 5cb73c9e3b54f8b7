//! Range transport
//!
//! Feeds the rendering engine byte ranges pulled from the host on demand,
//! so a document of any size opens without being read into memory.
//!
//! Ranges are independent: each carries its own `(begin, end)`, its own
//! cancellation token and its own deadline. Completion order is whatever
//! the host produces; every delivery is tagged with the range's `begin`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::client::{BridgeClient, BridgeError};

/// A document opened for ranged access
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    pub path: String,
    pub name: String,
    pub total_size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("invalid range {begin}..{end} for a {total}-byte document")]
    Invalid { begin: u64, end: u64, total: u64 },

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("range request timed out")]
    Timeout,

    #[error("range request aborted")]
    Aborted,
}

/// Rendering engine side of the transport
pub trait RangeSink: Send + Sync {
    /// Bytes for the range that started at `begin`
    fn on_data_range(&self, begin: u64, chunk: Vec<u8>);

    /// The range `[begin, end)` will never be delivered
    fn on_range_error(&self, begin: u64, end: u64, error: RangeError);
}

pub struct RangeTransport {
    client: Arc<BridgeClient>,
    file: FileHandle,
    sink: Arc<dyn RangeSink>,
    timeout: Duration,
    cancel: CancellationToken,
    in_flight: Arc<AtomicUsize>,
}

impl RangeTransport {
    /// Stat `path` through the bridge and prepare ranged access to it
    pub async fn open(
        client: Arc<BridgeClient>,
        path: &str,
        sink: Arc<dyn RangeSink>,
    ) -> Result<Self, BridgeError> {
        let meta = client.get_file_metadata(path).await?;
        tracing::info!(path, size = meta.size, "Document opened for ranged access");
        let timeout = client.config().range_timeout;
        Ok(Self {
            client,
            file: FileHandle {
                path: path.to_string(),
                name: meta.name,
                total_size: meta.size,
            },
            sink,
            timeout,
            cancel: CancellationToken::new(),
            in_flight: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub const fn file(&self) -> &FileHandle {
        &self.file
    }

    pub const fn length(&self) -> u64 {
        self.file.total_size
    }

    /// Seed buffer handed to the engine; always empty, everything is pulled
    pub const fn initial_data(&self) -> Vec<u8> {
        Vec::new()
    }

    /// Ranges requested but not yet delivered or failed
    pub fn pending_count(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Start fetching `[begin, end)` and return immediately
    ///
    /// Exactly one of `on_data_range` or `on_range_error` fires for every
    /// call. Must be called from within a tokio runtime.
    pub fn request_data_range(&self, begin: u64, end: u64) {
        let total = self.file.total_size;
        if end < begin || end > total {
            tracing::warn!(begin, end, total, "Rejecting invalid range");
            self.sink
                .on_range_error(begin, end, RangeError::Invalid { begin, end, total });
            return;
        }
        if begin == end {
            self.sink.on_data_range(begin, Vec::new());
            return;
        }
        if self.cancel.is_cancelled() {
            self.sink.on_range_error(begin, end, RangeError::Aborted);
            return;
        }

        let client = self.client.clone();
        let sink = self.sink.clone();
        let path = self.file.path.clone();
        let token = self.cancel.child_token();
        let deadline = self.timeout;
        let in_flight = InFlight::enter(&self.in_flight);

        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                () = token.cancelled() => Err(RangeError::Aborted),
                fetched = tokio::time::timeout(deadline, fetch_range(&client, &path, begin, end)) => {
                    match fetched {
                        Ok(Ok(data)) => Ok(data),
                        Ok(Err(e)) => Err(RangeError::Bridge(e)),
                        Err(_) => Err(RangeError::Timeout),
                    }
                }
            };

            drop(in_flight);
            match result {
                Ok(data) => sink.on_data_range(begin, data),
                Err(error) => {
                    tracing::warn!(path = %path, begin, end, error = %error, "Range request failed");
                    sink.on_range_error(begin, end, error);
                }
            }
        });
    }

    /// Cancel every outstanding range; later requests fail with `Aborted`
    pub fn abort(&self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!(path = %self.file.path, pending = self.pending_count(), "Aborting range transport");
            self.cancel.cancel();
        }
    }
}

impl Drop for RangeTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Read `[begin, end)` in as many host reads as the chunk cap requires
async fn fetch_range(client: &BridgeClient, path: &str, begin: u64, end: u64) -> Result<Vec<u8>, BridgeError> {
    let capacity = usize::try_from(end - begin).unwrap_or(0);
    let mut data = Vec::with_capacity(capacity);
    let mut offset = begin;
    while offset < end {
        let remaining = end - offset;
        let mut chunk = client.read_file_chunk(path, offset, remaining).await?;
        if chunk.is_empty() {
            // File shrank underneath us
            break;
        }
        chunk.truncate(usize::try_from(remaining).unwrap_or(usize::MAX));
        offset += chunk.len() as u64;
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

/// Counts a range as in flight until dropped
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
