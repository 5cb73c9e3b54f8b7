//! Sandboxed side of the firedoc bridge
//!
//! Holds no file handles of its own. Everything reaches disk through
//! [`BridgeClient`] invokes that the host validates and services.

pub mod client;
pub mod lifecycle;
pub mod transport;
pub mod ws;

pub use client::{BridgeClient, BridgeError, ClientConfig};
pub use lifecycle::{CloseOutcome, DocumentSource, HomeOutcome, LifecycleError, SaveOutcome, ViewerLifecycle};
pub use transport::{FileHandle, RangeError, RangeSink, RangeTransport};
pub use ws::{connect, Connection};
