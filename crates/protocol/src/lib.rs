//! Shared protocol types for firedoc
//!
//! Defines the MessagePack-RPC structures that cross the trust boundary
//! between the privileged host and the sandboxed UI process, and the
//! allowlist of channel names either side may use.

pub mod channels;
pub mod error;
pub mod messages;
pub mod rpc;

pub use channels::*;
pub use error::ProtocolError;
pub use messages::*;
pub use rpc::*;
