use thiserror::Error;

/// Errors raised while framing or validating bridge traffic
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Channel name is not on the allowlist
    #[error("channel not allowed: {0}")]
    Denied(String),

    /// Envelope failed validation (missing or mistyped field)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Frame could not be decoded as a MessagePack-RPC message
    #[error("malformed message: {0}")]
    Malformed(String),
}
