use std::io;

use thiserror::Error;

/// Failure taxonomy for host file operations
///
/// The `Display` text is what crosses the bridge, so it stays short and
/// human-readable. `Cancelled` renders as exactly `"Cancelled"`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No such file: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// User dismissed a dialog
    #[error("Cancelled")]
    Cancelled,

    #[error("I/O failure on {path}: {message}")]
    Io { path: String, message: String },

    /// Nothing enforces a deadline on the host yet; reserved for callers
    #[error("Timed out: {0}")]
    Timeout(String),
}

impl FsError {
    /// Classify an `io::Error` raised while touching `path`
    pub fn from_io(path: impl Into<String>, err: &io::Error) -> Self {
        let path = path.into();
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            _ => Self::Io {
                path,
                message: err.to_string(),
            },
        }
    }

    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, FsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_kinds_map_onto_taxonomy() {
        let nf = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(FsError::from_io("/a", &nf), FsError::NotFound("/a".into()));

        let pd = io::Error::new(io::ErrorKind::PermissionDenied, "no");
        assert_eq!(
            FsError::from_io("/a", &pd),
            FsError::PermissionDenied("/a".into())
        );

        let other = io::Error::new(io::ErrorKind::UnexpectedEof, "short");
        assert!(matches!(FsError::from_io("/a", &other), FsError::Io { .. }));
    }

    #[test]
    fn cancelled_message_is_stable() {
        assert_eq!(FsError::Cancelled.to_string(), "Cancelled");
        assert!(FsError::Cancelled.is_cancelled());
    }
}
