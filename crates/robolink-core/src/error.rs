//! Error types for the robolink client.
//!
//! Errors are grouped by the layer that produces them. Each layer has its own
//! enum so callers can match on the bucket they care about, and everything is
//! wrapped by [`RobolinkError`] for `?` propagation.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures while establishing a connection to the station.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("No station accepted a connection on {host} ports {port_start}-{port_end} ({attempts} attempts)")]
    RemoteUnreachable {
        host: String,
        port_start: u16,
        port_end: u16,
        attempts: usize,
    },

    #[error("Station executable not found: {0}")]
    ExecutableNotFound(PathBuf),

    #[error("Failed to start station {path}: {message}")]
    LaunchFailed { path: PathBuf, message: String },

    #[error("Station did not report readiness within {0:?}")]
    LaunchTimedOut(Duration),

    #[error("Handshake failed: {reason}")]
    HandshakeFailed { reason: String },

    #[error("Feature requires station build {min_build} or newer (connected build is {current_build})")]
    FeatureRequiresNewerBuild { min_build: u32, current_build: u32 },
}

/// Failures on an established socket. None of these are recoverable on the
/// same session.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection closed by station after {received} of {expected} bytes")]
    ConnectionClosed { expected: usize, received: usize },

    #[error("Short read: got {received} of {expected} bytes")]
    ShortRead {
        expected: usize,
        received: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    #[error("Receive failed: {0}")]
    RecvFailed(#[source] std::io::Error),

    #[error("Socket operation timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Not connected")]
    NotConnected,
}

/// The byte stream no longer matches what the protocol expects.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Unexpected status code {0}")]
    UnexpectedStatusCode(i32),

    #[error("Framing mismatch in {context}: {detail}")]
    FramingMismatch { context: &'static str, detail: String },

    #[error("Station sent text that is not valid UTF-8: {0}")]
    InvalidText(#[from] std::string::FromUtf8Error),
}

/// Error statuses reported by the station for a single call.
///
/// These fail the call but leave the session usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("Invalid item: the item identifier provided is not valid or does not exist")]
    InvalidItem,

    #[error("{0}")]
    Failed(String),

    #[error("Invalid license")]
    InvalidLicense,

    #[error("Target not reachable: {0}")]
    TargetUnreachable(String),

    #[error("Cancelled by user: {0}")]
    Cancelled(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Station error {code}: {message}")]
    Other { code: i32, message: String },
}

impl RemoteError {
    /// The raw status code this error was decoded from.
    pub fn code(&self) -> i32 {
        match self {
            RemoteError::InvalidItem => 1,
            RemoteError::Failed(_) => 3,
            RemoteError::InvalidLicense => 9,
            RemoteError::TargetUnreachable(_) => 10,
            RemoteError::Cancelled(_) => 11,
            RemoteError::InvalidInput(_) => 12,
            RemoteError::Other { code, .. } => *code,
        }
    }
}

/// Main error type for the robolink library.
#[derive(Debug, Error)]
pub enum RobolinkError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },
}

/// Result type alias for robolink operations.
pub type Result<T> = std::result::Result<T, RobolinkError>;

impl From<std::io::Error> for RobolinkError {
    fn from(err: std::io::Error) -> Self {
        RobolinkError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for RobolinkError {
    fn from(err: serde_json::Error) -> Self {
        RobolinkError::Config {
            message: err.to_string(),
        }
    }
}

impl RobolinkError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        RobolinkError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Whether the session that produced this error must be discarded.
    ///
    /// Transport and protocol failures leave the stream in an unknown state;
    /// remote statuses are fully consumed and keep the session usable.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            RobolinkError::Transport(_)
                | RobolinkError::Protocol(ProtocolError::UnexpectedStatusCode(_))
                | RobolinkError::Protocol(ProtocolError::FramingMismatch { .. })
        )
    }

    /// The station status code behind this error, if it came from one.
    pub fn status_code(&self) -> Option<i32> {
        match self {
            RobolinkError::Remote(e) => Some(e.code()),
            RobolinkError::Protocol(ProtocolError::UnexpectedStatusCode(code)) => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RobolinkError::from(RemoteError::TargetUnreachable("joint limit".into()));
        assert_eq!(err.to_string(), "Target not reachable: joint limit");

        let err = RobolinkError::from(ConnectError::FeatureRequiresNewerBuild {
            min_build: 20000,
            current_build: 14000,
        });
        assert!(err.to_string().contains("20000"));
    }

    #[test]
    fn test_remote_error_codes() {
        assert_eq!(RemoteError::InvalidItem.code(), 1);
        assert_eq!(RemoteError::Cancelled("stop".into()).code(), 11);
        assert_eq!(
            RemoteError::Other {
                code: 42,
                message: "x".into()
            }
            .code(),
            42
        );
    }

    #[test]
    fn test_session_fatal_classification() {
        assert!(RobolinkError::from(TransportError::NotConnected).is_session_fatal());
        assert!(RobolinkError::from(ProtocolError::UnexpectedStatusCode(150)).is_session_fatal());
        assert!(!RobolinkError::from(RemoteError::InvalidItem).is_session_fatal());

        let bad_utf8 = String::from_utf8(vec![0xff]).unwrap_err();
        assert!(!RobolinkError::from(ProtocolError::InvalidText(bad_utf8)).is_session_fatal());
    }

    #[test]
    fn test_status_code_lookup() {
        assert_eq!(
            RobolinkError::from(RemoteError::InvalidInput("bad".into())).status_code(),
            Some(12)
        );
        assert_eq!(RobolinkError::from(TransportError::NotConnected).status_code(), None);
    }
}
