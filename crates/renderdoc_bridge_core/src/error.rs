use std::time::Duration;
use thiserror::Error;

use crate::protocol::ErrorKind;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge not reachable at {endpoint}: {reason}. Make sure RenderDoc is running with the bridge extension loaded.")]
    Unreachable { endpoint: String, reason: String },

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("[{kind}] {message}")]
    Remote { kind: ErrorKind, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Deserialization error: {0}")]
    Deserialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl BridgeError {
    pub fn remote(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Remote {
            kind,
            message: message.into(),
        }
    }

    pub fn unreachable(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unreachable {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    /// The stable kind a caller can branch on.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Remote { kind, .. } => *kind,
            Self::Unreachable { .. }
            | Self::Transport(_)
            | Self::Deserialize(_)
            | Self::Io(_)
            | Self::InvalidResponse(_) => ErrorKind::TransportError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_construction() {
        let err = BridgeError::remote(ErrorKind::NotFound, "Event 42 not found");
        match &err {
            BridgeError::Remote { kind, message } => {
                assert_eq!(*kind, ErrorKind::NotFound);
                assert_eq!(message, "Event 42 not found");
            }
            _ => panic!("Expected Remote variant"),
        }
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_error_display_messages() {
        let timeout_err = BridgeError::Timeout(Duration::from_secs(5));
        assert_eq!(timeout_err.to_string(), "Request timeout after 5s");

        let remote_err = BridgeError::remote(ErrorKind::UnknownOperation, "Unknown operation: nope");
        assert_eq!(
            remote_err.to_string(),
            "[UnknownOperation] Unknown operation: nope"
        );

        let invalid_response_err = BridgeError::InvalidResponse("Bad format".to_string());
        assert_eq!(
            invalid_response_err.to_string(),
            "Invalid response: Bad format"
        );
    }

    #[test]
    fn test_transport_failures_share_a_kind() {
        let unreachable = BridgeError::unreachable("127.0.0.1:1", "connection refused");
        assert_eq!(unreachable.kind(), ErrorKind::TransportError);
        assert!(unreachable.to_string().contains("127.0.0.1:1"));

        assert_eq!(
            BridgeError::Transport("frame too large".into()).kind(),
            ErrorKind::TransportError
        );
        assert_eq!(
            BridgeError::Timeout(Duration::from_millis(10)).kind(),
            ErrorKind::Timeout
        );
    }

    #[test]
    fn test_deserialize_error_conversion() {
        let json_err =
            serde_json::Error::io(std::io::Error::new(std::io::ErrorKind::Other, "test"));
        let bridge_err: BridgeError = json_err.into();
        assert!(matches!(bridge_err, BridgeError::Deserialize(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let bridge_err: BridgeError = io_err.into();
        match bridge_err {
            BridgeError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            _ => panic!("Expected Io variant"),
        }
    }
}
