use std::path::PathBuf;

use renderdoc_bridge_core::ErrorKind;
use thiserror::Error;

/// Failures reported by a replay capability.
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("Capture file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Capture is corrupt: {0}")]
    Corrupt(String),

    #[error("Unsupported graphics API: {0}")]
    UnsupportedApi(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Not supported by this replay: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReplayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::FileNotFound(_) | Self::Corrupt(_) | Self::UnsupportedApi(_) => {
                ErrorKind::LoadError
            }
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Unsupported(_) => ErrorKind::Unavailable,
            Self::Io(_) => ErrorKind::Internal,
        }
    }
}

/// Errors raised by the router and the capture facade. Each maps onto a
/// stable wire kind through [`FacadeError::kind`].
#[derive(Error, Debug)]
pub enum FacadeError {
    #[error("No capture loaded. Call open_capture first.")]
    NotLoaded,

    #[error("Failed to load capture: {0}")]
    LoadError(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Range(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Invalid arguments: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Unavailable(String),

    #[error(transparent)]
    Replay(#[from] ReplayError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FacadeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotLoaded => ErrorKind::NotLoaded,
            Self::LoadError(_) => ErrorKind::LoadError,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Range(_) => ErrorKind::RangeError,
            Self::UnknownOperation(_) => ErrorKind::UnknownOperation,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Unavailable(_) => ErrorKind::Unavailable,
            Self::Replay(e) => e.kind(),
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<serde_json::Error> for FacadeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(format!("result serialization failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_errors_keep_their_kind_through_the_facade() {
        let err: FacadeError = ReplayError::Unsupported("GPU counters".into()).into();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert_eq!(err.to_string(), "Not supported by this replay: GPU counters");

        let err: FacadeError = ReplayError::NotFound("ResourceId::9".into()).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_not_loaded_message() {
        assert_eq!(
            FacadeError::NotLoaded.to_string(),
            "No capture loaded. Call open_capture first."
        );
        assert_eq!(FacadeError::Range("x".into()).kind(), ErrorKind::RangeError);
    }
}
