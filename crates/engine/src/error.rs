//! The module contains the errors the engine can throw.
//!
//! Two layers exist:
//!
//! - [`StoreError`] is what a [`RemoteStore`] reports for a failed
//!   subscription or mutation.
//! - [`EngineError`] is what the engine surfaces to its callers. Mirrors turn a
//!   store error into [`PermissionDenied`] or [`TransportFailure`], the gateway
//!   wraps it into [`Write`].
//!
//!  [`RemoteStore`]: crate::store::RemoteStore
//!  [`PermissionDenied`]: EngineError::PermissionDenied
//!  [`TransportFailure`]: EngineError::TransportFailure
//!  [`Write`]: EngineError::Write
use thiserror::Error;

/// Failure reported by the remote store.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum StoreError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("\"{0}\" not found")]
    NotFound(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Engine custom errors.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum EngineError {
    #[error("Authentication failed: {0}")]
    AuthFailure(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Transport failure: {0}")]
    TransportFailure(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Write failed: {0}")]
    Write(#[source] StoreError),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),
    #[error("Export failed: {0}")]
    Export(String),
}

impl EngineError {
    /// Returns `true` for errors raised by a mirror subscription.
    ///
    /// These keep the last-known-good data on screen and are shown as a
    /// persistent banner instead of a one-shot notification.
    #[must_use]
    pub fn is_mirror_error(&self) -> bool {
        matches!(self, Self::PermissionDenied(_) | Self::TransportFailure(_))
    }
}

impl From<StoreError> for EngineError {
    /// Maps a subscription failure into its mirror-level error.
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::PermissionDenied(msg) => Self::PermissionDenied(msg),
            StoreError::NotFound(msg) => Self::TransportFailure(format!("{msg} not found")),
            StoreError::Transport(msg) => Self::TransportFailure(msg),
        }
    }
}

impl From<csv::Error> for EngineError {
    fn from(value: csv::Error) -> Self {
        Self::Export(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_mirror_errors() {
        let denied = EngineError::from(StoreError::PermissionDenied("rules".to_string()));
        assert_eq!(denied, EngineError::PermissionDenied("rules".to_string()));
        assert!(denied.is_mirror_error());

        let transport = EngineError::from(StoreError::Transport("offline".to_string()));
        assert_eq!(transport, EngineError::TransportFailure("offline".to_string()));
        assert!(transport.is_mirror_error());
    }

    #[test]
    fn write_error_keeps_store_cause() {
        let err = EngineError::Write(StoreError::PermissionDenied("read-only".to_string()));
        assert!(!err.is_mirror_error());
        assert_eq!(err.to_string(), "Write failed: permission denied: read-only");
    }
}
