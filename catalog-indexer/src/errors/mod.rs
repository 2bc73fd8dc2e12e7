//! Error types for the catalog synchronizer.

use catalog_indexer_repository::SearchBackendError;
use thiserror::Error;

/// Errors reported by the system-of-record adapter.
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    /// The adapter could not be reached or failed to answer.
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    /// The adapter returned data that cannot be used.
    #[error("Invalid source data: {0}")]
    InvalidData(String),
}

impl SourceError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }
}

/// Errors of one sync step.
///
/// These never reach a trigger: they are logged and counted at the entity or
/// tenant isolation boundary.
#[derive(Error, Debug, Clone)]
pub enum SyncError {
    /// A search backend call failed.
    #[error("Backend error: {0}")]
    Backend(#[from] SearchBackendError),

    /// A system-of-record call failed.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// An entity or document is unusable (e.g. missing identifier).
    #[error("Invalid entity: {0}")]
    InvalidEntity(String),

    /// A stored document could not be encoded or decoded.
    #[error("Document error: {0}")]
    Document(String),
}

impl SyncError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidEntity(msg.into())
    }

    /// Whether this error marks a single bad item rather than an I/O failure.
    pub fn is_invalid(&self) -> bool {
        matches!(
            self,
            Self::InvalidEntity(_) | Self::Backend(SearchBackendError::ValidationError(_))
        )
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Document(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_classification() {
        assert!(SyncError::invalid("no id").is_invalid());
        assert!(SyncError::from(SearchBackendError::validation("no id")).is_invalid());
        assert!(!SyncError::from(SearchBackendError::connection("down")).is_invalid());
        assert!(!SyncError::from(SourceError::unavailable("down")).is_invalid());
    }
}
