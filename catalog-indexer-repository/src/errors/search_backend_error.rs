//! Search backend error types.
//!
//! This module defines the unified error type for all backend operations,
//! including transport failures and rejected requests.

use thiserror::Error;

/// Unified errors from search backend operations.
///
/// Used by the `SearchBackend` trait, `BackendClient` and `IndexVersionManager`.
/// None of these are fatal to the process: callers log them and skip the
/// current entity, tenant or generation.
#[derive(Debug, Clone, Error)]
pub enum SearchBackendError {
    /// No backend host is configured; every operation is a no-op.
    #[error("Search backend is not configured")]
    NotConfigured,

    /// Validation error (e.g., a document without an `id`).
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Failed to reach the backend (ping, timeout, transport).
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Failed to index a document.
    #[error("Index error: {0}")]
    IndexError(String),

    /// Failed to create or delete a physical index.
    #[error("Index management error: {0}")]
    IndexManagementError(String),

    /// Failed to read or update aliases.
    #[error("Alias error: {0}")]
    AliasError(String),

    /// Failed to delete a document.
    #[error("Delete error: {0}")]
    DeleteError(String),

    /// Failed to read documents.
    #[error("Read error: {0}")]
    ReadError(String),

    /// Failed to parse a response from the backend.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to serialize data for the backend.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Unknown error.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl SearchBackendError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create an index error.
    pub fn index(msg: impl Into<String>) -> Self {
        Self::IndexError(msg.into())
    }

    /// Create an index management error.
    pub fn index_management(msg: impl Into<String>) -> Self {
        Self::IndexManagementError(msg.into())
    }

    /// Create an alias error.
    pub fn alias(msg: impl Into<String>) -> Self {
        Self::AliasError(msg.into())
    }

    /// Create a delete error.
    pub fn delete(msg: impl Into<String>) -> Self {
        Self::DeleteError(msg.into())
    }

    /// Create a read error.
    pub fn read(msg: impl Into<String>) -> Self {
        Self::ReadError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Create an unknown error.
    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::Unknown(msg.into())
    }

    /// Whether the backend could not be used at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::NotConfigured | Self::ConnectionError(_))
    }
}

impl From<serde_json::Error> for SearchBackendError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}
