//! Error types for the catalog indexer repository.
//!
//! This module provides a unified error type for all search backend operations.

mod search_backend_error;

pub use search_backend_error::SearchBackendError;
