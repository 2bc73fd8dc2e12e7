//! # Catalog Indexer
//!
//! Keeps per-tenant search indices of a product catalog in sync with the
//! system-of-record and tells the downstream cache layer what went stale.
//!
//! ## Architecture
//!
//! 1. **Tenants**: every run visits each non-ignored tenant in isolation
//! 2. **Engine**: syncs one entity kind into versioned `<alias>_v<N>` indices
//! 3. **Cascade**: leaf writes defer parent re-syncs and mark category listings
//! 4. **Invalidation**: every write or delete queues the entity's natural key
//!
//! ## Modules
//!
//! - [`config`]: Configuration and dependency initialization
//! - [`engine`]: Entity synchronization and the product/category/page/block kinds
//! - [`cascade`]: Parent and aggregate obligations of a write
//! - [`cache`]: Category listing cache
//! - [`settings`]: Global settings index
//! - [`invalidation`]: Pending invalidations for the downstream cache layer
//! - [`source`]: System-of-record adapter traits and the snapshot source
//! - [`errors`]: Error types for the synchronizer

pub mod cache;
pub mod cascade;
pub mod config;
pub mod detect;
pub mod engine;
pub mod errors;
pub mod invalidation;
pub mod notify;
pub mod rebuild;
pub mod settings;
pub mod source;
pub mod tenants;
pub mod transform;

pub use config::{Dependencies, SyncConfig};
pub use engine::{EntitySyncEngine, SyncMode, SyncReport};
pub use errors::{SourceError, SyncError};
pub use rebuild::CronRebuild;

use thiserror::Error;

/// Errors that can occur during synchronizer initialization.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The system-of-record could not be loaded.
    #[error("Source error: {0}")]
    SourceError(#[from] SourceError),
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
