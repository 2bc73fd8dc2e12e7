//! # Catalog Indexer Shared
//!
//! Shared data structures used across the catalog indexer crates: tenants,
//! entity kinds, the documents stored in the search backend, the records
//! delivered by the system-of-record and the pending invalidations consumed by
//! the downstream cache layer.

pub mod types;

pub use types::entity::{EntityId, EntityKind};
pub use types::entity_document::{ChangeFingerprint, SearchDocument};
pub use types::invalidation::{InvalidationAction, InvalidationPlan, PendingInvalidation};
pub use types::records::{
    assigned_to, AttributeInput, AttributeOption, AttributeValue, BlockRecord, CategoryRecord,
    MemberSummary, PageRecord, ProductRecord, ProductType,
};
pub use types::tenant::{Tenant, TenantId};
