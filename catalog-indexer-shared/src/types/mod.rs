//! Core data structures shared by the repository and the sync engine.

pub mod entity;
pub mod entity_document;
pub mod invalidation;
pub mod records;
pub mod tenant;
