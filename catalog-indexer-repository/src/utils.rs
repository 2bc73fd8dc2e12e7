//! Utility functions for the catalog indexer repository.

use serde_json::Value;

use crate::errors::SearchBackendError;

/// Physical index name of generation `version` of `alias`.
///
/// # Example
///
/// ```
/// use catalog_indexer_repository::utils::versioned_index_name;
///
/// assert_eq!(versioned_index_name("wyvr_product_1", 3), "wyvr_product_1_v3");
/// ```
pub fn versioned_index_name(alias: &str, version: u32) -> String {
    format!("{}_v{}", alias, version)
}

/// Wildcard pattern matching every generation of `alias`.
pub fn version_pattern(alias: &str) -> String {
    format!("{}_v*", alias)
}

/// Parse the generation number out of a physical index name of `alias`.
///
/// Returns `None` for names that belong to another alias or carry no numeric
/// suffix (`wyvr_product_1_vx`).
pub fn parse_version(alias: &str, index: &str) -> Option<u32> {
    let suffix = index.strip_prefix(alias)?.strip_prefix("_v")?;
    if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

/// Extract the document id from a document body.
///
/// Every write must carry an `id` (string or number); bodies without one are
/// rejected.
pub fn document_id(body: &Value) -> Result<String, SearchBackendError> {
    match body.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(SearchBackendError::validation("document has no id")),
    }
}
