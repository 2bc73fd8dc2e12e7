//! Pending invalidations: the contract with the downstream cache layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scope and key of the "discard everything" sentinel.
pub const CLEAR_ALL_MARKER: &str = "*";

/// What the downstream cache layer must do with a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidationAction {
    /// The resource changed and must be regenerated.
    Upsert,
    /// The resource is gone and must be purged.
    Delete,
    /// Every cached entry is stale regardless of key.
    ClearAll,
}

impl InvalidationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidationAction::Upsert => "upsert",
            InvalidationAction::Delete => "delete",
            InvalidationAction::ClearAll => "clear-all",
        }
    }
}

/// One queued invalidation. Entries are keyed by `(scope, key)`: queueing the
/// same pair again replaces the previous entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingInvalidation {
    pub scope: String,
    pub key: String,
    pub action: InvalidationAction,
    #[serde(default = "Utc::now")]
    pub queued_at: DateTime<Utc>,
}

impl PendingInvalidation {
    pub fn new(scope: impl Into<String>, key: impl Into<String>, action: InvalidationAction) -> Self {
        Self {
            scope: scope.into(),
            key: key.into(),
            action,
            queued_at: Utc::now(),
        }
    }

    /// The sentinel telling the consumer to discard every cached entry.
    pub fn clear_all() -> Self {
        Self::new(CLEAR_ALL_MARKER, CLEAR_ALL_MARKER, InvalidationAction::ClearAll)
    }

    /// The backend document id, unique per `(scope, key)`.
    pub fn document_id(&self) -> String {
        format!("{}:{}", self.scope, self.key)
    }

    pub fn is_clear_all(&self) -> bool {
        self.action == InvalidationAction::ClearAll
            || (self.scope == CLEAR_ALL_MARKER && self.key == CLEAR_ALL_MARKER)
    }
}

/// How a consumer must act on a set of pending entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationPlan {
    /// Discard every cached entry; targeted entries are superseded.
    Everything,
    /// Purge or regenerate exactly these entries.
    Targeted(Vec<PendingInvalidation>),
}

impl InvalidationPlan {
    /// Interpret pending entries the way the cache layer must: the sentinel is
    /// never looked up as a literal key, it supersedes everything else.
    pub fn from_entries(entries: Vec<PendingInvalidation>) -> Self {
        if entries.iter().any(PendingInvalidation::is_clear_all) {
            return InvalidationPlan::Everything;
        }
        InvalidationPlan::Targeted(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_wire_names() {
        assert_eq!(
            serde_json::to_string(&InvalidationAction::ClearAll).unwrap(),
            "\"clear-all\""
        );
        assert_eq!(InvalidationAction::Delete.as_str(), "delete");
    }

    #[test]
    fn test_document_id_is_scope_and_key() {
        let entry = PendingInvalidation::new("page", "about-us", InvalidationAction::Upsert);
        assert_eq!(entry.document_id(), "page:about-us");
        assert_eq!(PendingInvalidation::clear_all().document_id(), "*:*");
    }

    #[test]
    fn test_plan_sentinel_supersedes_targeted_entries() {
        let entries = vec![
            PendingInvalidation::new("product", "blue-shoe", InvalidationAction::Delete),
            PendingInvalidation::clear_all(),
            PendingInvalidation::new("page", "home", InvalidationAction::Upsert),
        ];
        assert_eq!(InvalidationPlan::from_entries(entries), InvalidationPlan::Everything);
    }

    #[test]
    fn test_plan_is_targeted_without_sentinel() {
        let entries = vec![PendingInvalidation::new(
            "product",
            "blue-shoe",
            InvalidationAction::Delete,
        )];
        match InvalidationPlan::from_entries(entries) {
            InvalidationPlan::Targeted(list) => assert_eq!(list[0].key, "blue-shoe"),
            InvalidationPlan::Everything => panic!("expected targeted plan"),
        }
    }
}
