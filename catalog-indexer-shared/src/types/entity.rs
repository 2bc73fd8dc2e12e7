//! Entity kinds synchronized into the search backend.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of an entity in the system-of-record.
pub type EntityId = u64;

/// The kinds of catalog entities that get their own per-tenant index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Product,
    Category,
    Page,
    Block,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Product,
        EntityKind::Category,
        EntityKind::Page,
        EntityKind::Block,
    ];

    /// Name used in index aliases, document payload keys and invalidation scopes.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Product => "product",
            EntityKind::Category => "category",
            EntityKind::Page => "page",
            EntityKind::Block => "block",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        let names: Vec<&str> = EntityKind::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["product", "category", "page", "block"]);
    }

    #[test]
    fn test_kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&EntityKind::Category).unwrap(),
            "\"category\""
        );
    }
}
