//! Index settings and mappings.
//!
//! This module defines the create-index body for every index family the
//! synchronizer writes: the per-kind entity indices, the settings index, the
//! category listing cache, the invalidation queue and the small marker indices.

use catalog_indexer_shared::EntityKind;
use serde_json::{json, Value};

/// The families of indices managed by the synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFamily {
    /// Per-tenant index of one entity kind.
    Entity(EntityKind),
    /// Global per-tenant settings export.
    Settings,
    /// Per-tenant category listing cache.
    Cache,
    /// Global pending invalidation queue.
    Clear,
    /// Id-only marker index (pending parents, pending recomputes).
    Marker,
}

fn keyword() -> Value {
    json!({"type": "keyword", "index": true})
}

fn payload_object() -> Value {
    json!({"type": "object", "dynamic": false})
}

/// Get the create-index body for an index family.
///
/// The configuration includes:
/// - **Keyword fields**: ids and natural keys for exact lookups
/// - **Text field**: `search` tokens
/// - **Non-dynamic objects**: domain payloads are stored but not mapped
///
/// # Sharding Configuration
///
/// - 1 primary shard
/// - 1 replica for redundancy
pub fn get_index_settings(family: IndexFamily) -> Value {
    let properties = match family {
        IndexFamily::Entity(EntityKind::Product) => json!({
            "id": keyword(),
            "url": keyword(),
            "sku": keyword(),
            "search": {"type": "text", "index": true},
            "category_ids": {"type": "long"},
            "updated_at": {"type": "date"},
            "price": {"type": "double"},
            "stock": {"type": "double"},
            "product": payload_object()
        }),
        IndexFamily::Entity(EntityKind::Category) => json!({
            "id": keyword(),
            "url": keyword(),
            "name": keyword(),
            "is_active": {"type": "boolean"},
            "search": {"type": "text", "index": true},
            "category": payload_object()
        }),
        IndexFamily::Entity(EntityKind::Page) => json!({
            "id": keyword(),
            "url": keyword(),
            "is_active": {"type": "boolean"},
            "search": {"type": "text", "index": true},
            "page": payload_object()
        }),
        IndexFamily::Entity(EntityKind::Block) => json!({
            "id": keyword(),
            "identifier": keyword(),
            "is_active": {"type": "boolean"},
            "block": payload_object()
        }),
        IndexFamily::Settings => json!({
            "id": keyword(),
            "value": payload_object()
        }),
        IndexFamily::Cache => json!({
            "id": keyword(),
            "url": keyword(),
            "products": payload_object()
        }),
        IndexFamily::Clear => json!({
            "id": keyword(),
            "scope": keyword(),
            "key": keyword(),
            "action": keyword(),
            "queued_at": {"type": "date"}
        }),
        IndexFamily::Marker => json!({
            "id": keyword(),
            "marked_at": {"type": "date"}
        }),
    };

    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1
        },
        "mappings": {
            "properties": properties
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_mapping() {
        let settings = get_index_settings(IndexFamily::Entity(EntityKind::Product));

        assert!(settings["settings"]["number_of_shards"].is_number());
        let properties = &settings["mappings"]["properties"];
        assert_eq!(properties["sku"]["type"], "keyword");
        assert_eq!(properties["search"]["type"], "text");
        assert_eq!(properties["product"]["dynamic"], false);
    }

    #[test]
    fn test_every_family_maps_id_as_keyword() {
        let families = [
            IndexFamily::Entity(EntityKind::Product),
            IndexFamily::Entity(EntityKind::Category),
            IndexFamily::Entity(EntityKind::Page),
            IndexFamily::Entity(EntityKind::Block),
            IndexFamily::Settings,
            IndexFamily::Cache,
            IndexFamily::Clear,
            IndexFamily::Marker,
        ];
        for family in families {
            let settings = get_index_settings(family);
            assert_eq!(
                settings["mappings"]["properties"]["id"]["type"], "keyword",
                "{:?}",
                family
            );
        }
    }

    #[test]
    fn test_block_uses_identifier() {
        let settings = get_index_settings(IndexFamily::Entity(EntityKind::Block));
        assert!(settings["mappings"]["properties"]["identifier"].is_object());
        assert!(settings["mappings"]["properties"]["url"].is_null());
    }
}
