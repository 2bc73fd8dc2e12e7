//! Category documents.

use std::sync::Arc;

use async_trait::async_trait;
use catalog_indexer_shared::{CategoryRecord, EntityId, EntityKind, SearchDocument, TenantId};
use serde_json::{json, Value};

use super::EntityAdapter;
use crate::config::CATEGORY_INDEX_ATTRIBUTES;
use crate::errors::{SourceError, SyncError};
use crate::source::CatalogSource;
use crate::transform::{convert_bool_attributes, parse_attribute_list, search_tokens, to_bool};

const BOOL_ATTRIBUTES: [&str; 3] = ["is_active", "is_anchor", "include_in_menu"];

/// Category-kind adapter. Active categories carry `{id, sku}` summaries of
/// their members.
#[derive(Clone)]
pub struct CategoryAdapter {
    source: Arc<dyn CatalogSource>,
}

impl CategoryAdapter {
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        Self { source }
    }
}

fn url_of(record: &CategoryRecord) -> Option<String> {
    record
        .url_path
        .as_deref()
        .map(str::to_lowercase)
        .filter(|url| !url.is_empty())
}

#[async_trait]
impl EntityAdapter for CategoryAdapter {
    type Record = CategoryRecord;

    const KIND: EntityKind = EntityKind::Category;

    async fn ids(&self, tenant: TenantId) -> Result<Vec<EntityId>, SourceError> {
        self.source.category_ids(tenant).await
    }

    async fn fetch(
        &self,
        tenant: TenantId,
        ids: &[EntityId],
    ) -> Result<Vec<CategoryRecord>, SourceError> {
        self.source.categories(tenant, ids).await
    }

    fn id_of(record: &CategoryRecord) -> Option<EntityId> {
        record.id
    }

    fn natural_key_of(record: &CategoryRecord) -> Option<String> {
        url_of(record)
    }

    async fn build(
        &self,
        tenant: TenantId,
        record: &CategoryRecord,
    ) -> Result<SearchDocument, SyncError> {
        let id = record
            .id
            .ok_or_else(|| SyncError::invalid("category without id"))?;
        let is_active = record.data.get("is_active").map(to_bool).unwrap_or(false);

        let mut data = record.data.clone();
        data.insert("id".to_string(), json!(id));
        data.insert("name".to_string(), json!(record.name));
        data.insert("url_path".to_string(), json!(record.url_path));
        convert_bool_attributes(&mut data, &BOOL_ATTRIBUTES);
        if is_active {
            let members = self.source.category_members(tenant, id).await?;
            data.insert("products".to_string(), json!(members));
        }

        let attributes = self
            .source
            .config_value(tenant, CATEGORY_INDEX_ATTRIBUTES)
            .await?
            .map(|raw| parse_attribute_list(&raw))
            .unwrap_or_default();
        let search = search_tokens(&attributes, &data);

        let mut doc = SearchDocument::new(id, EntityKind::Category, Value::Object(data));
        doc.url = Some(url_of(record).unwrap_or_default());
        doc.name = Some(record.name.as_deref().unwrap_or_default().to_lowercase());
        doc.is_active = Some(is_active);
        doc.search = search;
        doc.updated_at = record.updated_at;
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_indexer_shared::{ProductRecord, Tenant};
    use serde_json::Map;

    use crate::source::{CatalogSnapshot, SnapshotCatalog};

    fn category(id: EntityId, active: &str) -> CategoryRecord {
        let mut data = Map::new();
        data.insert("is_active".to_string(), json!(active));
        data.insert("is_anchor".to_string(), json!("0"));
        CategoryRecord {
            id: Some(id),
            name: Some("Shoes".to_string()),
            url_path: Some("Men/Shoes".to_string()),
            updated_at: None,
            data,
        }
    }

    fn adapter() -> CategoryAdapter {
        let mut shoe = ProductRecord::new(42, "BLUE-SHOE");
        shoe.category_ids = vec![9];
        let mut hidden = ProductRecord::new(43, "HIDDEN");
        hidden.category_ids = vec![9];
        hidden.visible = false;

        CategoryAdapter::new(Arc::new(SnapshotCatalog::new(CatalogSnapshot {
            tenants: vec![Tenant::new(1, "default")],
            products: vec![shoe, hidden],
            categories: vec![category(9, "1"), category(10, "0")],
            ..CatalogSnapshot::default()
        })))
    }

    #[tokio::test]
    async fn test_active_category_lists_members() {
        let doc = adapter()
            .build(TenantId(1), &category(9, "1"))
            .await
            .unwrap();
        let payload = doc.kind_payload(EntityKind::Category).unwrap();

        assert_eq!(doc.url.as_deref(), Some("men/shoes"));
        assert_eq!(doc.name.as_deref(), Some("shoes"));
        assert_eq!(doc.is_active, Some(true));
        assert_eq!(payload["is_active"], true);
        assert_eq!(payload["is_anchor"], false);
        assert_eq!(payload["products"], json!([{"id": 42, "sku": "BLUE-SHOE"}]));
        assert!(doc.category_ids.is_empty());
    }

    #[tokio::test]
    async fn test_inactive_category_has_no_members() {
        let doc = adapter()
            .build(TenantId(1), &category(10, "0"))
            .await
            .unwrap();
        let payload = doc.kind_payload(EntityKind::Category).unwrap();

        assert_eq!(doc.is_active, Some(false));
        assert!(payload.get("products").is_none());
    }
}
