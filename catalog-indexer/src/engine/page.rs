//! Content page documents.

use std::sync::Arc;

use async_trait::async_trait;
use catalog_indexer_shared::{EntityId, EntityKind, PageRecord, SearchDocument, TenantId};
use serde_json::{json, Value};

use super::EntityAdapter;
use crate::config::PAGE_INDEX_ATTRIBUTES;
use crate::errors::{SourceError, SyncError};
use crate::source::CatalogSource;
use crate::transform::{parse_attribute_list, search_tokens, to_bool};

#[derive(Clone)]
pub struct PageAdapter {
    source: Arc<dyn CatalogSource>,
}

impl PageAdapter {
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        Self { source }
    }
}

fn url_of(record: &PageRecord) -> Option<String> {
    record
        .identifier
        .as_deref()
        .map(str::to_lowercase)
        .filter(|url| !url.is_empty())
}

#[async_trait]
impl EntityAdapter for PageAdapter {
    type Record = PageRecord;

    const KIND: EntityKind = EntityKind::Page;

    async fn ids(&self, tenant: TenantId) -> Result<Vec<EntityId>, SourceError> {
        self.source.page_ids(tenant).await
    }

    async fn fetch(
        &self,
        tenant: TenantId,
        ids: &[EntityId],
    ) -> Result<Vec<PageRecord>, SourceError> {
        self.source.pages(tenant, ids).await
    }

    fn id_of(record: &PageRecord) -> Option<EntityId> {
        record.id
    }

    fn natural_key_of(record: &PageRecord) -> Option<String> {
        url_of(record)
    }

    async fn build(&self, tenant: TenantId, record: &PageRecord) -> Result<SearchDocument, SyncError> {
        let id = record.id.ok_or_else(|| SyncError::invalid("page without id"))?;

        let mut data = record.data.clone();
        data.insert("id".to_string(), json!(id));
        data.insert("identifier".to_string(), json!(record.identifier));
        data.insert("title".to_string(), json!(record.title));
        data.insert("store_ids".to_string(), json!(record.store_ids));

        let attributes = self
            .source
            .config_value(tenant, PAGE_INDEX_ATTRIBUTES)
            .await?
            .map(|raw| parse_attribute_list(&raw))
            .unwrap_or_default();

        let search = search_tokens(&attributes, &data);

        let mut doc = SearchDocument::new(id, EntityKind::Page, Value::Object(data));
        doc.url = Some(url_of(record).unwrap_or_default());
        doc.is_active = Some(record.data.get("is_active").map(to_bool).unwrap_or(false));
        doc.search = search;
        doc.updated_at = record.updated_at;
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_indexer_shared::Tenant;
    use serde_json::Map;

    use crate::source::{CatalogSnapshot, SnapshotCatalog};

    #[tokio::test]
    async fn test_page_document() {
        let catalog = Arc::new(SnapshotCatalog::new(CatalogSnapshot {
            tenants: vec![Tenant::new(1, "default")],
            ..CatalogSnapshot::default()
        }));
        catalog
            .set_config(Some(TenantId(1)), PAGE_INDEX_ATTRIBUTES, "title,content")
            .await;
        let mut data = Map::new();
        data.insert("is_active".to_string(), json!("1"));
        data.insert("content".to_string(), json!("<p>Who We Are</p>"));
        let record = PageRecord {
            id: Some(5),
            identifier: Some("About-Us".to_string()),
            title: Some("About".to_string()),
            store_ids: vec![TenantId::ALL],
            updated_at: None,
            data,
        };

        let doc = PageAdapter::new(catalog).build(TenantId(1), &record).await.unwrap();
        assert_eq!(doc.url.as_deref(), Some("about-us"));
        assert_eq!(doc.natural_key(), Some("about-us"));
        assert_eq!(doc.is_active, Some(true));
        assert_eq!(doc.search, vec!["about".to_string(), "who we are".to_string()]);
        assert_eq!(doc.kind_payload(EntityKind::Page).unwrap()["title"], "About");
    }
}
