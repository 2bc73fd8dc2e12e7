//! Content block documents. Blocks are keyed downstream by their identifier.

use std::sync::Arc;

use async_trait::async_trait;
use catalog_indexer_shared::{BlockRecord, EntityId, EntityKind, SearchDocument, TenantId};
use serde_json::{json, Value};

use super::EntityAdapter;
use crate::errors::{SourceError, SyncError};
use crate::source::CatalogSource;
use crate::transform::to_bool;

#[derive(Clone)]
pub struct BlockAdapter {
    source: Arc<dyn CatalogSource>,
}

impl BlockAdapter {
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        Self { source }
    }
}

fn identifier_of(record: &BlockRecord) -> Option<String> {
    record
        .identifier
        .as_deref()
        .map(str::to_lowercase)
        .filter(|identifier| !identifier.is_empty())
}

#[async_trait]
impl EntityAdapter for BlockAdapter {
    type Record = BlockRecord;

    const KIND: EntityKind = EntityKind::Block;

    async fn ids(&self, tenant: TenantId) -> Result<Vec<EntityId>, SourceError> {
        self.source.block_ids(tenant).await
    }

    async fn fetch(
        &self,
        tenant: TenantId,
        ids: &[EntityId],
    ) -> Result<Vec<BlockRecord>, SourceError> {
        self.source.blocks(tenant, ids).await
    }

    fn id_of(record: &BlockRecord) -> Option<EntityId> {
        record.id
    }

    fn natural_key_of(record: &BlockRecord) -> Option<String> {
        identifier_of(record)
    }

    async fn build(&self, _tenant: TenantId, record: &BlockRecord) -> Result<SearchDocument, SyncError> {
        let id = record.id.ok_or_else(|| SyncError::invalid("block without id"))?;

        let mut data = record.data.clone();
        data.insert("id".to_string(), json!(id));
        data.insert("identifier".to_string(), json!(record.identifier));
        data.insert("store_ids".to_string(), json!(record.store_ids));

        let mut doc = SearchDocument::new(id, EntityKind::Block, Value::Object(data));
        doc.identifier = Some(identifier_of(record).unwrap_or_default());
        doc.is_active = Some(record.data.get("is_active").map(to_bool).unwrap_or(false));
        doc.updated_at = record.updated_at;
        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SnapshotCatalog;

    #[tokio::test]
    async fn test_block_document() {
        let adapter = BlockAdapter::new(Arc::new(SnapshotCatalog::default()));
        let record = BlockRecord {
            id: Some(2),
            identifier: Some("Footer-Links".to_string()),
            store_ids: vec![TenantId(1)],
            updated_at: None,
            data: serde_json::Map::new(),
        };

        let doc = adapter.build(TenantId(1), &record).await.unwrap();
        assert_eq!(doc.identifier.as_deref(), Some("footer-links"));
        assert_eq!(doc.natural_key(), Some("footer-links"));
        assert_eq!(doc.is_active, Some(false));
        assert!(doc.url.is_none());
        assert_eq!(doc.kind_payload(EntityKind::Block).unwrap()["id"], 2);
    }
}
