//! Product documents.

use std::sync::Arc;

use async_trait::async_trait;
use catalog_indexer_shared::{EntityId, EntityKind, ProductRecord, SearchDocument, TenantId};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    measure, EntityAdapter, EntitySyncEngine, Selection, SyncMode, SyncReport, TenantOutcome,
};
use crate::config::PRODUCT_INDEX_ATTRIBUTES;
use crate::errors::{SourceError, SyncError};
use crate::source::CatalogSource;
use crate::transform::{format_attribute, parse_attribute_list, search_tokens, special_price};

/// Product-kind adapter.
///
/// Related products (configurable children, cross-sells, up-sells, related)
/// are embedded one level deep; embedded products never embed further products.
#[derive(Clone)]
pub struct ProductAdapter {
    source: Arc<dyn CatalogSource>,
}

impl ProductAdapter {
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        Self { source }
    }

    /// Best-effort load of related products; a failed lookup embeds nothing.
    async fn related(&self, tenant: TenantId, ids: &[EntityId], now: DateTime<Utc>) -> Vec<Value> {
        if ids.is_empty() {
            return Vec::new();
        }
        match self.source.products(tenant, ids).await {
            Ok(products) => products
                .iter()
                .map(|product| Value::Object(product_data(product, now)))
                .collect(),
            Err(e) => {
                warn!(tenant = %tenant, count = ids.len(), error = %e, "Failed to load related products");
                Vec::new()
            }
        }
    }
}

/// Payload of one product without embedded products.
pub(crate) fn product_data(product: &ProductRecord, now: DateTime<Utc>) -> Map<String, Value> {
    let mut data = product.data.clone();
    data.insert("id".to_string(), json!(product.id));
    data.insert("sku".to_string(), json!(product.sku));
    data.insert("url_key".to_string(), json!(product.url_key));
    data.insert("name".to_string(), json!(product.name));
    data.insert("type_id".to_string(), json!(product.type_id));
    data.insert("price".to_string(), json!(product.price));
    data.insert("category_ids".to_string(), json!(product.category_ids));

    for attribute in &product.attributes {
        if let Some(formatted) = format_attribute(attribute) {
            data.insert(attribute.code.clone(), formatted);
        }
    }

    data.insert("final_price".to_string(), json!(product.final_price));
    data.insert("special_price".to_string(), json!(special_price(product, now)));
    data.insert("rule_price".to_string(), json!(product.rule_price));
    data.insert("stock_qty".to_string(), json!(product.stock_qty));
    data.insert("is_in_stock".to_string(), json!(product.in_stock));
    data
}

#[async_trait]
impl EntityAdapter for ProductAdapter {
    type Record = ProductRecord;

    const KIND: EntityKind = EntityKind::Product;
    const HAS_PARENTS: bool = true;

    async fn ids(&self, tenant: TenantId) -> Result<Vec<EntityId>, SourceError> {
        self.source.product_ids(tenant).await
    }

    async fn fetch(
        &self,
        tenant: TenantId,
        ids: &[EntityId],
    ) -> Result<Vec<ProductRecord>, SourceError> {
        self.source.products(tenant, ids).await
    }

    async fn fetch_by_key(
        &self,
        tenant: TenantId,
        key: &str,
    ) -> Result<Option<ProductRecord>, SourceError> {
        self.source.product_by_sku(tenant, key).await
    }

    fn id_of(record: &ProductRecord) -> Option<EntityId> {
        record.id
    }

    fn natural_key_of(record: &ProductRecord) -> Option<String> {
        record.url_key.clone().filter(|key| !key.is_empty())
    }

    async fn build(
        &self,
        tenant: TenantId,
        record: &ProductRecord,
    ) -> Result<SearchDocument, SyncError> {
        let id = record
            .id
            .ok_or_else(|| SyncError::invalid("product without id"))?;
        let now = Utc::now();
        let mut data = product_data(record, now);

        if record.is_composite() {
            let children = self.related(tenant, &record.child_ids, now).await;
            data.insert("configurable_products".to_string(), Value::Array(children));
            data.insert(
                "configurable_options".to_string(),
                record.configurable_options.clone().unwrap_or(Value::Null),
            );
        }
        for (field, ids) in [
            ("cross_sell_products", &record.cross_sell_ids),
            ("upsell_products", &record.upsell_ids),
            ("related_products", &record.related_ids),
        ] {
            let related = self.related(tenant, ids, now).await;
            data.insert(field.to_string(), Value::Array(related));
        }

        let attributes = self
            .source
            .config_value(tenant, PRODUCT_INDEX_ATTRIBUTES)
            .await?
            .map(|raw| parse_attribute_list(&raw))
            .unwrap_or_default();
        let search = search_tokens(&attributes, &data);

        let mut doc = SearchDocument::new(id, EntityKind::Product, Value::Object(data));
        doc.url = record.url_key.clone();
        doc.sku = record.sku.clone();
        doc.name = record.name.clone();
        doc.search = search;
        doc.updated_at = record.updated_at;
        doc.price = record.final_price.or(record.price);
        doc.stock = record.stock_qty;
        doc.in_stock = Some(record.in_stock);
        doc.category_ids = record.category_ids.clone();
        Ok(doc)
    }
}

impl EntitySyncEngine<ProductAdapter> {
    /// Incrementally sync the product with this sku in every tenant.
    #[instrument(skip(self), fields(kind = "product", run_id = %Uuid::new_v4()))]
    pub async fn update_single_by_sku(&self, sku: &str) -> SyncReport {
        let sku = sku.trim();
        if sku.is_empty() {
            return SyncReport::new("update by sku");
        }
        let label = format!("product update by sku \"{}\"", sku);
        measure(
            &label,
            self.run(&label, SyncMode::Incremental, Selection::Key(sku.to_string())),
        )
        .await
    }

    /// Stock of a product changed.
    pub async fn update_stock(&self, id: EntityId) -> SyncReport {
        self.run("stock update", SyncMode::Incremental, Selection::Ids(vec![id]))
            .await
    }

    /// Price of a product changed.
    pub async fn update_price(&self, id: EntityId) -> SyncReport {
        self.run("price update", SyncMode::Incremental, Selection::Ids(vec![id]))
            .await
    }

    /// Force one re-sync of every composite parent deferred since the last
    /// sweep.
    #[instrument(skip(self), fields(run_id = %Uuid::new_v4()))]
    pub async fn sweep_pending_parents(&self) -> SyncReport {
        let trigger = "parent sweep";
        if !self.ctx.client.is_available(trigger).await {
            return SyncReport::skipped(trigger);
        }
        let run = self
            .ctx
            .tenants
            .for_each(trigger, |tenant| self.sweep_tenant(tenant.id))
            .await;
        Self::report(trigger, run)
    }

    async fn sweep_tenant(&self, tenant: TenantId) -> Result<TenantOutcome, SyncError> {
        let parents = self.ctx.cascade.take_pending_parents(tenant).await?;
        if parents.is_empty() {
            return Ok(TenantOutcome::new(tenant));
        }
        info!(tenant = %tenant, count = parents.len(), "Re-syncing deferred parents");
        self.sync_tenant(tenant, SyncMode::Forced, &Selection::Ids(parents))
            .await
    }
}
