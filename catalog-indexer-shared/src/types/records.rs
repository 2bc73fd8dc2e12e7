//! Records delivered by the system-of-record adapter.
//!
//! These are best-effort snapshots of the current entity state. Extraction of
//! attribute labels, price rules and stock lives in the adapter; the engine
//! only composes documents from what it receives here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::entity::EntityId;
use crate::types::tenant::TenantId;

/// Product type as reported by the system-of-record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    #[default]
    Simple,
    /// A composite product built from simple children.
    Configurable,
    Bundle,
    Grouped,
    Virtual,
    #[serde(other)]
    Other,
}

/// Frontend input type of an attribute. The set is closed: every input type
/// the system-of-record knows maps to one of these variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeInput {
    Select,
    Boolean,
    Multiselect,
    Price,
    Date,
    Weight,
    #[default]
    #[serde(other)]
    Default,
}

/// One selectable option of a select/multiselect attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeOption {
    pub value: String,
    pub label: String,
}

/// A raw attribute value of an entity, with the metadata needed to label it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeValue {
    pub code: String,
    #[serde(default)]
    pub input: AttributeInput,
    #[serde(default)]
    pub raw: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<AttributeOption>,
}

/// A product snapshot for one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// `None` when the adapter could not resolve the entity; such records are
    /// rejected by the engine.
    pub id: Option<EntityId>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub url_key: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub type_id: ProductType,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub final_price: Option<f64>,
    #[serde(default)]
    pub special_price: Option<f64>,
    #[serde(default)]
    pub special_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub special_to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rule_price: Option<f64>,
    #[serde(default)]
    pub stock_qty: Option<f64>,
    #[serde(default = "default_true")]
    pub in_stock: bool,
    #[serde(default)]
    pub category_ids: Vec<EntityId>,
    /// Children of a configurable product.
    #[serde(default)]
    pub child_ids: Vec<EntityId>,
    #[serde(default)]
    pub configurable_options: Option<Value>,
    #[serde(default)]
    pub cross_sell_ids: Vec<EntityId>,
    #[serde(default)]
    pub upsell_ids: Vec<EntityId>,
    #[serde(default)]
    pub related_ids: Vec<EntityId>,
    #[serde(default)]
    pub attributes: Vec<AttributeValue>,
    /// Remaining raw entity data.
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl ProductRecord {
    /// A minimal enabled, visible simple product.
    pub fn new(id: EntityId, sku: impl Into<String>) -> Self {
        let sku = sku.into();
        Self {
            id: Some(id),
            url_key: Some(sku.to_lowercase()),
            name: Some(sku.clone()),
            sku: Some(sku),
            type_id: ProductType::Simple,
            enabled: true,
            visible: true,
            updated_at: None,
            price: None,
            final_price: None,
            special_price: None,
            special_from: None,
            special_to: None,
            rule_price: None,
            stock_qty: None,
            in_stock: true,
            category_ids: Vec::new(),
            child_ids: Vec::new(),
            configurable_options: None,
            cross_sell_ids: Vec::new(),
            upsell_ids: Vec::new(),
            related_ids: Vec::new(),
            attributes: Vec::new(),
            data: Map::new(),
        }
    }

    pub fn is_composite(&self) -> bool {
        self.type_id == ProductType::Configurable
    }
}

/// A category snapshot for one tenant. Flags such as `is_active` arrive in
/// `data` in the system-of-record's raw `"1"`/`"0"` form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub id: Option<EntityId>,
    #[serde(default)]
    pub name: Option<String>,
    /// Display path; categories without one cannot be cached.
    #[serde(default)]
    pub url_path: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// Identifier-only reference to a member of an aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSummary {
    pub id: EntityId,
    #[serde(default)]
    pub sku: Option<String>,
}

/// A content page. `store_ids` containing tenant `0` means "all tenants".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub id: Option<EntityId>,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub store_ids: Vec<TenantId>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// A content block. `store_ids` containing tenant `0` means "all tenants".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub id: Option<EntityId>,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub store_ids: Vec<TenantId>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// Whether content assigned to `store_ids` is visible in `tenant`.
pub fn assigned_to(store_ids: &[TenantId], tenant: TenantId) -> bool {
    store_ids
        .iter()
        .any(|store| *store == TenantId::ALL || *store == tenant)
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_product_defaults() {
        let product: ProductRecord = serde_json::from_value(json!({"id": 7, "sku": "S-7"})).unwrap();
        assert_eq!(product.id, Some(7));
        assert!(product.enabled);
        assert!(product.visible);
        assert!(product.in_stock);
        assert_eq!(product.type_id, ProductType::Simple);
        assert!(!product.is_composite());
    }

    #[test]
    fn test_unknown_attribute_input_is_default() {
        let attr: AttributeValue =
            serde_json::from_value(json!({"code": "color", "input": "swatch_visual"})).unwrap();
        assert_eq!(attr.input, AttributeInput::Default);
    }

    #[test]
    fn test_store_assignment() {
        assert!(assigned_to(&[TenantId(0)], TenantId(3)));
        assert!(assigned_to(&[TenantId(1), TenantId(3)], TenantId(3)));
        assert!(!assigned_to(&[TenantId(1)], TenantId(3)));
        assert!(!assigned_to(&[], TenantId(3)));
    }
}
