//! Document types for the search index.
//!
//! This module defines the document structure that is stored per entity in a
//! tenant's index version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::entity::{EntityId, EntityKind};

/// Document representation for the search index.
///
/// `id` is the stable entity identifier and doubles as the backend document
/// id: re-indexing the same id overwrites the previous document.
///
/// # Fields
///
/// - `url`, `sku`, `name`, `identifier`: natural keys of the entity (which ones
///   are set depends on the kind)
/// - `search`: normalized search tokens
/// - `updated_at`, `price`, `stock`, `in_stock`: the fields compared by the
///   incremental change detection
/// - `category_ids`: aggregate memberships, kept so a later sync can see the
///   previous membership
/// - `payload`: the kind-keyed domain payload (`{"product": {...}}`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchDocument {
    pub id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub search: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_stock: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub category_ids: Vec<EntityId>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
    pub indexed_at: DateTime<Utc>,
}

impl SearchDocument {
    /// Create a document with only the id set and the payload stored under the
    /// kind's key.
    ///
    /// # Example
    ///
    /// ```
    /// use catalog_indexer_shared::{EntityKind, SearchDocument};
    /// use serde_json::json;
    ///
    /// let doc = SearchDocument::new(7, EntityKind::Product, json!({"sku": "blue-shoe"}));
    /// assert_eq!(doc.kind_payload(EntityKind::Product).unwrap()["sku"], "blue-shoe");
    /// ```
    pub fn new(id: EntityId, kind: EntityKind, payload: Value) -> Self {
        let mut map = Map::new();
        map.insert(kind.as_str().to_string(), payload);
        Self {
            id,
            url: None,
            sku: None,
            name: None,
            identifier: None,
            is_active: None,
            search: Vec::new(),
            updated_at: None,
            price: None,
            stock: None,
            in_stock: None,
            category_ids: Vec::new(),
            payload: map,
            indexed_at: Utc::now(),
        }
    }

    /// The domain payload stored under the kind's key.
    pub fn kind_payload(&self, kind: EntityKind) -> Option<&Value> {
        self.payload.get(kind.as_str())
    }

    /// The key the downstream cache layer uses for this document: the url when
    /// present, otherwise the identifier.
    pub fn natural_key(&self) -> Option<&str> {
        self.url
            .as_deref()
            .or(self.identifier.as_deref())
            .filter(|key| !key.is_empty())
    }

    /// The change-detection fields of this document.
    pub fn fingerprint(&self) -> ChangeFingerprint {
        ChangeFingerprint {
            updated_at: self.updated_at,
            price: self.price,
            stock: self.stock,
            in_stock: self.in_stock,
        }
    }

    /// Serialize the document into the JSON body sent to the backend.
    pub fn to_body(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Parse a stored backend document.
    pub fn from_body(body: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(body)
    }
}

/// The small, explicit set of fields compared by incremental change detection.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChangeFingerprint {
    pub updated_at: Option<DateTime<Utc>>,
    pub price: Option<f64>,
    pub stock: Option<f64>,
    pub in_stock: Option<bool>,
}
