//! Incremental change detection.

use catalog_indexer_shared::SearchDocument;

/// Decides whether a freshly built document differs from the stored one.
///
/// Only the document fingerprint is compared: the last-modified timestamp,
/// the price and the stock fields. Edits to any other field are not seen by
/// incremental syncs; a full rebuild writes every document regardless.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeDetector;

impl ChangeDetector {
    pub fn has_changed(&self, stored: Option<&SearchDocument>, fresh: &SearchDocument) -> bool {
        match stored {
            None => true,
            Some(stored) => stored.fingerprint() != fresh.fingerprint(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_indexer_shared::EntityKind;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn doc(price: f64) -> SearchDocument {
        let mut doc = SearchDocument::new(7, EntityKind::Product, json!({"name": "Shoe"}));
        doc.updated_at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).single();
        doc.price = Some(price);
        doc.stock = Some(4.0);
        doc.in_stock = Some(true);
        doc
    }

    #[test]
    fn test_absent_document_is_changed() {
        assert!(ChangeDetector.has_changed(None, &doc(10.0)));
    }

    #[test]
    fn test_fingerprint_fields() {
        let stored = doc(10.0);
        assert!(!ChangeDetector.has_changed(Some(&stored), &doc(10.0)));
        assert!(ChangeDetector.has_changed(Some(&stored), &doc(12.5)));

        let mut restocked = doc(10.0);
        restocked.in_stock = Some(false);
        assert!(ChangeDetector.has_changed(Some(&stored), &restocked));

        let mut touched = doc(10.0);
        touched.updated_at = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).single();
        assert!(ChangeDetector.has_changed(Some(&stored), &touched));
    }

    #[test]
    fn test_other_fields_are_not_compared() {
        let stored = doc(10.0);
        let mut renamed = doc(10.0);
        renamed.name = Some("red shoe".to_string());
        renamed.search = vec!["red".to_string()];
        assert!(!ChangeDetector.has_changed(Some(&stored), &renamed));
    }
}
