//! Value formatting shared by the document builders.

use catalog_indexer_shared::{AttributeInput, AttributeOption, AttributeValue, ProductRecord};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

/// Format one attribute as `{"value": raw, "label": label}`.
///
/// Attributes without a raw value are left out of documents.
pub fn format_attribute(attribute: &AttributeValue) -> Option<Value> {
    let raw = attribute.raw.as_deref().filter(|raw| !raw.is_empty())?;
    let label = match attribute.input {
        AttributeInput::Select => Value::String(select_label(raw, &attribute.options)),
        AttributeInput::Multiselect => Value::String(multiselect_label(raw, &attribute.options)),
        AttributeInput::Boolean => Value::Bool(raw == "1"),
        AttributeInput::Price | AttributeInput::Weight => nullable_float(raw),
        AttributeInput::Date | AttributeInput::Default => Value::String(raw.to_string()),
    };
    Some(json!({ "value": raw, "label": label }))
}

fn select_label(raw: &str, options: &[AttributeOption]) -> String {
    options
        .iter()
        .find(|option| !option.value.is_empty() && option.value == raw)
        .map(|option| option.label.clone())
        .unwrap_or_default()
}

fn multiselect_label(raw: &str, options: &[AttributeOption]) -> String {
    raw.split(',')
        .map(|value| select_label(value.trim(), options))
        .filter(|label| !label.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

fn nullable_float(raw: &str) -> Value {
    raw.trim()
        .parse::<f64>()
        .ok()
        .and_then(|value| serde_json::Number::from_f64(value).map(Value::Number))
        .unwrap_or(Value::Null)
}

/// Boolean flag as delivered by the system-of-record: `"1"`, `1` or `true`.
pub fn to_bool(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::String(raw) => raw == "1",
        Value::Number(number) => number.as_i64() == Some(1),
        _ => false,
    }
}

/// Convert the listed flags of `data` to booleans where present.
pub fn convert_bool_attributes(data: &mut Map<String, Value>, attributes: &[&str]) {
    for attribute in attributes {
        if let Some(value) = data.get_mut(*attribute) {
            *value = Value::Bool(to_bool(value));
        }
    }
}

/// Split a comma-separated attribute code list.
pub fn parse_attribute_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_string)
        .collect()
}

/// Search tokens of an object for the configured attribute codes.
///
/// Objects with a `value` contribute that value, scalars themselves and other
/// structures their JSON encoding. Empty values are dropped; the rest is
/// lowercased and stripped of markup.
pub fn search_tokens(attributes: &[String], object: &Map<String, Value>) -> Vec<String> {
    attributes
        .iter()
        .filter_map(|code| object.get(code))
        .filter_map(|value| {
            let value = match value {
                Value::Object(map) if map.contains_key("value") => &map["value"],
                other => other,
            };
            match value {
                Value::Null => None,
                Value::Bool(false) => None,
                Value::String(text) => Some(text.clone()),
                Value::Number(number) => Some(number.to_string()),
                Value::Bool(true) => Some("1".to_string()),
                structured => Some(structured.to_string()),
            }
        })
        .filter(|token| !token.is_empty() && token != "0")
        .map(|token| strip_tags(&token.to_lowercase()))
        .collect()
}

/// Remove `<...>` markup from a string.
pub fn strip_tags(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut in_tag = false;
    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => output.push(c),
            _ => {}
        }
    }
    output
}

/// The special price, if the product is inside its special price window.
///
/// Both window bounds must be set.
pub fn special_price(product: &ProductRecord, now: DateTime<Utc>) -> Option<f64> {
    match (product.special_from, product.special_to) {
        (Some(from), Some(to)) if from <= now && now <= to => product.special_price,
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn attribute(input: AttributeInput, raw: &str) -> AttributeValue {
        AttributeValue {
            code: "color".to_string(),
            input,
            raw: Some(raw.to_string()),
            options: vec![
                AttributeOption {
                    value: "4".to_string(),
                    label: "Blue".to_string(),
                },
                AttributeOption {
                    value: "5".to_string(),
                    label: "Red".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_attribute_labels() {
        let label = |input, raw| format_attribute(&attribute(input, raw)).unwrap()["label"].clone();
        assert_eq!(label(AttributeInput::Select, "4"), json!("Blue"));
        assert_eq!(label(AttributeInput::Select, "9"), json!(""));
        assert_eq!(label(AttributeInput::Multiselect, "4,9,5"), json!("Blue, Red"));
        assert_eq!(label(AttributeInput::Boolean, "1"), json!(true));
        assert_eq!(label(AttributeInput::Boolean, "0"), json!(false));
        assert_eq!(label(AttributeInput::Price, "12.50"), json!(12.5));
        assert_eq!(label(AttributeInput::Weight, "heavy"), Value::Null);
        assert_eq!(label(AttributeInput::Date, "2024-01-01"), json!("2024-01-01"));
        assert_eq!(label(AttributeInput::Default, "x"), json!("x"));
    }

    #[test]
    fn test_attribute_without_value_is_skipped() {
        assert!(format_attribute(&attribute(AttributeInput::Select, "")).is_none());
    }

    #[test]
    fn test_search_tokens() {
        let object = json!({
            "name": "Blue <b>Shoe</b>",
            "color": {"value": "4", "label": "Blue"},
            "tags": ["A", "B"],
            "empty": "",
            "ignored": "not configured"
        });
        let codes = parse_attribute_list("name, color,tags,empty,missing");
        let tokens = search_tokens(&codes, object.as_object().unwrap());
        assert_eq!(tokens, vec!["blue shoe", "4", "[\"a\",\"b\"]"]);
    }

    #[test]
    fn test_bool_conversion() {
        let mut data = json!({"is_active": "1", "is_anchor": "0", "name": "x"})
            .as_object()
            .cloned()
            .unwrap();
        convert_bool_attributes(&mut data, &["is_active", "is_anchor", "include_in_menu"]);
        assert_eq!(data["is_active"], json!(true));
        assert_eq!(data["is_anchor"], json!(false));
        assert!(!data.contains_key("include_in_menu"));
    }

    #[test]
    fn test_special_price_window() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap();
        let mut product = ProductRecord::new(1, "S-1");
        product.special_price = Some(9.0);
        assert_eq!(special_price(&product, now), None);

        product.special_from = Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(special_price(&product, now), None);

        product.special_to = Some(Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap());
        assert_eq!(special_price(&product, now), Some(9.0));

        let later = Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap();
        assert_eq!(special_price(&product, later), None);
    }
}
