//! # Composite Line Items
//!
//! Bundled or kitted lines carry a list of sub-items. Older rows stored
//! that list in several JSON shapes, so reading it back is lenient:
//!
//! ```text
//! "[{\"variantId\":\"a\",...}]"        double-encoded string
//! [{"variantId":"a","quantity":2}]     array (camelCase or snake_case)
//! {"variantId":"a","quantity":2}       single object
//! {"a":{"name":"Vase","quantity":1}}   map keyed by variant id
//! null / "" / garbage                  empty list
//! ```
//!
//! Writes always use the canonical array form.

use serde_json::{Map, Value};

use crate::types::CompositeItem;

/// Parses the stored JSON text of a composite list.
///
/// Never fails; unreadable input yields an empty list.
pub fn parse_composites_str(raw: &str) -> Vec<CompositeItem> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => parse_composites(&value),
        Err(_) => Vec::new(),
    }
}

/// Parses an already-decoded composite value in any of the legacy shapes.
pub fn parse_composites(value: &Value) -> Vec<CompositeItem> {
    match value {
        Value::String(inner) => parse_composites_str(inner),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_object().and_then(|obj| parse_entry(obj, None)))
            .collect(),
        Value::Object(obj) => {
            if let Some(item) = parse_entry(obj, None) {
                return vec![item];
            }
            obj.iter()
                .filter_map(|(key, entry)| entry.as_object().and_then(|o| parse_entry(o, Some(key))))
                .collect()
        }
        _ => Vec::new(),
    }
}

/// Serialises a composite list into the canonical array form.
pub fn composites_to_json(items: &[CompositeItem]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

fn parse_entry(obj: &Map<String, Value>, key: Option<&String>) -> Option<CompositeItem> {
    let variant_id = field(obj, &["variantId", "variant_id", "id"])
        .and_then(as_text)
        .or_else(|| key.cloned())?;
    let name = field(obj, &["name", "title"]).and_then(as_text).unwrap_or_default();
    let quantity = field(obj, &["quantity", "qty"]).and_then(as_quantity).unwrap_or(1);

    if variant_id.is_empty() || quantity <= 0 {
        return None;
    }

    Some(CompositeItem {
        variant_id,
        name,
        quantity,
    })
}

fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_quantity(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
