//! Directory response normalization.
//!
//! Backends answer lookups in one of three shapes:
//!
//! ```text
//! [ {tenant}, ... ]                     bare array
//! { "items": [...] }                    envelope
//! { "organizations": [...] }            envelope
//! { "id": ..., "name": ... }            single tenant
//! ```
//!
//! Entries that do not parse as a tenant are dropped; duplicate ids keep
//! the first occurrence. Only an explicitly empty array or envelope means
//! "no tenants". Unknown shapes, and lists where every entry was dropped,
//! are reported as unusable.

use serde_json::Value;

use crate::directory::types::Tenant;

const ENVELOPE_FIELDS: [&str; 2] = ["items", "organizations"];

/// Extract the tenant list from a lookup response body.
///
/// Returns `None` when the value is not a recognized shape or when it
/// carried entries but none of them parsed.
pub fn normalize(value: Value) -> Option<Vec<Tenant>> {
    let entries = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            let envelope = ENVELOPE_FIELDS.iter().find_map(|field| map.remove(*field));
            match envelope {
                Some(Value::Array(items)) => items,
                Some(single @ Value::Object(_)) => vec![single],
                Some(_) => return None,
                None if map.contains_key("id") => vec![Value::Object(map)],
                None => return None,
            }
        }
        _ => return None,
    };
    if entries.is_empty() {
        return Some(Vec::new());
    }

    let mut tenants: Vec<Tenant> = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_value::<Tenant>(entry) {
            Ok(t) if t.id.is_empty() => {}
            Ok(t) if tenants.iter().any(|seen| seen.id == t.id) => {}
            Ok(t) => tenants.push(t),
            Err(e) => tracing::debug!(error = %e, "Dropping malformed tenant entry"),
        }
    }
    if tenants.is_empty() {
        tracing::warn!("No usable tenant entry in a non-empty directory response");
        return None;
    }
    Some(tenants)
}

/// Parse and normalize raw bytes. Invalid JSON yields `None`.
pub fn normalize_body(body: &[u8]) -> Option<Vec<Tenant>> {
    serde_json::from_slice::<Value>(body).ok().and_then(normalize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(value: Value) -> Vec<String> {
        normalize(value)
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect()
    }

    #[test]
    fn test_bare_array() {
        assert_eq!(ids(json!([{"id": "1", "name": "Acme"}, {"id": 2, "name": "Beta"}])), vec!["1", "2"]);
    }

    #[test]
    fn test_envelopes() {
        assert_eq!(ids(json!({"items": [{"id": "1"}]})), vec!["1"]);
        assert_eq!(ids(json!({"organizations": [{"id": "7"}], "total": 1})), vec!["7"]);
    }

    #[test]
    fn test_single_object_is_wrapped() {
        let out = normalize(json!({"id": "1", "name": "Acme"})).unwrap();
        assert_eq!(out, vec![Tenant::new("1", "Acme")]);
    }

    #[test]
    fn test_explicitly_empty_lists() {
        assert_eq!(normalize(json!([])), Some(Vec::new()));
        assert_eq!(normalize(json!({"items": []})), Some(Vec::new()));
        assert_eq!(normalize(json!({"organizations": []})), Some(Vec::new()));
    }

    #[test]
    fn test_unusable_shapes() {
        assert!(normalize(json!({"message": "ok"})).is_none());
        assert!(normalize(json!({"items": "nope"})).is_none());
        assert!(normalize(json!(null)).is_none());
        assert!(normalize_body(b"<html>").is_none());
    }

    #[test]
    fn test_null_name_and_numeric_timestamp_are_kept() {
        assert_eq!(ids(json!([{"id": "1", "name": null}])), vec!["1"]);
        assert_eq!(ids(json!([{"id": "2", "name": "B", "createdAt": 1_700_000_000_000u64}])), vec!["2"]);
    }

    #[test]
    fn test_all_entries_dropped_is_unusable() {
        assert!(normalize(json!([{"name": "no id"}, {"id": ""}, {"id": true}])).is_none());
    }

    #[test]
    fn test_drops_bad_and_duplicate_entries() {
        let out = normalize(json!([
            {"id": "1", "name": "first"},
            {"name": "no id"},
            {"id": ""},
            {"id": "1", "name": "dup"}
        ]))
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "first");
    }
}
