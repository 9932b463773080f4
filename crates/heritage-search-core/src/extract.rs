//! Derivation of searchable text from structured field values.
//!
//! Extraction is total: a value that does not have the shape its kind
//! promises yields no text and is logged at `debug`. Label lookups are
//! served from a prefetched [`LabelLookup`] so extraction itself does no
//! I/O; use [`referenced_ids`] to learn which labels a field needs.

use std::collections::HashMap;

use serde_json::Value;

use crate::models::ValueKind;

/// Read access to preferred labels in a single language.
///
/// Keys are controlled-vocabulary value ids for reference kinds and entity
/// ids for [`ValueKind::ResourceList`].
pub trait LabelLookup {
    fn label(&self, id: &str) -> Option<&str>;
}

impl LabelLookup for HashMap<String, String> {
    fn label(&self, id: &str) -> Option<&str> {
        self.get(id).map(String::as_str)
    }
}

/// Labels that resolve nothing. Useful for plain-text-only records.
pub struct NoLabels;

impl LabelLookup for NoLabels {
    fn label(&self, _id: &str) -> Option<&str> {
        None
    }
}

/// Extract zero or more searchable strings from one field value.
pub fn extract(
    value: &Value,
    kind: &ValueKind,
    language: &str,
    labels: &dyn LabelLookup,
) -> Vec<String> {
    if value.is_null() {
        return Vec::new();
    }

    match kind {
        ValueKind::PlainText => localized_text(value, language).into_iter().collect(),
        ValueKind::SingleReference => match value.as_str() {
            Some(id) => resolve_labels(std::iter::once(id), labels),
            None => skip(kind, value),
        },
        ValueKind::ReferenceList => match reference_ids(value) {
            Some(ids) => resolve_labels(ids.into_iter(), labels),
            None => skip(kind, value),
        },
        ValueKind::ResourceList => match resource_ids(value) {
            Some(ids) => resolve_labels(ids.into_iter(), labels),
            None => skip(kind, value),
        },
        ValueKind::Unknown(_) => Vec::new(),
    }
}

/// Ids whose labels [`extract`] will ask for on this field.
pub fn referenced_ids(value: &Value, kind: &ValueKind) -> Vec<String> {
    let ids = match kind {
        ValueKind::SingleReference => value.as_str().map(|id| vec![id]),
        ValueKind::ReferenceList => reference_ids(value),
        ValueKind::ResourceList => resource_ids(value),
        ValueKind::PlainText | ValueKind::Unknown(_) => None,
    };
    ids.unwrap_or_default()
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn localized_text(value: &Value, language: &str) -> Option<String> {
    let text = match value {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map
            .get(language)
            .and_then(|entry| entry.get("value"))
            .and_then(Value::as_str)?,
        _ => {
            tracing::debug!(kind = "plainText", "skipping malformed field value");
            return None;
        }
    };
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn reference_ids(value: &Value) -> Option<Vec<&str>> {
    match value {
        Value::String(id) => Some(vec![id.as_str()]),
        Value::Array(items) => Some(items.iter().filter_map(Value::as_str).collect()),
        _ => None,
    }
}

fn resource_ids(value: &Value) -> Option<Vec<&str>> {
    match value {
        Value::Array(items) => Some(items.iter().filter_map(resource_reference).collect()),
        Value::Object(_) => Some(resource_reference(value).into_iter().collect()),
        _ => None,
    }
}

fn resource_reference(item: &Value) -> Option<&str> {
    item.get("resourceId").and_then(Value::as_str)
}

fn resolve_labels<'a>(ids: impl Iterator<Item = &'a str>, labels: &dyn LabelLookup) -> Vec<String> {
    ids.filter_map(|id| labels.label(id))
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .collect()
}

fn skip(kind: &ValueKind, value: &Value) -> Vec<String> {
    tracing::debug!(kind = kind.as_str(), value = %value, "skipping malformed field value");
    Vec::new()
}
