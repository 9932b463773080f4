//! Attribute filters over structured record data.
//!
//! A filter is a sequence of groups, each an `and` or `or` group of
//! `field_id == value` conditions. Conditions are folded left to right into
//! one boolean expression per record: an `and` condition is conjoined with
//! everything before it, an `or` condition disjoined. So
//! `[and(a, b), or(c)]` reads `(a AND b) OR c`. An expression with no
//! conditions accepts every record.
//!
//! A filter selects the owners of matching records. Callers intersect that
//! set with term results or with the unfiltered listing.
//!
//! ```json
//! [{"op": "and", "conditions": [{"field_id": "material", "value": "v-quartz"}]},
//!  {"op": "or",  "conditions": [{"field_id": "material", "value": "v-jade"}]}]
//! ```

use std::collections::HashSet;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::Record;
use crate::store::RecordSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    And,
    Or,
}

/// `field_id == value` on one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCondition {
    pub field_id: String,
    pub value: Value,
}

impl FieldCondition {
    /// True when the record has a field `field_id` whose value equals
    /// `value`. A list-valued field also matches any single member.
    pub fn matches(&self, record: &Record) -> bool {
        record
            .fields
            .iter()
            .filter(|field| field.field_id == self.field_id)
            .any(|field| match (&field.value, &self.value) {
                (Value::Array(items), wanted) if !wanted.is_array() => items.contains(wanted),
                (actual, wanted) => actual == wanted,
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeFilter {
    pub op: FilterOp,
    #[serde(default)]
    pub conditions: Vec<FieldCondition>,
}

/// Evaluate `filters` against one record.
pub fn record_matches(record: &Record, filters: &[AttributeFilter]) -> bool {
    let mut acc: Option<bool> = None;
    for group in filters {
        for condition in &group.conditions {
            let hit = condition.matches(record);
            acc = Some(match (acc, group.op) {
                (None, _) => hit,
                (Some(prev), FilterOp::And) => prev && hit,
                (Some(prev), FilterOp::Or) => prev || hit,
            });
        }
    }
    acc.unwrap_or(true)
}

/// Owners of every record `source` yields that satisfies `filters`.
pub async fn resolve_attribute_filters<R>(
    source: &R,
    filters: &[AttributeFilter],
) -> Result<HashSet<String>>
where
    R: RecordSource + ?Sized,
{
    let records = source.all_records().await?;
    let owners: HashSet<String> = records
        .iter()
        .filter(|record| record_matches(record, filters))
        .map(|record| record.owner_entity_id.clone())
        .collect();
    tracing::debug!(
        groups = filters.len(),
        scanned = records.len(),
        owners = owners.len(),
        "resolved attribute filters"
    );
    Ok(owners)
}
