//! Maintenance of the searchable value index.
//!
//! The record-save workflow calls [`save_record`] for every save and
//! [`delete_record`] for every delete; each writes the record and its
//! entries in one atomic store write, so a save is durable only together
//! with its index update. [`reindex_record`] and [`drop_record`] touch the
//! index alone, for callers that keep records elsewhere.
//! [`bulk_reindex_all`] recomputes the whole projection from a
//! [`RecordSource`], for initial population or after extraction rules
//! change.
//!
//! Entries of a record are never patched. Each write replaces the full set
//! in one store transaction, so a failed write leaves the previous entries
//! in place and surfaces as [`SearchError::IndexConsistency`].

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::{Result, SearchError};
use crate::extract::{extract, referenced_ids, LabelLookup};
use crate::models::{FieldValue, IndexedRecord, Record};
use crate::store::{LabelStore, RecordSource, RecordStore, SearchIndex};

/// Summary of a full rebuild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebuildStats {
    /// Records read from the source.
    pub records_scanned: usize,
    /// Records that produced at least one value.
    pub records_indexed: usize,
    /// Entries written.
    pub values_written: usize,
}

fn consistency(record_id: &str) -> impl Fn(anyhow::Error) -> SearchError + Copy + '_ {
    move |source| SearchError::IndexConsistency {
        record_id: record_id.to_string(),
        source,
    }
}

/// Compute the entries a record should have, without writing them.
///
/// Labels needed by reference fields are fetched in one batch.
pub async fn prepare_record<S>(
    store: &S,
    record_id: &str,
    owner_entity_id: &str,
    fields: &[FieldValue],
    language: &str,
) -> Result<IndexedRecord>
where
    S: LabelStore + ?Sized,
{
    let ids = label_ids(fields.iter());
    let labels = if ids.is_empty() {
        HashMap::new()
    } else {
        store
            .labels(&ids, language)
            .await
            .map_err(consistency(record_id))?
    };

    Ok(IndexedRecord {
        record_id: record_id.to_string(),
        owner_entity_id: owner_entity_id.to_string(),
        values: record_values(fields, language, &labels),
    })
}

/// Recompute and replace the entries of one record.
///
/// Returns what was written. A record whose fields yield no text ends up
/// with no entries.
pub async fn reindex_record<S>(
    store: &S,
    record_id: &str,
    owner_entity_id: &str,
    fields: &[FieldValue],
    language: &str,
) -> Result<IndexedRecord>
where
    S: SearchIndex + LabelStore + ?Sized,
{
    let entry = prepare_record(store, record_id, owner_entity_id, fields, language).await?;

    store
        .replace_record_values(&entry)
        .await
        .map_err(consistency(record_id))?;

    tracing::debug!(
        record_id,
        owner_entity_id,
        values = entry.values.len(),
        "reindexed record"
    );
    Ok(entry)
}

/// Save a record together with its recomputed entries.
///
/// Either both the record and its entries are written or neither is.
pub async fn save_record<S>(store: &S, record: &Record, language: &str) -> Result<IndexedRecord>
where
    S: RecordStore + LabelStore + ?Sized,
{
    let entry = prepare_record(
        store,
        &record.record_id,
        &record.owner_entity_id,
        &record.fields,
        language,
    )
    .await?;

    store
        .save_record(record, &entry)
        .await
        .map_err(consistency(&record.record_id))?;

    tracing::debug!(
        record_id = record.record_id.as_str(),
        values = entry.values.len(),
        "saved record"
    );
    Ok(entry)
}

/// Delete a record together with its entries.
///
/// Returns whether the record existed and how many entries were removed.
/// Deleting an unknown record is a no-op.
pub async fn delete_record<S>(store: &S, record_id: &str) -> Result<(bool, u64)>
where
    S: RecordStore + ?Sized,
{
    let (existed, removed) = store
        .delete_record(record_id)
        .await
        .map_err(consistency(record_id))?;
    tracing::debug!(record_id, existed, removed, "deleted record");
    Ok((existed, removed))
}

/// Remove every entry of a record. Dropping an unindexed record is a no-op.
pub async fn drop_record<S>(store: &S, record_id: &str) -> Result<u64>
where
    S: SearchIndex + ?Sized,
{
    let removed = store
        .delete_record_values(record_id)
        .await
        .map_err(consistency(record_id))?;
    tracing::debug!(record_id, removed, "dropped record from index");
    Ok(removed)
}

/// Rebuild the index from every record `source` yields.
///
/// Delete-all-then-insert-all in one store write, so re-running it is safe
/// and an interrupted rebuild leaves the old index intact.
pub async fn bulk_reindex_all<S, R>(store: &S, source: &R, language: &str) -> Result<RebuildStats>
where
    S: SearchIndex + LabelStore + ?Sized,
    R: RecordSource + ?Sized,
{
    let rebuild = |source: anyhow::Error| SearchError::Rebuild { source };

    let records = source.all_records().await.map_err(rebuild)?;
    let ids = label_ids(records.iter().flat_map(|r| r.fields.iter()));
    let labels = if ids.is_empty() {
        HashMap::new()
    } else {
        store.labels(&ids, language).await.map_err(rebuild)?
    };

    let indexed: Vec<IndexedRecord> = records
        .iter()
        .map(|record| index_entry(record, language, &labels))
        .filter(|entry| !entry.values.is_empty())
        .collect();

    store.replace_all(&indexed).await.map_err(rebuild)?;

    let stats = RebuildStats {
        records_scanned: records.len(),
        records_indexed: indexed.len(),
        values_written: indexed.iter().map(|e| e.values.len()).sum(),
    };
    tracing::info!(
        records = stats.records_scanned,
        indexed = stats.records_indexed,
        values = stats.values_written,
        "rebuilt searchable value index"
    );
    Ok(stats)
}

/// Extract the distinct, non-empty searchable values of a record's fields,
/// in field order.
pub fn record_values(fields: &[FieldValue], language: &str, labels: &dyn LabelLookup) -> Vec<String> {
    let mut seen = HashSet::new();
    fields
        .iter()
        .filter(|field| field.kind.is_indexable())
        .flat_map(|field| extract(&field.value, &field.kind, language, labels))
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

fn index_entry(record: &Record, language: &str, labels: &dyn LabelLookup) -> IndexedRecord {
    IndexedRecord {
        record_id: record.record_id.clone(),
        owner_entity_id: record.owner_entity_id.clone(),
        values: record_values(&record.fields, language, labels),
    }
}

fn label_ids<'a>(fields: impl Iterator<Item = &'a FieldValue>) -> Vec<String> {
    let mut ids: Vec<String> = fields
        .flat_map(|field| referenced_ids(&field.value, &field.kind))
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    ids.sort();
    ids
}
