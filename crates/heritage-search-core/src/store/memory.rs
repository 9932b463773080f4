//! In-memory store implementing every storage trait, for tests and for
//! embedding the engine without a database.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock`. Each index write
//! happens under one write lock, which makes replacement of a record's
//! entries atomic and serializes concurrent writers. Record saves take the
//! record lock before the value lock, always in that order.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{
    fold_case, Entity, IndexedRecord, Neighbor, Record, RelationshipEdge, SearchableValueEntry,
};

use super::{LabelStore, RecordSource, RecordStore, RelationshipGraph, SearchIndex};

struct StoredValue {
    entry: SearchableValueEntry,
    folded: String,
}

/// In-memory catalog: entities, edges, labels, records and the searchable
/// value index.
pub struct InMemoryStore {
    entities: RwLock<HashMap<String, String>>,
    edges: RwLock<Vec<RelationshipEdge>>,
    labels: RwLock<HashMap<(String, String), String>>,
    records: RwLock<HashMap<String, Record>>,
    values: RwLock<Vec<StoredValue>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
            edges: RwLock::new(Vec::new()),
            labels: RwLock::new(HashMap::new()),
            records: RwLock::new(HashMap::new()),
            values: RwLock::new(Vec::new()),
        }
    }

    pub fn add_entity(&self, entity: Entity) {
        write(&self.entities).insert(entity.entity_id, entity.kind);
    }

    /// Add an edge. Both endpoints are registered as entities of the kinds
    /// the edge declares.
    pub fn add_edge(&self, edge: RelationshipEdge) {
        {
            let mut entities = write(&self.entities);
            entities
                .entry(edge.from_entity_id.clone())
                .or_insert_with(|| edge.from_kind.clone());
            entities
                .entry(edge.to_entity_id.clone())
                .or_insert_with(|| edge.to_kind.clone());
        }
        write(&self.edges).push(edge);
    }

    pub fn add_label(&self, id: &str, language: &str, label: &str) {
        write(&self.labels).insert((id.to_string(), language.to_string()), label.to_string());
    }

    /// Store a record so [`RecordSource::all_records`] returns it. Does not
    /// touch the index.
    pub fn put_record(&self, record: Record) {
        write(&self.records).insert(record.record_id.clone(), record);
    }

    pub fn remove_record(&self, record_id: &str) {
        write(&self.records).remove(record_id);
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn stored_values(record: &IndexedRecord) -> impl Iterator<Item = StoredValue> + '_ {
    record.values.iter().map(|value| StoredValue {
        entry: SearchableValueEntry {
            record_id: record.record_id.clone(),
            owner_entity_id: record.owner_entity_id.clone(),
            value: value.clone(),
        },
        folded: fold_case(value),
    })
}

#[async_trait]
impl SearchIndex for InMemoryStore {
    async fn replace_record_values(&self, entry: &IndexedRecord) -> Result<()> {
        let mut values = write(&self.values);
        values.retain(|sv| sv.entry.record_id != entry.record_id);
        values.extend(stored_values(entry));
        Ok(())
    }

    async fn delete_record_values(&self, record_id: &str) -> Result<u64> {
        let mut values = write(&self.values);
        let before = values.len();
        values.retain(|sv| sv.entry.record_id != record_id);
        Ok((before - values.len()) as u64)
    }

    async fn replace_all(&self, records: &[IndexedRecord]) -> Result<()> {
        let rebuilt: Vec<StoredValue> = records.iter().flat_map(stored_values).collect();
        *write(&self.values) = rebuilt;
        Ok(())
    }

    async fn match_term(&self, folded_term: &str) -> Result<HashSet<String>> {
        if folded_term.is_empty() {
            return Ok(HashSet::new());
        }
        let values = read(&self.values);
        Ok(values
            .iter()
            .filter(|sv| sv.folded.contains(folded_term))
            .map(|sv| sv.entry.owner_entity_id.clone())
            .collect())
    }

    async fn record_values(&self, record_id: &str) -> Result<Vec<SearchableValueEntry>> {
        let values = read(&self.values);
        Ok(values
            .iter()
            .filter(|sv| sv.entry.record_id == record_id)
            .map(|sv| sv.entry.clone())
            .collect())
    }

    async fn value_count(&self) -> Result<u64> {
        Ok(read(&self.values).len() as u64)
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn save_record(&self, record: &Record, entry: &IndexedRecord) -> Result<()> {
        let mut records = write(&self.records);
        let mut values = write(&self.values);
        values.retain(|sv| sv.entry.record_id != entry.record_id);
        values.extend(stored_values(entry));
        records.insert(record.record_id.clone(), record.clone());
        Ok(())
    }

    async fn delete_record(&self, record_id: &str) -> Result<(bool, u64)> {
        let mut records = write(&self.records);
        let mut values = write(&self.values);
        let existed = records.remove(record_id).is_some();
        let before = values.len();
        values.retain(|sv| sv.entry.record_id != record_id);
        Ok((existed, (before - values.len()) as u64))
    }
}

#[async_trait]
impl RelationshipGraph for InMemoryStore {
    async fn neighbors(&self, entity_id: &str) -> Result<Vec<Neighbor>> {
        let edges = read(&self.edges);
        let mut out = Vec::new();
        for edge in edges.iter() {
            if edge.from_entity_id == entity_id {
                out.push(Neighbor {
                    entity_id: edge.to_entity_id.clone(),
                    kind: edge.to_kind.clone(),
                });
            } else if edge.to_entity_id == entity_id {
                out.push(Neighbor {
                    entity_id: edge.from_entity_id.clone(),
                    kind: edge.from_kind.clone(),
                });
            }
        }
        Ok(out)
    }

    async fn entity_kinds(&self, entity_ids: &[String]) -> Result<HashMap<String, String>> {
        let entities = read(&self.entities);
        Ok(entity_ids
            .iter()
            .filter_map(|id| entities.get(id).map(|kind| (id.clone(), kind.clone())))
            .collect())
    }

    async fn entities_of_kind(&self, kind: &str) -> Result<Vec<String>> {
        let entities = read(&self.entities);
        let mut ids: Vec<String> = entities
            .iter()
            .filter(|(_, k)| k.as_str() == kind)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl LabelStore for InMemoryStore {
    async fn labels(&self, ids: &[String], language: &str) -> Result<HashMap<String, String>> {
        let labels = read(&self.labels);
        Ok(ids
            .iter()
            .filter_map(|id| {
                labels
                    .get(&(id.clone(), language.to_string()))
                    .map(|label| (id.clone(), label.clone()))
            })
            .collect())
    }
}

#[async_trait]
impl RecordSource for InMemoryStore {
    async fn all_records(&self) -> Result<Vec<Record>> {
        let records = read(&self.records);
        let mut out: Vec<Record> = records.values().cloned().collect();
        out.sort_by(|a, b| a.record_id.cmp(&b.record_id));
        Ok(out)
    }
}
