//! Storage abstraction for heritage-search.
//!
//! The engine reaches its data through four traits, so the same index
//! maintenance and resolution code runs against SQLite in production and
//! against [`memory::InMemoryStore`] in tests:
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`SearchIndex`] | Searchable value entries and term matching |
//! | [`RelationshipGraph`] | Entity kinds and neighbor lookup |
//! | [`LabelStore`] | Preferred labels for reference extraction |
//! | [`RecordSource`] | Enumerates records for a full rebuild |
//! | [`RecordStore`] | Writes a record and its index entries together |
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{IndexedRecord, Neighbor, Record, SearchableValueEntry};

/// The denormalized searchable value projection.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Replace every entry of `entry.record_id` with `entry.values`.
    ///
    /// Must be atomic: readers see either the old entries or the new ones.
    async fn replace_record_values(&self, entry: &IndexedRecord) -> Result<()>;

    /// Delete every entry of a record. Returns the number of rows removed.
    async fn delete_record_values(&self, record_id: &str) -> Result<u64>;

    /// Drop the whole index and insert `records` in its place, atomically.
    async fn replace_all(&self, records: &[IndexedRecord]) -> Result<()>;

    /// Owners with at least one value containing `folded_term`.
    ///
    /// `folded_term` has already been passed through
    /// [`fold_case`](crate::models::fold_case) and is non-empty.
    async fn match_term(&self, folded_term: &str) -> Result<HashSet<String>>;

    /// Current entries of one record, for inspection.
    async fn record_values(&self, record_id: &str) -> Result<Vec<SearchableValueEntry>>;

    /// Total number of entries in the index.
    async fn value_count(&self) -> Result<u64>;
}

/// Read-only view of the entity relationship graph.
#[async_trait]
pub trait RelationshipGraph: Send + Sync {
    /// Entities joined to `entity_id` by an edge in either direction.
    ///
    /// Every incident edge contributes exactly once.
    async fn neighbors(&self, entity_id: &str) -> Result<Vec<Neighbor>>;

    /// Neighbors of every id in `entity_ids`, flattened.
    ///
    /// Backends with a cheaper batch query should override this.
    async fn neighbors_of_many(&self, entity_ids: &[String]) -> Result<Vec<Neighbor>> {
        let mut out = Vec::new();
        for id in entity_ids {
            out.extend(self.neighbors(id).await?);
        }
        Ok(out)
    }

    /// Kinds of the given entities. Unknown ids are absent from the map.
    async fn entity_kinds(&self, entity_ids: &[String]) -> Result<HashMap<String, String>>;

    /// Every entity of `kind`: the unfiltered listing.
    async fn entities_of_kind(&self, kind: &str) -> Result<Vec<String>>;
}

/// Preferred labels per language.
#[async_trait]
pub trait LabelStore: Send + Sync {
    /// Labels for `ids` in `language`. Ids without a label are absent.
    async fn labels(&self, ids: &[String], language: &str) -> Result<HashMap<String, String>>;
}

/// Enumerates the records eligible for indexing.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn all_records(&self) -> Result<Vec<Record>>;
}

/// Record writes that carry their index entries with them.
///
/// A record and its searchable values become visible together or not at
/// all, so a failed index write never leaves a saved record with stale
/// entries behind.
#[async_trait]
pub trait RecordStore: SearchIndex {
    /// Store `record` and replace its entries with `entry.values` in one
    /// atomic write.
    async fn save_record(&self, record: &Record, entry: &IndexedRecord) -> Result<()>;

    /// Remove a record and all of its entries in one atomic write.
    /// Returns whether the record existed and how many entries went.
    async fn delete_record(&self, record_id: &str) -> Result<(bool, u64)>;
}
