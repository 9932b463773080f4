//! Catalog import and index maintenance commands.
//!
//! A catalog dump is a JSON document holding the entities, relationships,
//! labels and records that the record-storage system owns:
//!
//! ```json
//! {
//!   "entities":      [{"entity_id": "c1", "kind": "collection"}],
//!   "relationships": [{"from_entity_id": "c1", "from_kind": "collection",
//!                      "to_entity_id": "p1", "to_kind": "place"}],
//!   "labels":        [{"id": "p1", "language": "en", "label": "Death Valley"}],
//!   "records":       [{"record_id": "t1", "owner_entity_id": "p1",
//!                      "fields": [{"field_id": "name", "kind": "plainText",
//!                                  "value": {"en": {"value": "Death Valley"}}}]}]
//! }
//! ```
//!
//! Loading writes each record through the same path a record save takes:
//! the record row and its searchable values commit together.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use heritage_search_core::index;
use heritage_search_core::models::{Entity, Record, RelationshipEdge};

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::sqlite_store::SqliteStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub language: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDump {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub relationships: Vec<RelationshipEdge>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub records: Vec<Record>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub entities: usize,
    pub relationships: usize,
    pub labels: usize,
    pub records: usize,
    pub values: usize,
}

pub fn read_dump(path: &Path) -> Result<CatalogDump> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse catalog file: {}", path.display()))
}

/// Import a dump into `store`, indexing every record.
///
/// Labels are written before records so reference fields resolve. Entities
/// and edges are upserted, so loading the same dump twice is harmless.
pub async fn load_catalog(store: &SqliteStore, dump: &CatalogDump, language: &str) -> Result<LoadStats> {
    let mut stats = LoadStats::default();

    for entity in &dump.entities {
        store.upsert_entity(entity).await?;
        stats.entities += 1;
    }

    for edge in &dump.relationships {
        store.insert_edge(edge).await?;
        stats.relationships += 1;
    }

    for label in &dump.labels {
        store
            .upsert_label(&label.id, &label.language, &label.label)
            .await?;
        stats.labels += 1;
    }

    for record in &dump.records {
        let entry = index::save_record(store, record, language).await?;
        stats.records += 1;
        stats.values += entry.values.len();
    }

    tracing::info!(
        entities = stats.entities,
        relationships = stats.relationships,
        labels = stats.labels,
        records = stats.records,
        values = stats.values,
        "loaded catalog"
    );
    Ok(stats)
}

/// CLI entry point for `hsearch load <file>`.
pub async fn run_load(config: &Config, path: &Path) -> Result<()> {
    let dump = read_dump(path)?;
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;
    let store = SqliteStore::new(pool.clone());

    let stats = load_catalog(&store, &dump, &config.search.language).await?;
    pool.close().await;

    println!("Loaded {}:", path.display());
    println!("  entities: {}", stats.entities);
    println!("  relationships: {}", stats.relationships);
    println!("  labels: {}", stats.labels);
    println!("  records: {}", stats.records);
    println!("  searchable values: {}", stats.values);
    Ok(())
}

/// CLI entry point for `hsearch reindex`.
pub async fn run_reindex(config: &Config) -> Result<()> {
    let pool = db::connect_existing(config).await?;
    let store = SqliteStore::new(pool.clone());

    let stats = index::bulk_reindex_all(&store, &store, &config.search.language).await?;
    pool.close().await;

    println!("Rebuilt searchable value index:");
    println!("  records scanned: {}", stats.records_scanned);
    println!("  records indexed: {}", stats.records_indexed);
    println!("  searchable values: {}", stats.values_written);
    Ok(())
}

/// CLI entry point for `hsearch drop-record <id>`.
pub async fn run_drop_record(config: &Config, record_id: &str) -> Result<()> {
    let pool = db::connect_existing(config).await?;
    let store = SqliteStore::new(pool.clone());

    let (existed, removed) = index::delete_record(&store, record_id).await?;
    pool.close().await;

    if existed || removed > 0 {
        println!("Dropped record {} ({} searchable values removed).", record_id, removed);
    } else {
        println!("Record {} not found; nothing to drop.", record_id);
    }
    Ok(())
}
