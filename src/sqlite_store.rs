//! SQLite-backed implementation of the core storage traits.
//!
//! Index writes each run in one transaction, so a failure leaves a record's
//! previous entries in place, and SQLite's single-writer lock serializes
//! concurrent reindexes of the same record. Neighbor and kind lookups are
//! batched with `IN (...)` lists so a graph walk costs one query per hop.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use heritage_search_core::models::{
    fold_case, Entity, FieldValue, IndexedRecord, Neighbor, Record, RelationshipEdge,
    SearchableValueEntry,
};
use heritage_search_core::store::{
    LabelStore, RecordSource, RecordStore, RelationshipGraph, SearchIndex,
};

/// Ids per `IN (...)` list, kept well below SQLite's bind-parameter limit.
const BATCH: usize = 400;

/// SQLite implementation of every storage trait in
/// [`heritage_search_core::store`], plus the catalog writes used by
/// [`crate::load`].
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn upsert_entity(&self, entity: &Entity) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO entities (entity_id, kind) VALUES (?, ?)
            ON CONFLICT(entity_id) DO UPDATE SET kind = excluded.kind
            "#,
        )
        .bind(&entity.entity_id)
        .bind(&entity.kind)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert an edge, registering unseen endpoints with the kinds the edge
    /// declares. Re-inserting an existing edge is a no-op.
    pub async fn insert_edge(&self, edge: &RelationshipEdge) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for (id, kind) in [
            (&edge.from_entity_id, &edge.from_kind),
            (&edge.to_entity_id, &edge.to_kind),
        ] {
            sqlx::query("INSERT OR IGNORE INTO entities (entity_id, kind) VALUES (?, ?)")
                .bind(id)
                .bind(kind)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO relationships (from_entity_id, from_kind, to_entity_id, to_kind)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&edge.from_entity_id)
        .bind(&edge.from_kind)
        .bind(&edge.to_entity_id)
        .bind(&edge.to_kind)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn upsert_label(&self, id: &str, language: &str, label: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO labels (id, language, label) VALUES (?, ?, ?)
            ON CONFLICT(id, language) DO UPDATE SET label = excluded.label
            "#,
        )
        .bind(id)
        .bind(language)
        .bind(label)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Store a record in the mirror without touching the index. Record
    /// saves go through [`RecordStore::save_record`] instead.
    pub async fn upsert_record(&self, record: &Record) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        write_record(&mut conn, record).await
    }
}

async fn write_record(conn: &mut sqlx::SqliteConnection, record: &Record) -> Result<()> {
    let fields_json = serde_json::to_string(&record.fields)?;
    sqlx::query(
        r#"
        INSERT INTO records (record_id, owner_entity_id, fields_json) VALUES (?, ?, ?)
        ON CONFLICT(record_id) DO UPDATE SET
            owner_entity_id = excluded.owner_entity_id,
            fields_json = excluded.fields_json
        "#,
    )
    .bind(&record.record_id)
    .bind(&record.owner_entity_id)
    .bind(&fields_json)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

fn push_id_list<'a>(qb: &mut QueryBuilder<'a, Sqlite>, ids: &'a [String]) {
    qb.push("(");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(id.as_str());
    }
    separated.push_unseparated(")");
}

async fn insert_values(
    conn: &mut sqlx::SqliteConnection,
    record: &IndexedRecord,
) -> Result<()> {
    for value in &record.values {
        sqlx::query(
            r#"
            INSERT INTO searchable_values (record_id, owner_entity_id, value, value_folded)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&record.record_id)
        .bind(&record.owner_entity_id)
        .bind(value)
        .bind(fold_case(value))
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl SearchIndex for SqliteStore {
    async fn replace_record_values(&self, entry: &IndexedRecord) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM searchable_values WHERE record_id = ?")
            .bind(&entry.record_id)
            .execute(&mut *tx)
            .await?;

        insert_values(&mut tx, entry).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_record_values(&self, record_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM searchable_values WHERE record_id = ?")
            .bind(record_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn replace_all(&self, records: &[IndexedRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM searchable_values")
            .execute(&mut *tx)
            .await?;

        for record in records {
            insert_values(&mut tx, record).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn match_term(&self, folded_term: &str) -> Result<HashSet<String>> {
        if folded_term.is_empty() {
            return Ok(HashSet::new());
        }
        let rows = sqlx::query(
            "SELECT DISTINCT owner_entity_id FROM searchable_values WHERE instr(value_folded, ?) > 0",
        )
        .bind(folded_term)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| row.get::<String, _>("owner_entity_id"))
            .collect())
    }

    async fn record_values(&self, record_id: &str) -> Result<Vec<SearchableValueEntry>> {
        let rows = sqlx::query(
            "SELECT record_id, owner_entity_id, value FROM searchable_values WHERE record_id = ? ORDER BY id",
        )
        .bind(record_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| SearchableValueEntry {
                record_id: row.get("record_id"),
                owner_entity_id: row.get("owner_entity_id"),
                value: row.get("value"),
            })
            .collect())
    }

    async fn value_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM searchable_values")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn save_record(&self, record: &Record, entry: &IndexedRecord) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        write_record(&mut tx, record).await?;
        sqlx::query("DELETE FROM searchable_values WHERE record_id = ?")
            .bind(&entry.record_id)
            .execute(&mut *tx)
            .await?;
        insert_values(&mut tx, entry).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_record(&self, record_id: &str) -> Result<(bool, u64)> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM searchable_values WHERE record_id = ?")
            .bind(record_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        let existed = sqlx::query("DELETE FROM records WHERE record_id = ?")
            .bind(record_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        tx.commit().await?;
        Ok((existed, removed))
    }
}

#[async_trait]
impl RelationshipGraph for SqliteStore {
    async fn neighbors(&self, entity_id: &str) -> Result<Vec<Neighbor>> {
        let rows = sqlx::query(
            r#"
            SELECT to_entity_id AS entity_id, to_kind AS kind
            FROM relationships WHERE from_entity_id = ?
            UNION ALL
            SELECT from_entity_id AS entity_id, from_kind AS kind
            FROM relationships WHERE to_entity_id = ? AND from_entity_id != to_entity_id
            "#,
        )
        .bind(entity_id)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Neighbor {
                entity_id: row.get("entity_id"),
                kind: row.get("kind"),
            })
            .collect())
    }

    async fn neighbors_of_many(&self, entity_ids: &[String]) -> Result<Vec<Neighbor>> {
        let mut out = Vec::new();
        for chunk in entity_ids.chunks(BATCH) {
            let mut qb = QueryBuilder::<Sqlite>::new(
                "SELECT to_entity_id AS entity_id, to_kind AS kind FROM relationships WHERE from_entity_id IN ",
            );
            push_id_list(&mut qb, chunk);
            qb.push(
                " UNION ALL SELECT from_entity_id AS entity_id, from_kind AS kind FROM relationships \
                 WHERE from_entity_id != to_entity_id AND to_entity_id IN ",
            );
            push_id_list(&mut qb, chunk);

            let rows = qb.build().fetch_all(&self.pool).await?;
            out.extend(rows.iter().map(|row| Neighbor {
                entity_id: row.get("entity_id"),
                kind: row.get("kind"),
            }));
        }
        Ok(out)
    }

    async fn entity_kinds(&self, entity_ids: &[String]) -> Result<HashMap<String, String>> {
        let mut out = HashMap::new();
        for chunk in entity_ids.chunks(BATCH) {
            let mut qb =
                QueryBuilder::<Sqlite>::new("SELECT entity_id, kind FROM entities WHERE entity_id IN ");
            push_id_list(&mut qb, chunk);

            let rows = qb.build().fetch_all(&self.pool).await?;
            out.extend(
                rows.iter()
                    .map(|row| (row.get::<String, _>("entity_id"), row.get::<String, _>("kind"))),
            );
        }
        Ok(out)
    }

    async fn entities_of_kind(&self, kind: &str) -> Result<Vec<String>> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT entity_id FROM entities WHERE kind = ? ORDER BY entity_id")
                .bind(kind)
                .fetch_all(&self.pool)
                .await?;
        Ok(ids)
    }
}

#[async_trait]
impl LabelStore for SqliteStore {
    async fn labels(&self, ids: &[String], language: &str) -> Result<HashMap<String, String>> {
        let mut out = HashMap::new();
        for chunk in ids.chunks(BATCH) {
            let mut qb = QueryBuilder::<Sqlite>::new("SELECT id, label FROM labels WHERE language = ");
            qb.push_bind(language);
            qb.push(" AND id IN ");
            push_id_list(&mut qb, chunk);

            let rows = qb.build().fetch_all(&self.pool).await?;
            out.extend(
                rows.iter()
                    .map(|row| (row.get::<String, _>("id"), row.get::<String, _>("label"))),
            );
        }
        Ok(out)
    }
}

#[async_trait]
impl RecordSource for SqliteStore {
    async fn all_records(&self) -> Result<Vec<Record>> {
        let rows = sqlx::query(
            "SELECT record_id, owner_entity_id, fields_json FROM records ORDER BY record_id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let record_id: String = row.get("record_id");
            let fields_json: String = row.get("fields_json");
            let fields: Vec<FieldValue> = match serde_json::from_str(&fields_json) {
                Ok(fields) => fields,
                Err(e) => {
                    tracing::warn!(record_id = record_id.as_str(), error = %e, "unreadable record fields; indexing none");
                    Vec::new()
                }
            };
            records.push(Record {
                record_id,
                owner_entity_id: row.get("owner_entity_id"),
                fields,
            });
        }
        Ok(records)
    }
}
