use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every table and index. Idempotent.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // Catalog entities and their kind
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entities (
            entity_id TEXT PRIMARY KEY,
            kind TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Directed relationships; parallel edges between one pair collapse
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS relationships (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            from_entity_id TEXT NOT NULL,
            from_kind TEXT NOT NULL,
            to_entity_id TEXT NOT NULL,
            to_kind TEXT NOT NULL,
            UNIQUE(from_entity_id, to_entity_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Preferred labels of vocabulary values and entity display names
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS labels (
            id TEXT NOT NULL,
            language TEXT NOT NULL,
            label TEXT NOT NULL,
            PRIMARY KEY (id, language)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Mirror of structured records, the source for full rebuilds
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            record_id TEXT PRIMARY KEY,
            owner_entity_id TEXT NOT NULL,
            fields_json TEXT NOT NULL DEFAULT '[]'
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Searchable value projection
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS searchable_values (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            record_id TEXT NOT NULL,
            owner_entity_id TEXT NOT NULL,
            value TEXT NOT NULL,
            value_folded TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Per-session result sets of the last filtered search
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS session_results (
            session_id TEXT PRIMARY KEY,
            ids_json TEXT NOT NULL,
            expires_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_relationships_from ON relationships(from_entity_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_relationships_to ON relationships(to_entity_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_entities_kind ON entities(kind)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_searchable_values_record ON searchable_values(record_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_searchable_values_owner ON searchable_values(owner_entity_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
