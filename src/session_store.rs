//! Session result cache persisted in SQLite.
//!
//! Each CLI invocation is its own process, so the in-memory
//! [`SessionCache`](heritage_search_core::cache::SessionCache) would forget
//! every entry on exit. [`SqliteResultCache`] keeps the same contract in the
//! `session_results` table: entries expire after the TTL, an expired entry
//! reads as absent, and writes sweep expired rows.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use heritage_search_core::cache::{CacheLookup, ResultCache};

pub struct SqliteResultCache {
    pool: SqlitePool,
    ttl: chrono::Duration,
}

impl SqliteResultCache {
    pub fn new(pool: SqlitePool, ttl: Duration) -> Self {
        Self {
            pool,
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
        }
    }

    fn expiry_millis(&self, now_millis: i64) -> i64 {
        now_millis.saturating_add(self.ttl.num_milliseconds())
    }
}

#[async_trait]
impl ResultCache for SqliteResultCache {
    async fn put_results(&self, session_id: &str, entity_ids: HashSet<String>) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        let mut ids: Vec<String> = entity_ids.into_iter().collect();
        ids.sort();
        let ids_json = serde_json::to_string(&ids)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM session_results WHERE expires_at <= ?")
            .bind(now)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"
            INSERT INTO session_results (session_id, ids_json, expires_at) VALUES (?, ?, ?)
            ON CONFLICT(session_id) DO UPDATE SET
                ids_json = excluded.ids_json,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(session_id)
        .bind(&ids_json)
        .bind(self.expiry_millis(now))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn session_results(&self, session_id: &str) -> Result<CacheLookup> {
        let row: Option<String> = sqlx::query_scalar(
            "SELECT ids_json FROM session_results WHERE session_id = ? AND expires_at > ?",
        )
        .bind(session_id)
        .bind(Utc::now().timestamp_millis())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            None => Ok(CacheLookup::Absent),
            Some(ids_json) => {
                let ids: Vec<String> = serde_json::from_str(&ids_json)?;
                Ok(CacheLookup::Present(ids.into_iter().collect()))
            }
        }
    }

    async fn clear_session(&self, session_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM session_results WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear_sessions(&self) -> Result<()> {
        sqlx::query("DELETE FROM session_results")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
