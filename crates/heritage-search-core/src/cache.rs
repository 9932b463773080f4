//! Per-session store of the most recent filtered result set.
//!
//! The search handler writes here after every filtered search and clears
//! the entry after an unfiltered one; the map tile layer reads it to limit
//! which geometries it draws. An explicit empty set ("the search matched
//! nothing") and a missing entry ("no restriction") mean different things
//! to readers, so [`SessionCache::lookup`] keeps them apart.
//!
//! # Entry states
//!
//! ```text
//!            set                 ttl elapses
//!  Absent ────────▶ Valid ─────────────────────▶ Expired
//!    ▲                │                             │
//!    └──── clear ─────┴────────── clear ────────────┘
//! ```
//!
//! `set` on any state overwrites (last writer wins).

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Default entry lifetime: one day.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// What a reader finds for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// No entry, or an expired one: results are not restricted.
    Absent,
    /// The stored result set, possibly empty.
    Present(HashSet<String>),
}

/// Lifecycle state of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Absent,
    Valid,
    Expired,
}

struct CacheEntry {
    entity_ids: HashSet<String>,
    expires_at: DateTime<Utc>,
}

/// Keyed, TTL-bounded result store. Share it behind an `Arc`.
pub struct SessionCache {
    ttl: chrono::Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl SessionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Store `entity_ids` for `session_id`, replacing any existing entry.
    pub fn set(&self, session_id: &str, entity_ids: HashSet<String>) {
        self.set_at(session_id, entity_ids, Utc::now());
    }

    /// The stored set, or an empty set when absent or expired.
    pub fn get(&self, session_id: &str) -> HashSet<String> {
        match self.lookup(session_id) {
            CacheLookup::Present(ids) => ids,
            CacheLookup::Absent => HashSet::new(),
        }
    }

    /// Distinguishes "no entry" from "entry with an empty set".
    pub fn lookup(&self, session_id: &str) -> CacheLookup {
        self.lookup_at(session_id, Utc::now())
    }

    pub fn state(&self, session_id: &str) -> EntryState {
        self.state_at(session_id, Utc::now())
    }

    /// Remove the entry of one session.
    pub fn clear(&self, session_id: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(session_id);
    }

    /// Remove every entry.
    pub fn clear_all(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn set_at(&self, session_id: &str, entity_ids: HashSet<String>, now: DateTime<Utc>) {
        let expires_at = now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            session_id.to_string(),
            CacheEntry {
                entity_ids,
                expires_at,
            },
        );
    }

    fn lookup_at(&self, session_id: &str, now: DateTime<Utc>) -> CacheLookup {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        match entries.get(session_id) {
            Some(entry) if entry.expires_at > now => CacheLookup::Present(entry.entity_ids.clone()),
            _ => CacheLookup::Absent,
        }
    }

    fn state_at(&self, session_id: &str, now: DateTime<Utc>) -> EntryState {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        match entries.get(session_id) {
            None => EntryState::Absent,
            Some(entry) if entry.expires_at > now => EntryState::Valid,
            Some(_) => EntryState::Expired,
        }
    }

    fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }
}

/// Where a search handler records and clears session results.
///
/// [`SessionCache`] keeps entries in process memory; backends that must
/// outlive a process (a CLI invocation, a restarted server) persist them.
#[async_trait]
pub trait ResultCache: Send + Sync {
    /// Store `entity_ids` for `session_id` with the cache's TTL, replacing
    /// any existing entry.
    async fn put_results(&self, session_id: &str, entity_ids: HashSet<String>) -> anyhow::Result<()>;

    /// Absent for a missing or expired entry; present (possibly empty)
    /// otherwise.
    async fn session_results(&self, session_id: &str) -> anyhow::Result<CacheLookup>;

    async fn clear_session(&self, session_id: &str) -> anyhow::Result<()>;

    async fn clear_sessions(&self) -> anyhow::Result<()>;
}

#[async_trait]
impl ResultCache for SessionCache {
    async fn put_results(&self, session_id: &str, entity_ids: HashSet<String>) -> anyhow::Result<()> {
        self.set(session_id, entity_ids);
        Ok(())
    }

    async fn session_results(&self, session_id: &str) -> anyhow::Result<CacheLookup> {
        Ok(self.lookup(session_id))
    }

    async fn clear_session(&self, session_id: &str) -> anyhow::Result<()> {
        self.clear(session_id);
        Ok(())
    }

    async fn clear_sessions(&self) -> anyhow::Result<()> {
        self.clear_all();
        Ok(())
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_absent_reads_empty() {
        let cache = SessionCache::default();
        assert_eq!(cache.lookup("s1"), CacheLookup::Absent);
        assert!(cache.get("s1").is_empty());
        assert_eq!(cache.state("s1"), EntryState::Absent);
    }

    #[test]
    fn test_empty_result_is_present() {
        let cache = SessionCache::default();
        cache.set("s1", HashSet::new());
        assert_eq!(cache.lookup("s1"), CacheLookup::Present(HashSet::new()));
        assert_eq!(cache.state("s1"), EntryState::Valid);
    }

    #[test]
    fn test_set_overwrites() {
        let cache = SessionCache::default();
        cache.set("s1", ids(&["a", "b"]));
        cache.set("s1", ids(&["c"]));
        assert_eq!(cache.get("s1"), ids(&["c"]));
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let cache = SessionCache::new(Duration::from_secs(60));
        let start = Utc::now();
        cache.set_at("s1", ids(&["a"]), start);

        let before = start + chrono::Duration::seconds(59);
        let after = start + chrono::Duration::seconds(61);
        assert_eq!(cache.state_at("s1", before), EntryState::Valid);
        assert_eq!(cache.state_at("s1", after), EntryState::Expired);
        assert_eq!(cache.lookup_at("s1", after), CacheLookup::Absent);
    }

    #[test]
    fn test_clear_from_any_state() {
        let cache = SessionCache::new(Duration::from_secs(60));
        let start = Utc::now();
        cache.set_at("valid", ids(&["a"]), start);
        cache.set_at("expired", ids(&["b"]), start - chrono::Duration::seconds(120));

        cache.clear("valid");
        cache.clear("expired");
        cache.clear("never-set");
        assert_eq!(cache.state("valid"), EntryState::Absent);
        assert_eq!(cache.state("expired"), EntryState::Absent);
    }

    #[test]
    fn test_clear_all_and_sessions_are_independent() {
        let cache = SessionCache::default();
        cache.set("s1", ids(&["a"]));
        cache.set("s2", ids(&["b"]));
        cache.clear("s1");
        assert_eq!(cache.get("s2"), ids(&["b"]));
        cache.clear_all();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_set_sweeps_expired_entries() {
        let cache = SessionCache::new(Duration::from_secs(60));
        let start = Utc::now();
        cache.set_at("old", ids(&["a"]), start - chrono::Duration::seconds(120));
        cache.set_at("new", ids(&["b"]), start);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.purge_expired_at(start), 0);
    }

    #[tokio::test]
    async fn test_result_cache_trait_keeps_empty_apart_from_absent() {
        let cache = SessionCache::default();
        let dyn_cache: &dyn ResultCache = &cache;

        dyn_cache.put_results("s1", HashSet::new()).await.unwrap();
        assert_eq!(
            dyn_cache.session_results("s1").await.unwrap(),
            CacheLookup::Present(HashSet::new())
        );
        dyn_cache.clear_session("s1").await.unwrap();
        assert_eq!(dyn_cache.session_results("s1").await.unwrap(), CacheLookup::Absent);
    }
}
