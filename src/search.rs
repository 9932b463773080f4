//! Application-level search: query resolution, attribute filters, session
//! caching, and pagination.
//!
//! The resolution algorithm lives in `heritage_search_core::engine` and works
//! through the store traits. [`SearchService`] adds what a search request
//! handler needs around it:
//!
//! - attribute filters narrow term results, or the unfiltered listing when
//!   there are no terms;
//! - a search with terms or attribute filters stores its result set for the
//!   session; one with neither lists every target-kind entity and clears
//!   the session cache;
//! - when the graph cannot be read, the service degrades to direct hits
//!   only (if configured) instead of failing the request;
//! - results are sorted and cut into pages.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use heritage_search_core::cache::{CacheLookup, ResultCache};
use heritage_search_core::engine::{self, QueryResolution};
use heritage_search_core::filter::{self, AttributeFilter};
use heritage_search_core::models::ResolutionQuery;
use heritage_search_core::store::{LabelStore, RecordSource, RelationshipGraph, SearchIndex};

use crate::config::{ClearScope, Config};
use crate::db;
use crate::session_store::SqliteResultCache;
use crate::sqlite_store::SqliteStore;

/// Service tuning, decoupled from the config file.
#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub target_kind: String,
    pub max_depth: usize,
    pub page_size: usize,
    pub degrade_on_graph_error: bool,
    pub clear_scope: ClearScope,
}

impl SearchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            target_kind: config.search.target_kind.clone(),
            max_depth: config.search.max_depth,
            page_size: config.search.page_size,
            degrade_on_graph_error: config.search.degrade_on_graph_error,
            clear_scope: config.cache.clear_scope,
        }
    }
}

/// One search as submitted by a request handler.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub terms: Vec<String>,
    /// Groups of `field_id == value` conditions on record data.
    pub attribute_filters: Vec<AttributeFilter>,
    pub session_id: String,
    /// 1-based page number.
    pub page: usize,
    /// Overrides the configured walk depth.
    pub max_depth: Option<usize>,
    /// Overrides the configured target kind.
    pub target_kind: Option<String>,
}

/// One page of resolved entity ids.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SearchPage {
    pub ids: Vec<String>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    /// Index of `ids[0]` within the full sorted result.
    pub offset: usize,
    /// False for the unfiltered listing.
    pub filtered: bool,
    /// True when graph errors forced a direct-hit-only or empty result.
    pub degraded: bool,
}

impl SearchPage {
    pub fn page_count(&self) -> usize {
        self.total.div_ceil(self.page_size).max(1)
    }

    pub fn is_past_end(&self) -> bool {
        self.ids.is_empty() && self.page > self.page_count()
    }
}

/// Search entry point shared by every frontend.
pub struct SearchService<S> {
    store: Arc<S>,
    cache: Arc<dyn ResultCache>,
    settings: SearchSettings,
}

impl<S> SearchService<S>
where
    S: SearchIndex + RelationshipGraph + RecordSource,
{
    pub fn new(store: Arc<S>, cache: Arc<dyn ResultCache>, settings: SearchSettings) -> Self {
        Self {
            store,
            cache,
            settings,
        }
    }

    pub fn cache(&self) -> &Arc<dyn ResultCache> {
        &self.cache
    }

    /// The result restriction recorded for a session, as the map layer
    /// reads it.
    pub async fn session_results(&self, session_id: &str) -> Result<CacheLookup> {
        self.cache.session_results(session_id).await
    }

    pub async fn execute(&self, request: &SearchRequest) -> Result<SearchPage> {
        let query = ResolutionQuery {
            terms: request.terms.clone(),
            target_kind: request
                .target_kind
                .clone()
                .unwrap_or_else(|| self.settings.target_kind.clone()),
            max_depth: request.max_depth.unwrap_or(self.settings.max_depth),
        };

        let (resolution, degraded) = self.resolve(&query).await?;

        let mut found = match resolution {
            QueryResolution::Unfiltered => None,
            QueryResolution::Filtered(found) => Some(found),
        };
        if !request.attribute_filters.is_empty() {
            let owners =
                filter::resolve_attribute_filters(self.store.as_ref(), &request.attribute_filters)
                    .await?;
            let base: HashSet<String> = match found {
                Some(found) => found,
                None => self
                    .store
                    .entities_of_kind(&query.target_kind)
                    .await?
                    .into_iter()
                    .collect(),
            };
            found = Some(base.intersection(&owners).cloned().collect());
        }

        let (mut ids, filtered) = match found {
            None => {
                match self.settings.clear_scope {
                    ClearScope::Session => self.cache.clear_session(&request.session_id).await?,
                    ClearScope::All => self.cache.clear_sessions().await?,
                }
                (self.store.entities_of_kind(&query.target_kind).await?, false)
            }
            Some(found) => {
                self.cache
                    .put_results(&request.session_id, found.clone())
                    .await?;
                (found.into_iter().collect::<Vec<_>>(), true)
            }
        };
        ids.sort();

        let page_size = self.settings.page_size;
        let page = request.page.max(1);
        let total = ids.len();
        let offset = (page - 1).saturating_mul(page_size).min(total);
        let end = offset.saturating_add(page_size).min(total);

        tracing::info!(
            session_id = request.session_id.as_str(),
            terms = request.terms.len(),
            attribute_filters = request.attribute_filters.len(),
            total,
            filtered,
            degraded,
            "search executed"
        );

        Ok(SearchPage {
            ids: ids[offset..end].to_vec(),
            total,
            page,
            page_size,
            offset,
            filtered,
            degraded,
        })
    }

    async fn resolve(&self, query: &ResolutionQuery) -> Result<(QueryResolution, bool)> {
        let store = self.store.as_ref();
        let err = match engine::resolve_query(store, store, query).await {
            Ok(resolution) => return Ok((resolution, false)),
            Err(e) if self.settings.degrade_on_graph_error => e,
            Err(e) => return Err(e.into()),
        };

        tracing::warn!(error = %err, "search resolution failed; retrying with direct hits only");
        let direct = ResolutionQuery {
            max_depth: 0,
            ..query.clone()
        };
        match engine::resolve_query(store, store, &direct).await {
            Ok(resolution) => Ok((resolution, true)),
            Err(e) => {
                tracing::warn!(error = %e, "direct-hit fallback failed; returning no results");
                Ok((QueryResolution::Filtered(HashSet::new()), true))
            }
        }
    }
}

/// CLI entry point for `hsearch search`.
pub async fn run_search(config: &Config, request: SearchRequest, json: bool) -> Result<()> {
    let pool = db::connect_existing(config).await?;
    let store = Arc::new(SqliteStore::new(pool.clone()));
    let cache = Arc::new(SqliteResultCache::new(pool.clone(), config.cache.ttl()));
    let service = SearchService::new(store.clone(), cache, SearchSettings::from_config(config));

    let page = service.execute(&request).await?;
    let names = store.labels(&page.ids, &config.search.language).await?;
    pool.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    if page.total == 0 {
        println!("No results.");
    } else if page.is_past_end() {
        println!(
            "{} results ({}); page {} is past the last page ({}).",
            page.total,
            if page.filtered { "filtered" } else { "unfiltered" },
            page.page,
            page.page_count()
        );
    } else {
        println!(
            "{} results ({}), page {} of {}{}",
            page.total,
            if page.filtered { "filtered" } else { "unfiltered" },
            page.page,
            page.page_count(),
            if page.degraded { " [degraded]" } else { "" }
        );
        for (i, id) in page.ids.iter().enumerate() {
            let n = page.offset + i + 1;
            match names.get(id) {
                Some(name) => println!("{}. {} / {}", n, id, name),
                None => println!("{}. {}", n, id),
            }
        }
    }
    if page.filtered {
        println!("session: {}", request.session_id);
    }
    Ok(())
}

/// CLI entry point for `hsearch session <id>`: show or clear what a
/// session's last filtered search stored.
pub async fn run_session(config: &Config, session_id: &str, clear: bool, json: bool) -> Result<()> {
    let pool = db::connect_existing(config).await?;
    let cache = SqliteResultCache::new(pool.clone(), config.cache.ttl());

    if clear {
        cache.clear_session(session_id).await?;
        pool.close().await;
        println!("Cleared session {}.", session_id);
        return Ok(());
    }

    let lookup = cache.session_results(session_id).await?;
    pool.close().await;

    let ids = match lookup {
        CacheLookup::Absent => {
            if json {
                println!("null");
            } else {
                println!("No cached results for session {}.", session_id);
            }
            return Ok(());
        }
        CacheLookup::Present(ids) => {
            let mut ids: Vec<String> = ids.into_iter().collect();
            ids.sort();
            ids
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&ids)?);
    } else {
        println!("Session {}: {} cached results", session_id, ids.len());
        for id in &ids {
            println!("  {}", id);
        }
    }
    Ok(())
}
