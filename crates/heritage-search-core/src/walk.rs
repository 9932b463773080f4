//! Bounded relationship-graph walk from term matches to target-kind
//! entities.
//!
//! # Algorithm
//!
//! 1. Look up the kinds of the seed entities. Seeds of the target kind are
//!    accepted immediately; every other seed (including seeds of unknown
//!    kind) forms the initial frontier.
//! 2. For each hop up to `max_depth`, fetch the neighbors of the whole
//!    frontier in one call. A neighbor not seen before is either accepted
//!    (target kind) or queued for the next hop.
//! 3. Accepted entities are sinks and are never expanded.
//! 4. Every entity is classified at most once per call. The visited set is
//!    what guarantees termination on cyclic graphs.
//!
//! A target entity exactly `max_depth` hops from a seed is found; one at
//! `max_depth + 1` hops is not.

use std::collections::HashSet;

use anyhow::Result;

use crate::store::RelationshipGraph;

/// Result of one walk, with counters for logging and diagnostics.
#[derive(Debug, Clone, Default)]
pub struct Walk {
    /// Accepted entities of the target kind.
    pub matches: HashSet<String>,
    /// Seeds that were already of the target kind.
    pub direct_hits: usize,
    /// Hops actually expanded (at most `max_depth`).
    pub hops: usize,
    /// Distinct entities classified, seeds included.
    pub visited: usize,
    /// True when the walk stopped at `max_depth` with a non-empty frontier.
    pub truncated: bool,
}

/// Entities of `target_kind` reachable from `seeds` within `max_depth` hops.
pub async fn resolve<G>(
    graph: &G,
    seeds: &HashSet<String>,
    target_kind: &str,
    max_depth: usize,
) -> Result<HashSet<String>>
where
    G: RelationshipGraph + ?Sized,
{
    Ok(walk(graph, seeds, target_kind, max_depth).await?.matches)
}

/// Like [`resolve`], but reports traversal counters alongside the matches.
pub async fn walk<G>(
    graph: &G,
    seeds: &HashSet<String>,
    target_kind: &str,
    max_depth: usize,
) -> Result<Walk>
where
    G: RelationshipGraph + ?Sized,
{
    let mut result = Walk::default();
    if seeds.is_empty() {
        return Ok(result);
    }

    let mut seed_ids: Vec<String> = seeds.iter().cloned().collect();
    seed_ids.sort();
    let kinds = graph.entity_kinds(&seed_ids).await?;

    let mut visited: HashSet<String> = seeds.clone();
    let mut frontier: Vec<String> = Vec::new();
    for id in seed_ids {
        if kinds.get(&id).map(String::as_str) == Some(target_kind) {
            result.matches.insert(id);
        } else {
            frontier.push(id);
        }
    }
    result.direct_hits = result.matches.len();

    while !frontier.is_empty() && result.hops < max_depth {
        result.hops += 1;
        let mut next = Vec::new();
        for neighbor in graph.neighbors_of_many(&frontier).await? {
            if !visited.insert(neighbor.entity_id.clone()) {
                continue;
            }
            if neighbor.kind == target_kind {
                result.matches.insert(neighbor.entity_id);
            } else {
                next.push(neighbor.entity_id);
            }
        }
        tracing::trace!(
            hop = result.hops,
            expanded = frontier.len(),
            discovered = next.len(),
            matches = result.matches.len(),
            "graph walk hop"
        );
        frontier = next;
    }

    result.truncated = !frontier.is_empty();
    result.visited = visited.len();
    tracing::debug!(
        target_kind,
        seeds = seeds.len(),
        direct_hits = result.direct_hits,
        matches = result.matches.len(),
        hops = result.hops,
        visited = result.visited,
        truncated = result.truncated,
        "graph walk finished"
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Entity, Neighbor, RelationshipEdge};
    use crate::store::memory::InMemoryStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TARGET: &str = "collection";

    fn link(store: &InMemoryStore, from: (&str, &str), to: (&str, &str)) {
        store.add_edge(RelationshipEdge {
            from_entity_id: from.0.to_string(),
            from_kind: from.1.to_string(),
            to_entity_id: to.0.to_string(),
            to_kind: to.1.to_string(),
        });
    }

    fn ids(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// A chain `s0 - s1 - ... - s{len-1} - target`, all non-target but the
    /// last, so `target` is `len` hops from `s0`.
    fn chain(len: usize) -> InMemoryStore {
        let store = InMemoryStore::new();
        let names: Vec<String> = (0..len).map(|i| format!("s{}", i)).collect();
        for pair in names.windows(2) {
            link(&store, (pair[0].as_str(), "place"), (pair[1].as_str(), "place"));
        }
        link(&store, (names[len - 1].as_str(), "place"), ("target", TARGET));
        store
    }

    #[tokio::test]
    async fn test_empty_seeds_touch_nothing() {
        struct Unreachable;

        #[async_trait]
        impl RelationshipGraph for Unreachable {
            async fn neighbors(&self, _: &str) -> Result<Vec<Neighbor>> {
                anyhow::bail!("graph should not be queried")
            }
            async fn entity_kinds(&self, _: &[String]) -> Result<HashMap<String, String>> {
                anyhow::bail!("graph should not be queried")
            }
            async fn entities_of_kind(&self, _: &str) -> Result<Vec<String>> {
                anyhow::bail!("graph should not be queried")
            }
        }

        let out = resolve(&Unreachable, &HashSet::new(), TARGET, 3).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_direct_hit_at_depth_zero() {
        let store = InMemoryStore::new();
        store.add_entity(Entity {
            entity_id: "c1".to_string(),
            kind: TARGET.to_string(),
        });
        link(&store, ("p1", "place"), ("c2", TARGET));

        let out = resolve(&store, &ids(&["c1", "p1"]), TARGET, 0).await.unwrap();
        assert_eq!(out, ids(&["c1"]));
    }

    #[tokio::test]
    async fn test_depth_bound_is_inclusive() {
        let store = chain(3);
        assert_eq!(
            resolve(&store, &ids(&["s0"]), TARGET, 3).await.unwrap(),
            ids(&["target"])
        );
        assert!(resolve(&store, &ids(&["s0"]), TARGET, 2)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_cycle_terminates_without_match() {
        let store = InMemoryStore::new();
        link(&store, ("a", "place"), ("b", "place"));
        link(&store, ("b", "place"), ("c", "place"));
        link(&store, ("c", "place"), ("a", "place"));

        let report = walk(&store, &ids(&["a"]), TARGET, 5).await.unwrap();
        assert!(report.matches.is_empty());
        assert_eq!(report.visited, 3);
        assert!(!report.truncated);
    }

    #[tokio::test]
    async fn test_matches_are_sinks() {
        // s - c1 - p - c2: c2 is only reachable through the match c1.
        let store = InMemoryStore::new();
        link(&store, ("s", "specimen"), ("c1", TARGET));
        link(&store, ("c1", TARGET), ("p", "place"));
        link(&store, ("p", "place"), ("c2", TARGET));

        let out = resolve(&store, &ids(&["s"]), TARGET, 5).await.unwrap();
        assert_eq!(out, ids(&["c1"]));
    }

    #[tokio::test]
    async fn test_direct_hit_seed_is_not_expanded() {
        let store = InMemoryStore::new();
        link(&store, ("c1", TARGET), ("p", "place"));
        link(&store, ("p", "place"), ("c2", TARGET));

        let out = resolve(&store, &ids(&["c1"]), TARGET, 5).await.unwrap();
        assert_eq!(out, ids(&["c1"]));
    }

    #[tokio::test]
    async fn test_reaches_through_either_edge_direction() {
        let store = InMemoryStore::new();
        // place <- specimen -> collection
        link(&store, ("sp1", "specimen"), ("place", "place"));
        link(&store, ("sp1", "specimen"), ("col", TARGET));

        let out = resolve(&store, &ids(&["place"]), TARGET, 2).await.unwrap();
        assert_eq!(out, ids(&["col"]));
    }

    #[tokio::test]
    async fn test_unknown_seed_is_expanded() {
        let store = InMemoryStore::new();
        let out = resolve(&store, &ids(&["ghost"]), TARGET, 2).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_each_hop_queries_frontier_once() {
        struct Counting {
            inner: InMemoryStore,
            batches: AtomicUsize,
        }

        #[async_trait]
        impl RelationshipGraph for Counting {
            async fn neighbors(&self, id: &str) -> Result<Vec<Neighbor>> {
                self.inner.neighbors(id).await
            }
            async fn neighbors_of_many(&self, ids: &[String]) -> Result<Vec<Neighbor>> {
                self.batches.fetch_add(1, Ordering::SeqCst);
                self.inner.neighbors_of_many(ids).await
            }
            async fn entity_kinds(&self, ids: &[String]) -> Result<HashMap<String, String>> {
                self.inner.entity_kinds(ids).await
            }
            async fn entities_of_kind(&self, kind: &str) -> Result<Vec<String>> {
                self.inner.entities_of_kind(kind).await
            }
        }

        let graph = Counting {
            inner: chain(4),
            batches: AtomicUsize::new(0),
        };
        let report = walk(&graph, &ids(&["s0"]), TARGET, 2).await.unwrap();
        assert!(report.matches.is_empty());
        assert!(report.truncated);
        assert_eq!(report.hops, 2);
        assert_eq!(graph.batches.load(Ordering::SeqCst), 2);
    }
}
