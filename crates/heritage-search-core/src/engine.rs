//! Multi-term query resolution.
//!
//! Each term is matched against the searchable value index on its own, its
//! candidate owners are walked through the relationship graph, and the
//! per-term result sets are intersected. An entity is returned only when
//! every term reaches it, which keeps terms that hit unrelated corners of a
//! large graph from producing false positives.
//!
//! A query with no usable terms is not a search at all: it resolves to
//! [`QueryResolution::Unfiltered`] and the caller lists the target kind
//! instead.

use std::collections::HashSet;

use crate::error::Result;
use crate::models::{fold_case, ResolutionQuery};
use crate::store::{RelationshipGraph, SearchIndex};
use crate::walk;

/// Outcome of resolving a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResolution {
    /// No filtering criteria. Not the same as an empty result.
    Unfiltered,
    /// The entities matched by every term; possibly empty.
    Filtered(HashSet<String>),
}

impl QueryResolution {
    pub fn is_filtered(&self) -> bool {
        matches!(self, Self::Filtered(_))
    }
}

/// Trim terms, drop blank ones, and drop case-insensitive duplicates,
/// keeping the first spelling of each.
pub fn normalize_terms(terms: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    terms
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(fold_case(t)))
        .map(str::to_string)
        .collect()
}

/// Intersect per-term result sets.
///
/// One set is returned as is. An empty sequence yields an empty set, though
/// callers route term-less queries to the unfiltered path instead.
pub fn combine(per_term: Vec<HashSet<String>>) -> HashSet<String> {
    let mut sets = per_term.into_iter();
    let Some(mut acc) = sets.next() else {
        return HashSet::new();
    };
    for set in sets {
        acc.retain(|id| set.contains(id));
        if acc.is_empty() {
            break;
        }
    }
    acc
}

/// Resolve one term: index match, then bounded graph walk.
pub async fn resolve_term<I, G>(
    index: &I,
    graph: &G,
    term: &str,
    target_kind: &str,
    max_depth: usize,
) -> Result<HashSet<String>>
where
    I: SearchIndex + ?Sized,
    G: RelationshipGraph + ?Sized,
{
    let folded = fold_case(term.trim());
    if folded.is_empty() {
        return Ok(HashSet::new());
    }
    let seeds = index.match_term(&folded).await?;
    tracing::debug!(term, candidates = seeds.len(), "matched term");
    Ok(walk::resolve(graph, &seeds, target_kind, max_depth).await?)
}

/// Resolve a full query to the set of target-kind entities.
///
/// Terms are resolved in order; once the running intersection is empty the
/// remaining terms are skipped, since they cannot add anything back.
pub async fn resolve_query<I, G>(
    index: &I,
    graph: &G,
    query: &ResolutionQuery,
) -> Result<QueryResolution>
where
    I: SearchIndex + ?Sized,
    G: RelationshipGraph + ?Sized,
{
    let terms = normalize_terms(&query.terms);
    if terms.is_empty() {
        return Ok(QueryResolution::Unfiltered);
    }

    let mut per_term = Vec::with_capacity(terms.len());
    for term in &terms {
        let found =
            resolve_term(index, graph, term, &query.target_kind, query.max_depth).await?;
        let exhausted = found.is_empty();
        per_term.push(found);
        if exhausted {
            tracing::debug!(term = term.as_str(), "term reached nothing; skipping the rest");
            break;
        }
    }

    let combined = combine(per_term);
    tracing::debug!(
        terms = terms.len(),
        target_kind = query.target_kind.as_str(),
        max_depth = query.max_depth,
        results = combined.len(),
        "resolved query"
    );
    Ok(QueryResolution::Filtered(combined))
}
