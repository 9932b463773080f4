//! Caller-visible error taxonomy.
//!
//! Only failures that must abort the caller's work are errors. Unreadable
//! field values are skipped during extraction, empty queries resolve to
//! empty results, and cache misses read as empty sets.

pub type Result<T, E = SearchError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The index write for a record did not commit. No partial entries are
    /// left behind; the record save must be treated as failed.
    #[error("searchable value index update failed for record {record_id}")]
    IndexConsistency {
        record_id: String,
        #[source]
        source: anyhow::Error,
    },
    /// Rebuilding the whole index failed; the previous index is untouched.
    #[error("searchable value index rebuild failed")]
    Rebuild {
        #[source]
        source: anyhow::Error,
    },
    /// A read against the index or graph store failed during resolution.
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}
