//! # Heritage Search Core
//!
//! Backend-independent logic for relationship-aware catalog search: data
//! models, value extraction, the searchable value index contract, the
//! relationship graph walker, multi-term resolution, and the session result
//! cache.
//!
//! This crate contains no tokio, sqlx, or filesystem I/O. Storage is
//! reached only through the traits in [`store`]; an in-memory
//! implementation lives in [`store::memory`].
//!
//! ## Resolution pipeline
//!
//! ```text
//! terms ──▶ match_term ──▶ walk::resolve ──▶ engine::combine ──▶ id set
//!  (per term)   (index)      (graph, bounded)     (AND)            │
//!                                                                  ▼
//!                                                          cache::SessionCache
//! ```

pub mod cache;
pub mod engine;
pub mod error;
pub mod extract;
pub mod filter;
pub mod index;
pub mod models;
pub mod store;
pub mod walk;
