//! # Heritage Search
//!
//! Relationship-aware full-text search for cultural-heritage resource
//! catalogs.
//!
//! A search term often matches a record attached to a place, a material or
//! a person rather than to the collection item a user wants back. Heritage
//! Search keeps a searchable text projection of structured records, matches
//! each term against it, and walks the resource relationship graph from the
//! matches to the entities of the requested kind. Multi-term queries return
//! only entities every term reaches.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────────┐
//! │ record saves │──▶│  value index │──▶│    SQLite      │
//! │  (load, CLI) │   │  (extract)   │   │ values + graph │
//! └──────────────┘   └──────────────┘   └──────┬────────┘
//!                                              │
//!                      ┌───────────────────────┤
//!                      ▼                       ▼
//!               ┌─────────────┐        ┌──────────────┐
//!               │ term match  │──walk─▶│ AND combine  │──▶ session cache
//!               └─────────────┘        └──────────────┘
//! ```
//!
//! The algorithms live in the `heritage-search-core` crate and run against
//! its store traits; this crate provides the SQLite backend, configuration,
//! catalog import, the search service, and the `hsearch` CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite implementation of the store traits |
//! | [`load`] | Catalog import, rebuild, and record drop commands |
//! | [`search`] | Search service with caching, degradation, and paging |
//! | [`session_store`] | Session result cache persisted in SQLite |

pub mod config;
pub mod db;
pub mod load;
pub mod migrate;
pub mod search;
pub mod session_store;
pub mod sqlite_store;
