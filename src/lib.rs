//! An embedded, single-process key-value store organized as a
//! log-structured-merge tree.
//!
//! Writes land in a bounded in-memory cache and an append-only durability
//! log; once the cache fills it drains into a sorted on-disk table at
//! level 0, and levels are merged upward as they cross their table-count or
//! byte-size thresholds. The deepest level spills into top-level blocks
//! that are never merged further. Reads check the cache, then the levels
//! newest-table-first, then the top-blocks on demand, deduplicating
//! concurrent misses on the same key through a single-flight gate.
//!
//! No range scans, no transactions, no cross-process concurrent access, no
//! background compaction thread — compaction runs synchronously inside the
//! write that triggers it. See [`Engine`] for the entry point.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod flight;
pub mod record;
pub mod table;
pub mod tree;
pub mod wal;

pub use config::Config;
pub use engine::Engine;
pub use error::{Error, Result};
pub use record::Record;
