//! Durable per-symbol archive with dedup-on-append.
//!
//! [`store::ArchiveStore`] is the on-disk keyed table store (one parquet
//! partition per symbol, append-only). [`merge::archive`] is the only writer
//! used by the pipeline: it drops incoming rows whose timestamps are already
//! stored and appends the rest.
//!
//! The store has no internal locking. Callers must serialize `archive`
//! calls against the same path.

pub mod merge;
pub mod store;

pub use merge::{archive, ArchiveSummary, SymbolArchiveStats};
pub use store::{ArchiveStore, KeyEntry, Manifest};

/// Directory suffix of an archive store.
pub const STORE_EXTENSION: &str = "pqstore";
