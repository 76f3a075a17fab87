//! Tickvault core: historical OHLCV fetch, normalization and archival.
//!
//! Pipeline for one universe and vendor:
//! - `fetch`: concurrent per-symbol requests with bounded retry and
//!   exponential backoff; failed symbols are dropped from the result
//! - `normalize`: vendor payloads into one canonical time-indexed table,
//!   in parallel, order preserved
//! - `archive`: per-symbol append into a compressed keyed store, skipping
//!   timestamps that are already stored
//!
//! [`historical::HistoricalLoader`] wires the three stages together. The
//! library installs no logger; binaries set up `tracing` themselves.

pub mod archive;
pub mod config;
pub mod error;
pub mod fetch;
pub mod historical;
pub mod metadata;
pub mod normalize;
pub mod query;
pub mod universe;
pub mod vendor;

#[cfg(test)]
pub(crate) mod testing;

pub use error::Error;
pub use historical::{HistoricalData, HistoricalLoader};
pub use query::TimeSeriesQuery;
pub use vendor::{MarketDataVendor, VendorKind};

#[cfg(test)]
mod tests {
    use super::*;

    /// Everything handed across the blocking-task boundary or shared
    /// between fetch futures must be Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<fetch::SymbolResultMap>();
        require_send::<normalize::NormalizedTable>();
        require_sync::<normalize::NormalizedTable>();
        require_send::<normalize::NormalizationPool>();
        require_sync::<normalize::NormalizationPool>();
        require_send::<archive::ArchiveSummary>();
        require_send::<error::Error>();
        require_sync::<error::Error>();
        require_send::<fetch::FetchOrchestrator>();
        require_sync::<fetch::FetchOrchestrator>();
        require_send::<vendor::EodhdVendor>();
        require_sync::<vendor::EodhdVendor>();
        require_send::<vendor::PolygonVendor>();
        require_sync::<vendor::PolygonVendor>();
        require_send::<HistoricalLoader>();
        require_sync::<HistoricalLoader>();
    }
}
