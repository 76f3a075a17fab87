//! Fetch → normalize → archive for one universe and vendor.

use crate::archive::{self, ArchiveSummary, STORE_EXTENSION};
use crate::config::AppConfig;
use crate::error::{Error, NormalizeError};
use crate::fetch::{RawPayload, SymbolResultMap};
use crate::normalize::{NormalizationPool, NormalizedTable};
use crate::query::TimeSeriesQuery;
use crate::vendor::{MarketDataVendor, VendorKind};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Result of one [`HistoricalLoader::get_data`] run.
#[derive(Debug)]
pub struct HistoricalData {
    pub universe: String,
    pub vendor: VendorKind,
    /// Raw payloads of the symbols that were fetched successfully.
    pub payloads: SymbolResultMap,
    /// Requested symbols absent from `payloads`, in request order.
    pub missing: Vec<String>,
    /// Fetched symbols whose payload could not be normalized, sorted.
    /// Always empty when archival did not run.
    pub rejected: Vec<String>,
    pub archive: Option<ArchiveSummary>,
}

impl HistoricalData {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.rejected.is_empty()
    }
}

/// Archive location for a (universe, vendor) pair under `output_dir`.
pub fn archive_path(output_dir: &Path, universe: &str, kind: VendorKind) -> PathBuf {
    output_dir.join(format!("{universe}_{}.{STORE_EXTENSION}", kind.slug()))
}

pub struct HistoricalLoader {
    pool: Arc<NormalizationPool>,
    output_dir: Option<PathBuf>,
}

impl HistoricalLoader {
    pub fn new(pool: NormalizationPool) -> Self {
        Self {
            pool: Arc::new(pool),
            output_dir: None,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, NormalizeError> {
        let pool = NormalizationPool::new(config.normalize.workers)?;
        Ok(Self::new(pool).with_output_dir(config.output_dir.clone()))
    }

    pub fn with_output_dir(mut self, output_dir: Option<PathBuf>) -> Self {
        self.output_dir = output_dir;
        self
    }

    /// Fetch the query's universe from `vendor`, and archive the normalized
    /// tables when `archive` is set.
    ///
    /// Failed symbols never fail the call; they are listed in
    /// [`HistoricalData::missing`]. Archival is skipped with a warning when
    /// no usable output directory is configured.
    pub async fn get_data(
        &self,
        vendor: &dyn MarketDataVendor,
        query: &TimeSeriesQuery,
        archive: bool,
    ) -> Result<HistoricalData, Error> {
        let kind = vendor.kind();
        let universe = query.universe.name.clone();
        info!("universe: {universe}");
        info!("vendor: {kind}");

        let payloads = vendor.fetch_multi_symbols_data(query).await;
        let missing: Vec<String> = query
            .symbols()
            .iter()
            .filter(|s| !payloads.contains_key(s.as_str()))
            .cloned()
            .collect();

        let mut data = HistoricalData {
            universe,
            vendor: kind,
            payloads,
            missing,
            rejected: Vec::new(),
            archive: None,
        };
        if !archive {
            return Ok(data);
        }

        let Some(destination) = self.destination(&data.universe, kind) else {
            return Ok(data);
        };

        let pool = Arc::clone(&self.pool);
        let payloads = std::mem::take(&mut data.payloads);
        let (payloads, rejected, summary) = tokio::task::spawn_blocking(move || {
            normalize_and_archive(&pool, kind, payloads, &destination)
        })
        .await
        .map_err(|e| Error::Worker(e.to_string()))??;

        data.payloads = payloads;
        data.rejected = rejected;
        data.archive = Some(summary);
        Ok(data)
    }

    fn destination(&self, universe: &str, kind: VendorKind) -> Option<PathBuf> {
        match &self.output_dir {
            None => {
                warn!("no output directory configured, skipping archival");
                None
            }
            Some(dir) if !dir.is_dir() => {
                warn!(
                    "output directory {} does not exist, skipping archival",
                    dir.display()
                );
                None
            }
            Some(dir) => Some(archive_path(dir, universe, kind)),
        }
    }
}

/// Runs on a blocking thread. Hands the payload map back so the caller keeps
/// ownership without cloning payloads.
fn normalize_and_archive(
    pool: &NormalizationPool,
    kind: VendorKind,
    payloads: SymbolResultMap,
    destination: &Path,
) -> Result<(SymbolResultMap, Vec<String>, ArchiveSummary), Error> {
    let mut entries: Vec<(String, RawPayload)> = payloads.into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    let (symbols, raw): (Vec<String>, Vec<RawPayload>) = entries.into_iter().unzip();

    let mut tables: BTreeMap<String, NormalizedTable> = BTreeMap::new();
    let mut rejected = Vec::new();
    for (symbol, outcome) in symbols.iter().zip(pool.normalize_many(kind, &raw)) {
        match outcome {
            Ok(table) => {
                tables.insert(symbol.clone(), table);
            }
            Err(e) => {
                warn!(symbol = %symbol, "normalization failed, not archived: {e}");
                rejected.push(symbol.clone());
            }
        }
    }

    let summary = archive::archive(destination, &tables)?;
    let payloads = symbols.into_iter().zip(raw).collect();
    Ok((payloads, rejected, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ArchiveStore;
    use crate::testing::{eod_rows, StubVendor};
    use crate::universe::Universe;
    use chrono::NaiveDate;
    use serde_json::json;
    use tempfile::TempDir;

    fn query(symbols: &[&str]) -> TimeSeriesQuery {
        TimeSeriesQuery::new(
            Universe::new("dummy", symbols.iter().map(|s| s.to_string()).collect()),
            NaiveDate::from_ymd_opt(2023, 1, 3).unwrap(),
            NaiveDate::from_ymd_opt(2023, 1, 4).unwrap(),
        )
        .unwrap()
        .with_exchange("US")
    }

    fn loader(output_dir: Option<PathBuf>) -> HistoricalLoader {
        HistoricalLoader::new(NormalizationPool::new(2).unwrap()).with_output_dir(output_dir)
    }

    #[test]
    fn archive_path_joins_universe_and_vendor_slug() {
        assert_eq!(
            archive_path(Path::new("/data"), "sp500", VendorKind::Polygon),
            PathBuf::from("/data/sp500_polygon.pqstore")
        );
    }

    #[tokio::test]
    async fn missing_symbols_are_listed_in_request_order() {
        let vendor = StubVendor::new(VendorKind::Eodhd).with_payload("MCD", eod_rows(1.0, 2.0));
        let data = loader(None)
            .get_data(&vendor, &query(&["TSLA", "MCD", "AAPL"]), false)
            .await
            .unwrap();

        assert_eq!(data.payloads.len(), 1);
        assert_eq!(data.missing, vec!["TSLA".to_string(), "AAPL".to_string()]);
        assert!(data.archive.is_none());
        assert!(!data.is_complete());
    }

    #[tokio::test]
    async fn no_output_dir_skips_archival_but_returns_payloads() {
        let vendor = StubVendor::new(VendorKind::Eodhd).with_payload("MCD", eod_rows(1.0, 2.0));
        let data = loader(None).get_data(&vendor, &query(&["MCD"]), true).await.unwrap();
        assert!(data.archive.is_none());
        assert!(data.payloads.contains_key("MCD"));

        let dir = TempDir::new().unwrap();
        let gone = dir.path().join("does-not-exist");
        let data = loader(Some(gone.clone()))
            .get_data(&vendor, &query(&["MCD"]), true)
            .await
            .unwrap();
        assert!(data.archive.is_none());
        assert!(!gone.exists());
    }

    #[tokio::test]
    async fn archives_normalized_tables() {
        let dir = TempDir::new().unwrap();
        let vendor = StubVendor::new(VendorKind::Eodhd)
            .with_payload("MCD", eod_rows(264.33, 264.39))
            .with_payload("AAPL", eod_rows(125.07, 126.36));

        let data = loader(Some(dir.path().to_path_buf()))
            .get_data(&vendor, &query(&["MCD", "AAPL"]), true)
            .await
            .unwrap();

        assert!(data.is_complete());
        assert_eq!(data.payloads.len(), 2);
        let summary = data.archive.unwrap();
        assert_eq!(summary.path, dir.path().join("dummy_eodhd.pqstore"));
        assert_eq!(summary.rows_written(), 4);

        let store = ArchiveStore::open(&summary.path).unwrap();
        assert_eq!(store.keys().unwrap(), vec!["AAPL".to_string(), "MCD".to_string()]);
    }

    #[tokio::test]
    async fn unnormalizable_payload_is_rejected_not_fatal() {
        let dir = TempDir::new().unwrap();
        let vendor = StubVendor::new(VendorKind::Eodhd)
            .with_payload("MCD", eod_rows(1.0, 2.0))
            .with_payload("BAD", json!({"unexpected": "object"}));

        let data = loader(Some(dir.path().to_path_buf()))
            .get_data(&vendor, &query(&["MCD", "BAD"]), true)
            .await
            .unwrap();

        assert_eq!(data.rejected, vec!["BAD".to_string()]);
        assert!(data.payloads.contains_key("BAD"));
        assert_eq!(data.archive.unwrap().symbols.len(), 1);
    }
}
