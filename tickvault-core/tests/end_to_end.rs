//! Fetch → normalize → archive through a real vendor implementation and a
//! scripted transport.

mod common;

use chrono::NaiveDate;
use common::{eod_jan_3_4, Route, ScriptedConnector, JAN3_MS, JAN4_MS, ROOT};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use tickvault_core::archive::ArchiveStore;
use tickvault_core::config::Credentials;
use tickvault_core::normalize::NormalizationPool;
use tickvault_core::universe::Universe;
use tickvault_core::vendor::{EodhdVendor, PolygonAssetClass, PolygonVendor};
use tickvault_core::{HistoricalLoader, TimeSeriesQuery};

fn query(universe: &str, symbols: &[&str]) -> TimeSeriesQuery {
    TimeSeriesQuery::new(
        Universe::new(universe, symbols.iter().map(|s| s.to_string()).collect()),
        NaiveDate::from_ymd_opt(2023, 1, 3).unwrap(),
        NaiveDate::from_ymd_opt(2023, 1, 4).unwrap(),
    )
    .unwrap()
    .with_exchange("US")
}

fn loader(dir: &TempDir) -> HistoricalLoader {
    HistoricalLoader::new(NormalizationPool::new(2).unwrap())
        .with_output_dir(Some(dir.path().to_path_buf()))
}

fn eodhd_vendor(connector: &ScriptedConnector) -> EodhdVendor {
    EodhdVendor::new(Credentials::new("test-key"))
        .with_root_url(ROOT)
        .with_connector(Arc::new(connector.clone()))
}

#[tokio::test]
async fn two_symbol_eodhd_universe_lands_in_store() {
    let dir = TempDir::new().unwrap();
    let connector = ScriptedConnector::new([
        (
            format!("{ROOT}/eod/MCD.US"),
            Route::Json(eod_jan_3_4([263.53, 266.25], [264.33, 264.39])),
        ),
        (
            format!("{ROOT}/eod/AAPL.US"),
            Route::Json(eod_jan_3_4([130.28, 126.89], [125.07, 126.36])),
        ),
    ]);

    let data = loader(&dir)
        .get_data(&eodhd_vendor(&connector), &query("dummy", &["MCD", "AAPL"]), true)
        .await
        .unwrap();
    assert!(data.is_complete());

    let path = dir.path().join("dummy_eodhd.pqstore");
    assert!(path.is_dir());
    assert_eq!(data.archive.as_ref().unwrap().path, path);

    let store = ArchiveStore::open(&path).unwrap();
    assert_eq!(store.keys().unwrap(), vec!["AAPL".to_string(), "MCD".to_string()]);

    let mcd = store.read_table("MCD").unwrap().unwrap();
    assert_eq!(mcd.timestamps().unwrap(), vec![JAN3_MS, JAN4_MS]);
    assert_eq!(mcd.f64_column("open").unwrap(), vec![Some(263.53), Some(266.25)]);
    assert_eq!(mcd.f64_column("close").unwrap(), vec![Some(264.33), Some(264.39)]);

    let aapl = store.read_table("AAPL").unwrap().unwrap();
    assert_eq!(aapl.timestamps().unwrap(), vec![JAN3_MS, JAN4_MS]);
    assert_eq!(aapl.f64_column("close").unwrap(), vec![Some(125.07), Some(126.36)]);
}

#[tokio::test]
async fn refetch_leaves_store_unchanged() {
    let dir = TempDir::new().unwrap();
    let connector = ScriptedConnector::new([(
        format!("{ROOT}/eod/MCD.US"),
        Route::Json(eod_jan_3_4([1.0, 2.0], [1.5, 2.5])),
    )]);
    let vendor = eodhd_vendor(&connector);
    let loader = loader(&dir);
    let q = query("dummy", &["MCD"]);

    loader.get_data(&vendor, &q, true).await.unwrap();
    let before = ArchiveStore::open(&dir.path().join("dummy_eodhd.pqstore"))
        .unwrap()
        .read_table("MCD")
        .unwrap();

    let second = loader.get_data(&vendor, &q, true).await.unwrap();
    let summary = second.archive.unwrap();
    assert_eq!(summary.rows_written(), 0);
    assert_eq!(summary.rows_dropped(), 2);

    let after = ArchiveStore::open(&summary.path).unwrap().read_table("MCD").unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn polygon_universe_archives_under_its_own_store() {
    let dir = TempDir::new().unwrap();
    let aggs = |close: f64| {
        json!({
            "ticker": "X",
            "status": "OK",
            "results": [
                {"v": 10.0, "vw": close, "o": close, "c": close, "h": close, "l": close,
                 "t": JAN4_MS, "n": 3},
                {"v": 20.0, "vw": close, "o": close, "c": close, "h": close, "l": close,
                 "t": JAN3_MS, "n": 4}
            ]
        })
    };
    let range = "range/1/day/2023-01-03/2023-01-04";
    let connector = ScriptedConnector::new([
        (format!("{ROOT}/v2/aggs/ticker/AAPL/{range}"), Route::Json(aggs(125.0))),
        (format!("{ROOT}/v2/aggs/ticker/MSFT/{range}"), Route::Status(500)),
    ]);
    let vendor = PolygonVendor::new(Credentials::new("k"), PolygonAssetClass::Stocks)
        .with_root_url(ROOT)
        .with_connector(Arc::new(connector.clone()))
        .with_retry(tickvault_core::fetch::RetryPolicy::new(
            1,
            std::time::Duration::ZERO,
            std::time::Duration::ZERO,
        ));

    let data = loader(&dir)
        .get_data(&vendor, &query("tech", &["AAPL", "MSFT"]), true)
        .await
        .unwrap();
    assert_eq!(data.missing, vec!["MSFT".to_string()]);

    let store = ArchiveStore::open(&dir.path().join("tech_polygon.pqstore")).unwrap();
    assert_eq!(store.keys().unwrap(), vec!["AAPL".to_string()]);
    let aapl = store.read_table("AAPL").unwrap().unwrap();
    assert_eq!(aapl.timestamps().unwrap(), vec![JAN3_MS, JAN4_MS]);
    assert_eq!(aapl.f64_column("volume").unwrap(), vec![Some(20.0), Some(10.0)]);
}

#[tokio::test]
async fn every_symbol_failing_still_returns_data() {
    let dir = TempDir::new().unwrap();
    let connector = ScriptedConnector::new([
        (format!("{ROOT}/eod/MCD.US"), Route::Status(500)),
        (format!("{ROOT}/eod/AAPL.US"), Route::Html),
    ]);
    let vendor = eodhd_vendor(&connector).with_retry(tickvault_core::fetch::RetryPolicy::new(
        1,
        std::time::Duration::ZERO,
        std::time::Duration::ZERO,
    ));

    let data = loader(&dir)
        .get_data(&vendor, &query("dummy", &["MCD", "AAPL"]), true)
        .await
        .unwrap();
    assert!(data.payloads.is_empty());
    assert_eq!(data.missing, vec!["MCD".to_string(), "AAPL".to_string()]);
    assert_eq!(data.archive.map_or(0, |s| s.rows_written()), 0);
}
