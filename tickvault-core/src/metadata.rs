//! Exchange and ticker listings, optionally snapshotted to JSON files.
//!
//! These are single blocking requests; call them outside the async runtime.

use crate::error::Error;
use crate::vendor::{MarketDataVendor, VendorKind};
use serde_json::Value;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub fn exchanges_snapshot_name(kind: VendorKind) -> String {
    format!("{}_exchanges.json", kind.name())
}

pub fn tickers_snapshot_name(kind: VendorKind, exchange_code: &str) -> String {
    format!("{}_{exchange_code}_tickers.json", kind.name())
}

/// Supported exchanges, written to `<Vendor>_exchanges.json` when
/// `output_dir` is usable.
pub fn get_exchanges(vendor: &dyn MarketDataVendor, output_dir: Option<&Path>) -> Result<Value, Error> {
    let exchanges = vendor.fetch_supported_exchanges()?;
    if let Some(dir) = snapshot_dir(output_dir) {
        write_snapshot(dir, &exchanges_snapshot_name(vendor.kind()), &exchanges)?;
    }
    Ok(exchanges)
}

/// Tickers of one exchange, written to `<Vendor>_<EXCHANGE>_tickers.json`
/// when `output_dir` is usable.
pub fn get_symbols_from_exchange(
    vendor: &dyn MarketDataVendor,
    exchange_code: &str,
    output_dir: Option<&Path>,
) -> Result<Value, Error> {
    let tickers = vendor.fetch_symbols(exchange_code)?;
    if let Some(dir) = snapshot_dir(output_dir) {
        write_snapshot(
            dir,
            &tickers_snapshot_name(vendor.kind(), exchange_code),
            &tickers,
        )?;
    }
    Ok(tickers)
}

fn snapshot_dir(output_dir: Option<&Path>) -> Option<&Path> {
    match output_dir {
        Some(dir) if dir.is_dir() => Some(dir),
        Some(dir) => {
            warn!("output directory {} does not exist, snapshot not written", dir.display());
            None
        }
        None => {
            warn!("no output directory configured, snapshot not written");
            None
        }
    }
}

/// Pretty-print `value` to `dir/file_name`.
pub fn write_snapshot(dir: &Path, file_name: &str, value: &Value) -> Result<PathBuf, Error> {
    let path = dir.join(file_name);
    let snapshot_err = |source: std::io::Error| Error::Snapshot {
        path: path.display().to_string(),
        source,
    };

    let file = fs::File::create(&path).map_err(snapshot_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|e| snapshot_err(e.into()))?;
    writer.flush().map_err(snapshot_err)?;
    info!("wrote {}", path.display());
    Ok(path)
}
