//! Dedup-merge archival: stored rows always win.

use super::store::ArchiveStore;
use crate::error::ArchiveError;
use crate::normalize::NormalizedTable;
use polars::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Rows appended and rows dropped as already stored, for one symbol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SymbolArchiveStats {
    pub written: usize,
    pub dropped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub path: PathBuf,
    pub symbols: BTreeMap<String, SymbolArchiveStats>,
}

impl ArchiveSummary {
    pub fn rows_written(&self) -> usize {
        self.symbols.values().map(|s| s.written).sum()
    }

    pub fn rows_dropped(&self) -> usize {
        self.symbols.values().map(|s| s.dropped).sum()
    }
}

/// Merge every table into the store at `destination`.
///
/// Symbols are processed in key order. A failure stops the run and is
/// returned; symbols already appended stay appended.
pub fn archive(
    destination: &Path,
    tables: &BTreeMap<String, NormalizedTable>,
) -> Result<ArchiveSummary, ArchiveError> {
    let mut store = ArchiveStore::open(destination)?;
    let mut symbols = BTreeMap::new();

    for (symbol, table) in tables {
        let stats = merge_symbol(&mut store, symbol, table)?;
        symbols.insert(symbol.clone(), stats);
    }
    store.close()?;

    let summary = ArchiveSummary {
        path: destination.to_path_buf(),
        symbols,
    };
    info!(
        path = %destination.display(),
        symbols = summary.symbols.len(),
        written = summary.rows_written(),
        dropped = summary.rows_dropped(),
        "archive updated"
    );
    Ok(summary)
}

/// Append the rows of `table` whose timestamps are not yet stored under `key`.
pub fn merge_symbol(
    store: &mut ArchiveStore,
    key: &str,
    table: &NormalizedTable,
) -> Result<SymbolArchiveStats, ArchiveError> {
    if !store.contains(key)? {
        let written = store.append(key, table)?;
        return Ok(SymbolArchiveStats { written, dropped: 0 });
    }

    let stored = store.timestamps(key)?;
    let overlap: HashSet<i64> = table
        .timestamps()?
        .into_iter()
        .filter(|ts| stored.contains(ts))
        .collect();

    if overlap.is_empty() {
        let written = append_conformed(store, key, table)?;
        return Ok(SymbolArchiveStats { written, dropped: 0 });
    }

    let fresh = table.without_timestamps(&overlap)?;
    let dropped = table.height() - fresh.height();
    debug!(key, dropped, "rows already stored, keeping stored values");

    let written = append_conformed(store, key, &fresh)?;
    Ok(SymbolArchiveStats { written, dropped })
}

/// Append `table` reshaped to the columns already stored under `key`, so
/// every part of a key has the same schema.
fn append_conformed(
    store: &mut ArchiveStore,
    key: &str,
    table: &NormalizedTable,
) -> Result<usize, ArchiveError> {
    if table.is_empty() {
        return Ok(0);
    }
    let Some(schema) = store.stored_columns(key)? else {
        return store.append(key, table);
    };

    let (conformed, extra) = conform(table, &schema)?;
    if !extra.is_empty() {
        warn!(key, columns = ?extra, "columns not in the stored schema were dropped");
    }
    store.append(key, &conformed)
}

/// Reorder and cast `table` to `schema`. Missing columns become nulls;
/// columns outside `schema` are left out and returned by name.
fn conform(
    table: &NormalizedTable,
    schema: &[(String, DataType)],
) -> PolarsResult<(NormalizedTable, Vec<String>)> {
    let frame = table.frame();
    let height = frame.height();

    let mut columns = Vec::with_capacity(schema.len());
    for (name, dtype) in schema {
        let column = match frame.column(name) {
            Ok(c) if c.dtype() == dtype => c.clone(),
            Ok(c) => c.cast(dtype)?,
            Err(_) => Column::full_null(name.as_str().into(), height, dtype),
        };
        columns.push(column);
    }

    let extra = frame
        .get_column_names()
        .into_iter()
        .filter(|n| !schema.iter().any(|(s, _)| s.as_str() == n.as_str()))
        .map(|n| n.to_string())
        .collect();
    Ok((NormalizedTable::from_sorted_frame(DataFrame::new(columns)?), extra))
}
