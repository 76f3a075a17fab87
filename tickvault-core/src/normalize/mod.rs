//! Vendor payload normalization into the canonical time-indexed table.
//!
//! Every vendor maps into the same shape: a `date` index column
//! (`Datetime(ms)`, strictly ascending) followed by the vendor's value
//! columns. Numeric columns are always `Float64` so that tables from
//! different fetches stack without schema drift.
//!
//! Dispatch is a plain table from [`VendorKind`] to a pure transform
//! function; [`pool::NormalizationPool`] applies it in parallel.

pub mod eodhd;
pub mod polygon;
pub mod pool;

use crate::error::NormalizeError;
use crate::fetch::RawPayload;
use crate::vendor::VendorKind;
use polars::prelude::*;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

pub use pool::NormalizationPool;

/// Name of the timestamp index column.
pub const INDEX_COLUMN: &str = "date";

/// Leading value columns, in this order, whenever present. Any other column
/// follows them sorted by name.
pub const CANONICAL_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

/// Pure payload → table transform for one vendor.
pub type Transform = fn(&RawPayload) -> Result<NormalizedTable, NormalizeError>;

/// Dispatch table from vendor identity to its transform.
pub fn transform_for(kind: VendorKind) -> Transform {
    match kind {
        VendorKind::Eodhd => eodhd::normalize,
        VendorKind::Polygon => polygon::normalize,
    }
}

/// Normalize one payload. An unrecognized vendor name is rejected earlier,
/// when it is parsed into a [`VendorKind`].
pub fn normalize(kind: VendorKind, payload: &RawPayload) -> Result<NormalizedTable, NormalizeError> {
    transform_for(kind)(payload)
}

/// OHLCV rows for one symbol, indexed by a strictly ascending timestamp.
///
/// Timestamp uniqueness is taken from the vendor contract and not checked
/// here; ordering is always enforced.
#[derive(Debug, Clone)]
pub struct NormalizedTable {
    frame: DataFrame,
}

impl NormalizedTable {
    /// Wrap a frame that already has a sorted `date` index column.
    pub(crate) fn from_sorted_frame(frame: DataFrame) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|n| n.to_string())
            .collect()
    }

    /// Index values as epoch milliseconds, in table order.
    pub fn timestamps(&self) -> PolarsResult<Vec<i64>> {
        index_millis(&self.frame)
    }

    /// Copy of this table without the rows whose timestamp is in `exclude`.
    pub fn without_timestamps(&self, exclude: &HashSet<i64>) -> PolarsResult<NormalizedTable> {
        if exclude.is_empty() {
            return Ok(self.clone());
        }
        let keep: Vec<bool> = self
            .timestamps()?
            .iter()
            .map(|ts| !exclude.contains(ts))
            .collect();
        let mask = BooleanChunked::new("keep".into(), keep.as_slice());
        Ok(Self::from_sorted_frame(self.frame.filter(&mask)?))
    }

    /// Float column values, for inspection and tests.
    pub fn f64_column(&self, name: &str) -> PolarsResult<Vec<Option<f64>>> {
        Ok(self.frame.column(name)?.f64()?.into_iter().collect())
    }
}

impl PartialEq for NormalizedTable {
    fn eq(&self, other: &Self) -> bool {
        self.frame.equals_missing(&other.frame)
    }
}

/// Read the `date` column of any frame as epoch milliseconds.
pub(crate) fn index_millis(frame: &DataFrame) -> PolarsResult<Vec<i64>> {
    let physical = frame.column(INDEX_COLUMN)?.cast(&DataType::Int64)?;
    physical
        .i64()?
        .into_iter()
        .enumerate()
        .map(|(i, ts)| {
            ts.ok_or_else(|| PolarsError::ComputeError(format!("null timestamp at row {i}").into()))
        })
        .collect()
}

/// Column-wise accumulator for JSON rows.
///
/// Columns are collected in first-seen order; a row missing a column gets a null.
#[derive(Default)]
pub(crate) struct RowSet<'a> {
    timestamps: Vec<i64>,
    columns: Vec<(String, Vec<Option<&'a Value>>)>,
    positions: HashMap<String, usize>,
}

impl<'a> RowSet<'a> {
    pub(crate) fn with_capacity(rows: usize) -> Self {
        Self {
            timestamps: Vec::with_capacity(rows),
            ..Self::default()
        }
    }

    pub(crate) fn push_row<I>(&mut self, timestamp_ms: i64, fields: I)
    where
        I: IntoIterator<Item = (String, &'a Value)>,
    {
        let row = self.timestamps.len();
        self.timestamps.push(timestamp_ms);

        for (name, value) in fields {
            let idx = match self.positions.get(&name) {
                Some(&idx) => idx,
                None => {
                    self.columns.push((name.clone(), vec![None; row]));
                    self.positions.insert(name, self.columns.len() - 1);
                    self.columns.len() - 1
                }
            };
            let values = &mut self.columns[idx].1;
            if values.len() == row {
                values.push(Some(value));
            }
        }

        for (_, values) in &mut self.columns {
            if values.len() == row {
                values.push(None);
            }
        }
    }

    /// Build the frame and sort it by the index, keeping input order for ties.
    ///
    /// Column order is fixed by [`column_rank`], never by payload key order.
    pub(crate) fn into_table(mut self) -> Result<NormalizedTable, NormalizeError> {
        self.columns.sort_by_cached_key(|(name, _)| column_rank(name));

        let mut columns = Vec::with_capacity(self.columns.len() + 1);
        columns.push(
            Column::new(INDEX_COLUMN.into(), self.timestamps)
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?,
        );
        for (name, values) in self.columns {
            columns.push(value_column(&name, &values));
        }

        let frame = DataFrame::new(columns)?.sort(
            [INDEX_COLUMN],
            SortMultipleOptions::default().with_maintain_order(true),
        )?;
        Ok(NormalizedTable::from_sorted_frame(frame))
    }
}

fn column_rank(name: &str) -> (usize, String) {
    let slot = CANONICAL_COLUMNS
        .iter()
        .position(|c| *c == name)
        .unwrap_or(CANONICAL_COLUMNS.len());
    (slot, name.to_string())
}

/// Infer a column type from its JSON values: all-numeric → Float64,
/// all-bool → Boolean, anything else → String.
fn value_column(name: &str, values: &[Option<&Value>]) -> Column {
    let present = || values.iter().flatten().filter(|v| !v.is_null());

    if present().all(|v| v.is_number()) {
        let data: Vec<Option<f64>> = values.iter().copied().map(|v| v.and_then(Value::as_f64)).collect();
        return Column::new(name.into(), data);
    }
    if present().all(|v| v.is_boolean()) {
        let data: Vec<Option<bool>> = values.iter().copied().map(|v| v.and_then(Value::as_bool)).collect();
        return Column::new(name.into(), data);
    }
    let data: Vec<Option<String>> = values
        .iter()
        .copied()
        .map(|v| match v {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        })
        .collect();
    Column::new(name.into(), data)
}
