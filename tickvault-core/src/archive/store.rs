//! On-disk layout:
//!
//! ```text
//! <root>/
//!   manifest.json
//!   symbol=AAPL/part-00000.parquet
//!   symbol=AAPL/part-00001.parquet
//!   symbol=MCD/part-00000.parquet
//! ```
//!
//! Parts are immutable once renamed into place. The part files are the
//! source of truth; the manifest is a summary sidecar rebuilt on every
//! append.

use crate::error::ArchiveError;
use crate::normalize::{index_millis, NormalizedTable, INDEX_COLUMN};
use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const MANIFEST_FILE: &str = "manifest.json";
const PARTITION_PREFIX: &str = "symbol=";
const PART_PREFIX: &str = "part-";
const PART_EXTENSION: &str = "parquet";

/// Highest zstd level.
const ZSTD_LEVEL: i32 = 22;
const ROW_GROUP_ROWS: usize = 64 * 1024;

/// Per-key summary kept in the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntry {
    pub rows: usize,
    pub parts: u32,
    /// First and last stored timestamps, epoch milliseconds.
    pub first: Option<i64>,
    pub last: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub keys: BTreeMap<String, KeyEntry>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Handle on one archive directory.
///
/// Acquire with [`open`](Self::open), release with [`close`](Self::close).
/// Dropping an unclosed store still writes the manifest, so early returns on
/// error leave a consistent summary behind.
#[derive(Debug)]
pub struct ArchiveStore {
    root: PathBuf,
    manifest: Manifest,
    dirty: bool,
    closed: bool,
}

impl ArchiveStore {
    /// Open the store at `root`, creating the directory if needed.
    pub fn open(root: &Path) -> Result<Self, ArchiveError> {
        fs::create_dir_all(root).map_err(|e| ArchiveError::io(root, e))?;

        let manifest_path = root.join(MANIFEST_FILE);
        let manifest = if manifest_path.exists() {
            let text =
                fs::read_to_string(&manifest_path).map_err(|e| ArchiveError::io(&manifest_path, e))?;
            serde_json::from_str(&text).map_err(|e| {
                ArchiveError::Manifest(format!("{}: {e}", manifest_path.display()))
            })?
        } else {
            Manifest::default()
        };

        debug!(path = %root.display(), keys = manifest.keys.len(), "archive opened");
        Ok(Self {
            root: root.to_path_buf(),
            manifest,
            dirty: false,
            closed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Keys with at least one stored part, sorted.
    pub fn keys(&self) -> Result<Vec<String>, ArchiveError> {
        let entries = fs::read_dir(&self.root).map_err(|e| ArchiveError::io(&self.root, e))?;
        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ArchiveError::io(&self.root, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(key) = name.strip_prefix(PARTITION_PREFIX) {
                if !self.part_paths(key)?.is_empty() {
                    keys.push(key.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    pub fn contains(&self, key: &str) -> Result<bool, ArchiveError> {
        validate_key(key)?;
        Ok(!self.part_paths(key)?.is_empty())
    }

    /// Every stored timestamp for `key`. Only the index column is read.
    pub fn timestamps(&self, key: &str) -> Result<HashSet<i64>, ArchiveError> {
        validate_key(key)?;
        let mut stamps = HashSet::new();
        for part in self.part_paths(key)? {
            let file = fs::File::open(&part).map_err(|e| ArchiveError::io(&part, e))?;
            let frame = ParquetReader::new(file)
                .with_columns(Some(vec![INDEX_COLUMN.to_string()]))
                .finish()?;
            stamps.extend(index_millis(&frame)?);
        }
        Ok(stamps)
    }

    /// Column names and types of the first stored part for `key`, in
    /// stored order. Every later part is written with the same columns.
    pub fn stored_columns(&self, key: &str) -> Result<Option<Vec<(String, DataType)>>, ArchiveError> {
        validate_key(key)?;
        let Some(first) = self.part_paths(key)?.into_iter().next() else {
            return Ok(None);
        };
        let file = fs::File::open(&first).map_err(|e| ArchiveError::io(&first, e))?;
        let frame = ParquetReader::new(file).with_slice(Some((0, 1))).finish()?;
        Ok(Some(
            frame
                .get_columns()
                .iter()
                .map(|c| (c.name().to_string(), c.dtype().clone()))
                .collect(),
        ))
    }

    /// Full stored table for `key`, sorted by timestamp, or `None` if the key
    /// has never been written.
    pub fn read_table(&self, key: &str) -> Result<Option<NormalizedTable>, ArchiveError> {
        validate_key(key)?;
        let mut combined: Option<DataFrame> = None;
        for part in self.part_paths(key)? {
            let file = fs::File::open(&part).map_err(|e| ArchiveError::io(&part, e))?;
            let frame = ParquetReader::new(file).finish()?;
            match combined.as_mut() {
                Some(acc) => {
                    acc.vstack_mut(&frame)?;
                }
                None => combined = Some(frame),
            }
        }

        combined
            .map(|frame| -> Result<NormalizedTable, ArchiveError> {
                let sorted = frame.sort(
                    [INDEX_COLUMN],
                    SortMultipleOptions::default().with_maintain_order(true),
                )?;
                Ok(NormalizedTable::from_sorted_frame(sorted))
            })
            .transpose()
    }

    /// Append `table` under `key` as a new part. Returns the rows written;
    /// an empty table writes nothing.
    pub fn append(&mut self, key: &str, table: &NormalizedTable) -> Result<usize, ArchiveError> {
        validate_key(key)?;
        if table.is_empty() {
            return Ok(0);
        }

        let partition = self.partition_dir(key);
        fs::create_dir_all(&partition).map_err(|e| ArchiveError::io(&partition, e))?;

        let next = self
            .part_paths(key)?
            .iter()
            .filter_map(|p| part_number(p))
            .max()
            .map_or(0, |n| n + 1);
        let path = partition.join(format!("{PART_PREFIX}{next:05}.{PART_EXTENSION}"));
        write_part(table.frame(), &path)?;

        let stamps = table.timestamps()?;
        let entry = self.manifest.keys.entry(key.to_string()).or_default();
        entry.rows += table.height();
        entry.parts += 1;
        if let Some(&lo) = stamps.iter().min() {
            entry.first = Some(entry.first.map_or(lo, |f| f.min(lo)));
        }
        if let Some(&hi) = stamps.iter().max() {
            entry.last = Some(entry.last.map_or(hi, |l| l.max(hi)));
        }
        self.dirty = true;

        debug!(key, rows = table.height(), part = %path.display(), "appended");
        Ok(table.height())
    }

    /// Persist the manifest and release the store.
    pub fn close(mut self) -> Result<(), ArchiveError> {
        self.closed = true;
        self.persist_manifest()
    }

    fn persist_manifest(&mut self) -> Result<(), ArchiveError> {
        if !self.dirty {
            return Ok(());
        }
        self.manifest.updated_at = Some(Utc::now());
        let json = serde_json::to_string_pretty(&self.manifest)
            .map_err(|e| ArchiveError::Manifest(e.to_string()))?;

        let path = self.root.join(MANIFEST_FILE);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| ArchiveError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            ArchiveError::io(&path, e)
        })?;
        self.dirty = false;
        Ok(())
    }

    fn partition_dir(&self, key: &str) -> PathBuf {
        self.root.join(format!("{PARTITION_PREFIX}{key}"))
    }

    /// Committed part files for `key`, in write order. Leftover `.tmp` files
    /// from an interrupted write are ignored.
    fn part_paths(&self, key: &str) -> Result<Vec<PathBuf>, ArchiveError> {
        let dir = self.partition_dir(key);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut parts = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| ArchiveError::io(&dir, e))? {
            let path = entry.map_err(|e| ArchiveError::io(&dir, e))?.path();
            if part_number(&path).is_some() {
                parts.push(path);
            }
        }
        parts.sort();
        Ok(parts)
    }
}

impl Drop for ArchiveStore {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.persist_manifest() {
            warn!(path = %self.root.display(), "could not write archive manifest: {e}");
        }
    }
}

/// Keys become directory names, so anything that could escape the store is
/// rejected.
fn validate_key(key: &str) -> Result<(), ArchiveError> {
    let bad = key.is_empty()
        || key.contains('/')
        || key.contains('\\')
        || key.contains('\0')
        || key.contains("..");
    if bad {
        return Err(ArchiveError::InvalidKey(key.to_string()));
    }
    Ok(())
}

fn part_number(path: &Path) -> Option<u32> {
    if path.extension()? != PART_EXTENSION {
        return None;
    }
    path.file_stem()?
        .to_str()?
        .strip_prefix(PART_PREFIX)?
        .parse()
        .ok()
}

fn no_statistics() -> StatisticsOptions {
    StatisticsOptions {
        min_value: false,
        max_value: false,
        distinct_count: false,
        null_count: false,
    }
}

/// Write one part atomically: .tmp first, then rename into place.
fn write_part(frame: &DataFrame, path: &Path) -> Result<(), ArchiveError> {
    let tmp = path.with_extension("parquet.tmp");
    let file = fs::File::create(&tmp).map_err(|e| ArchiveError::io(&tmp, e))?;

    let written = ZstdLevel::try_new(ZSTD_LEVEL).and_then(|level| {
        ParquetWriter::new(file)
            .with_compression(ParquetCompression::Zstd(Some(level)))
            .with_statistics(no_statistics())
            .with_row_group_size(Some(ROW_GROUP_ROWS))
            .finish(&mut frame.clone())
    });
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }

    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        ArchiveError::io(path, e)
    })
}
