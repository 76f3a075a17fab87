//! Error taxonomy.
//!
//! Each pipeline stage owns one error enum. They are designed to be
//! displayable directly in CLI output, and all of them fold into [`Error`]
//! for callers that drive the whole pipeline.

use thiserror::Error;

/// Problems detected before any network or disk I/O. Never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported vendor '{0}' (expected one of: EODHD, Polygon)")]
    UnsupportedVendor(String),

    #[error("missing credential: environment variable {var} is not set")]
    MissingCredential { var: &'static str },

    #[error("unknown universe '{0}'")]
    UnknownUniverse(String),

    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Failure of a single HTTP attempt. Every variant is retryable.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("unexpected response status: {status}")]
    InvalidStatus { status: u16 },

    #[error("unexpected content type '{content_type}'")]
    UnexpectedContentType {
        content_type: String,
        /// First 200 characters of the body, kept for diagnostics.
        snippet: String,
    },

    #[error("network failure: {0}")]
    Network(String),

    #[error("invalid JSON body: {0}")]
    Decode(String),
}

/// Terminal failure for one symbol of a fetch batch.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("all {attempts} attempts failed: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("vendor returned an empty payload")]
    EmptyPayload,

    #[error("vendor returned a payload that is neither an object nor an array")]
    UnstructuredPayload,

    #[error("HTTP session could not be opened: {0}")]
    SessionUnavailable(String),
}

/// Errors from the vendor metadata passthroughs.
#[derive(Debug, Error)]
pub enum VendorError {
    #[error("{operation} is not supported by {vendor}")]
    NotSupported {
        vendor: &'static str,
        operation: &'static str,
    },

    #[error("request failed: {0}")]
    Request(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<reqwest::Error> for VendorError {
    fn from(e: reqwest::Error) -> Self {
        VendorError::Request(e.to_string())
    }
}

/// Errors turning a raw vendor payload into a canonical table.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("unexpected payload shape: {0}")]
    UnexpectedShape(String),

    #[error("row {row} has no '{field}' field")]
    MissingField { row: usize, field: &'static str },

    #[error("row {row}: cannot parse timestamp {value}")]
    InvalidDate { row: usize, value: String },

    #[error("table construction failed: {0}")]
    Frame(String),

    #[error("worker pool unavailable: {0}")]
    Pool(String),
}

impl From<polars::error::PolarsError> for NormalizeError {
    fn from(e: polars::error::PolarsError) -> Self {
        NormalizeError::Frame(e.to_string())
    }
}

/// I/O failures against the on-disk archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parquet error: {0}")]
    Parquet(String),

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("invalid archive key '{0}'")]
    InvalidKey(String),
}

impl ArchiveError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        ArchiveError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

impl From<polars::error::PolarsError> for ArchiveError {
    fn from(e: polars::error::PolarsError) -> Self {
        ArchiveError::Parquet(e.to_string())
    }
}

/// Top-level error for a full fetch → normalize → archive run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("vendor error: {0}")]
    Vendor(#[from] VendorError),

    #[error("normalization error: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("normalization worker failed: {0}")]
    Worker(String),

    #[error("failed to write snapshot {path}: {source}")]
    Snapshot {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
