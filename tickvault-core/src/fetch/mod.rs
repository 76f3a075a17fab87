//! Concurrent fetch-with-retry pipeline.
//!
//! One [`SymbolRequest`] per symbol goes through [`RequestExecutor`] (bounded
//! retry with exponential backoff), and [`FetchOrchestrator`] fans those out
//! over a single batch-scoped [`Session`].

pub mod executor;
pub mod orchestrator;
pub mod response;
pub mod retry;
pub mod session;

use std::collections::HashMap;

pub use executor::RequestExecutor;
pub use orchestrator::{FetchOrchestrator, FetchReport};
pub use response::{validate_response, HttpResponse};
pub use retry::RetryPolicy;
pub use session::{Connector, HttpConnector, Session};

/// Decoded JSON body returned by a vendor.
pub type RawPayload = serde_json::Value;

/// Successful payloads keyed by symbol. Failed symbols are absent.
pub type SymbolResultMap = HashMap<String, RawPayload>;

/// Everything needed to issue one symbol's GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRequest {
    pub symbol: String,
    pub url: String,
    pub params: Vec<(String, String)>,
}

impl SymbolRequest {
    pub fn new(symbol: impl Into<String>, url: impl Into<String>, params: Vec<(String, String)>) -> Self {
        Self {
            symbol: symbol.into(),
            url: url.into(),
            params,
        }
    }
}
