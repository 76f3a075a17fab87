//! Fan-out of per-symbol requests over one batch-scoped session.
//!
//! All requests run concurrently on the current task (logical concurrency
//! over I/O waits). The orchestrator waits for every request to settle,
//! never short-circuits, and never fails as a whole: failed symbols are
//! logged and left out of the returned map.

use super::executor::RequestExecutor;
use super::retry::RetryPolicy;
use super::session::Connector;
use super::{RawPayload, SymbolRequest, SymbolResultMap};
use crate::error::FetchError;
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

/// Per-symbol outcome of a batch, successes and failures kept apart.
#[derive(Debug, Default)]
pub struct FetchReport {
    pub succeeded: SymbolResultMap,
    /// Failed symbols in request order.
    pub failed: Vec<(String, FetchError)>,
}

impl FetchReport {
    pub fn failed_symbols(&self) -> Vec<&str> {
        self.failed.iter().map(|(s, _)| s.as_str()).collect()
    }

    pub fn into_results(self) -> SymbolResultMap {
        self.succeeded
    }
}

/// Runs batches of symbol requests with a shared retry policy.
#[derive(Clone)]
pub struct FetchOrchestrator {
    connector: Arc<dyn Connector>,
    policy: RetryPolicy,
}

impl FetchOrchestrator {
    pub fn new(connector: Arc<dyn Connector>, policy: RetryPolicy) -> Self {
        Self { connector, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Fetch every symbol and return only the successful payloads.
    pub async fn fetch_all<F>(&self, symbols: &[String], build_request: F) -> SymbolResultMap
    where
        F: Fn(&str) -> SymbolRequest,
    {
        self.fetch_all_outcomes(symbols, build_request)
            .await
            .into_results()
    }

    /// Fetch every symbol and report each outcome explicitly.
    pub async fn fetch_all_outcomes<F>(&self, symbols: &[String], build_request: F) -> FetchReport
    where
        F: Fn(&str) -> SymbolRequest,
    {
        let requests: Vec<SymbolRequest> = symbols.iter().map(|s| build_request(s)).collect();
        info!("{} symbols to fetch", requests.len());

        // Session lives exactly as long as this batch.
        let session = match self.connector.open() {
            Ok(session) => session,
            Err(e) => {
                warn!("could not open HTTP session: {e}");
                let failed = requests
                    .into_iter()
                    .map(|r| (r.symbol, FetchError::SessionUnavailable(e.to_string())))
                    .collect();
                let report = FetchReport {
                    succeeded: SymbolResultMap::new(),
                    failed,
                };
                log_failures(&report);
                return report;
            }
        };

        let executor = RequestExecutor::new(session.as_ref(), self.policy);
        let outcomes = join_all(requests.iter().map(|r| executor.execute(r))).await;

        let mut report = FetchReport::default();
        for (request, outcome) in requests.into_iter().zip(outcomes) {
            match outcome.and_then(classify) {
                Ok(payload) => {
                    report.succeeded.insert(request.symbol, payload);
                }
                Err(e) => report.failed.push((request.symbol, e)),
            }
        }

        log_failures(&report);
        report
    }
}

/// A payload counts as a success only if it is a non-empty object or array.
fn classify(payload: RawPayload) -> Result<RawPayload, FetchError> {
    match &payload {
        RawPayload::Array(items) if !items.is_empty() => Ok(payload),
        RawPayload::Object(fields) if !fields.is_empty() => Ok(payload),
        RawPayload::Array(_) | RawPayload::Object(_) | RawPayload::Null => Err(FetchError::EmptyPayload),
        _ => Err(FetchError::UnstructuredPayload),
    }
}

fn log_failures(report: &FetchReport) {
    if report.failed.is_empty() {
        return;
    }
    warn!(
        "{} failed symbols during fetching: {:?}",
        report.failed.len(),
        report.failed_symbols()
    );
    for (symbol, e) in &report.failed {
        warn!(symbol = %symbol, "fetch failed: {e}");
    }
}
