//! In-crate test doubles.

use crate::error::VendorError;
use crate::fetch::{RawPayload, SymbolResultMap};
use crate::query::TimeSeriesQuery;
use crate::vendor::{MarketDataVendor, VendorKind};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Vendor answering from fixed payloads. Symbols without a canned payload
/// behave as failed fetches.
pub(crate) struct StubVendor {
    pub kind: VendorKind,
    pub payloads: SymbolResultMap,
    pub exchanges: Value,
    pub tickers: Value,
}

impl StubVendor {
    pub fn new(kind: VendorKind) -> Self {
        Self {
            kind,
            payloads: SymbolResultMap::new(),
            exchanges: json!([{"Code": "US", "Name": "USA Stocks"}]),
            tickers: json!([{"Code": "AAPL"}, {"Code": "MCD"}]),
        }
    }

    pub fn with_payload(mut self, symbol: &str, payload: RawPayload) -> Self {
        self.payloads.insert(symbol.to_string(), payload);
        self
    }
}

#[async_trait]
impl MarketDataVendor for StubVendor {
    fn kind(&self) -> VendorKind {
        self.kind
    }

    fn fetch_supported_exchanges(&self) -> Result<Value, VendorError> {
        Ok(self.exchanges.clone())
    }

    fn fetch_symbols(&self, _exchange_code: &str) -> Result<Value, VendorError> {
        Ok(self.tickers.clone())
    }

    async fn fetch_multi_symbols_data(&self, query: &TimeSeriesQuery) -> SymbolResultMap {
        query
            .symbols()
            .iter()
            .filter_map(|s| self.payloads.get(s).map(|p| (s.clone(), p.clone())))
            .collect()
    }
}

/// Two EODHD daily rows, Jan 3 and Jan 4 2023, newest first.
pub(crate) fn eod_rows(close_jan3: f64, close_jan4: f64) -> RawPayload {
    json!([
        {"date": "2023-01-04", "open": close_jan4, "close": close_jan4, "volume": 1000},
        {"date": "2023-01-03", "open": close_jan3, "close": close_jan3, "volume": 2000}
    ])
}
