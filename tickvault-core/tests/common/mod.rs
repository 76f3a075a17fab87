//! Scripted transport shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tickvault_core::error::TransportError;
use tickvault_core::fetch::{Connector, HttpResponse, Session};

pub const ROOT: &str = "http://vendor.test";

/// Canned behavior for one URL.
#[derive(Debug, Clone)]
pub enum Route {
    Json(Value),
    Status(u16),
    /// 500 for the first `failures` calls, then the JSON body.
    Flaky { failures: u32, then: Value },
    Html,
}

/// Connector whose sessions answer from a fixed route table and count calls
/// per URL. Unknown URLs get a 404.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    routes: Arc<HashMap<String, Route>>,
    calls: Arc<Mutex<HashMap<String, u32>>>,
    sessions: Arc<Mutex<u32>>,
}

impl ScriptedConnector {
    pub fn new(routes: impl IntoIterator<Item = (String, Route)>) -> Self {
        Self {
            routes: Arc::new(routes.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn calls(&self, url: &str) -> u32 {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn sessions_opened(&self) -> u32 {
        *self.sessions.lock().unwrap()
    }
}

impl Connector for ScriptedConnector {
    fn open(&self) -> Result<Box<dyn Session>, TransportError> {
        *self.sessions.lock().unwrap() += 1;
        Ok(Box::new(ScriptedSession {
            routes: Arc::clone(&self.routes),
            calls: Arc::clone(&self.calls),
        }))
    }
}

struct ScriptedSession {
    routes: Arc<HashMap<String, Route>>,
    calls: Arc<Mutex<HashMap<String, u32>>>,
}

#[async_trait]
impl Session for ScriptedSession {
    async fn get(&self, url: &str, _params: &[(String, String)]) -> Result<HttpResponse, TransportError> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            let n = calls.entry(url.to_string()).or_insert(0);
            *n += 1;
            *n
        };

        let response = match self.routes.get(url) {
            None => HttpResponse::json(404, "{}"),
            Some(Route::Json(body)) => HttpResponse::json(200, body.to_string()),
            Some(Route::Status(status)) => HttpResponse::json(*status, "{}"),
            Some(Route::Flaky { failures, then }) if call > *failures => {
                HttpResponse::json(200, then.to_string())
            }
            Some(Route::Flaky { .. }) => HttpResponse::json(500, "{}"),
            Some(Route::Html) => HttpResponse {
                status: 200,
                content_type: Some("text/html; charset=utf-8".to_string()),
                body: "<html><body>rate limited</body></html>".to_string(),
            },
        };
        Ok(response)
    }
}

/// EODHD rows for Jan 3 and Jan 4 2023, newest first as the API may send
/// them.
pub fn eod_jan_3_4(open: [f64; 2], close: [f64; 2]) -> Value {
    serde_json::json!([
        {"date": "2023-01-04", "open": open[1], "high": open[1] + 2.0, "low": open[1] - 2.0,
         "close": close[1], "adjusted_close": close[1], "volume": 2_584_100},
        {"date": "2023-01-03", "open": open[0], "high": open[0] + 2.0, "low": open[0] - 2.0,
         "close": close[0], "adjusted_close": close[0], "volume": 2_743_800}
    ])
}

pub const JAN3_MS: i64 = 1_672_704_000_000;
pub const JAN4_MS: i64 = 1_672_790_400_000;
