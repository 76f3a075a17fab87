//! Batch-scoped HTTP sessions.
//!
//! A [`Connector`] opens one [`Session`] per fetch batch; the session is
//! dropped (closing its connection pool) when the batch completes. Tests
//! substitute scripted implementations of both traits.

use super::response::HttpResponse;
use crate::error::TransportError;
use async_trait::async_trait;
use std::time::Duration;

/// One shared connection context for every request of a batch.
#[async_trait]
pub trait Session: Send + Sync {
    async fn get(&self, url: &str, params: &[(String, String)]) -> Result<HttpResponse, TransportError>;
}

/// Opens a fresh [`Session`] for each batch.
pub trait Connector: Send + Sync {
    fn open(&self) -> Result<Box<dyn Session>, TransportError>;
}

/// Production connector backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    timeout: Duration,
}

impl HttpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl Connector for HttpConnector {
    fn open(&self) -> Result<Box<dyn Session>, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| TransportError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Box::new(HttpSession { client }))
    }
}

struct HttpSession {
    client: reqwest::Client,
}

#[async_trait]
impl Session for HttpSession {
    async fn get(&self, url: &str, params: &[(String, String)]) -> Result<HttpResponse, TransportError> {
        let resp = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}
