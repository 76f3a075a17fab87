//! Single-symbol request with bounded retry and exponential backoff.

use super::response::validate_response;
use super::retry::RetryPolicy;
use super::session::Session;
use super::{RawPayload, SymbolRequest};
use crate::error::{FetchError, TransportError};
use tracing::{debug, error};

/// Executes one symbol's request against a shared session.
pub struct RequestExecutor<'a> {
    session: &'a dyn Session,
    policy: RetryPolicy,
}

impl<'a> RequestExecutor<'a> {
    pub fn new(session: &'a dyn Session, policy: RetryPolicy) -> Self {
        Self { session, policy }
    }

    /// Issue the request, retrying every transport failure until
    /// `max_tries` is reached. The final failure is returned wrapped in
    /// [`FetchError::RetriesExhausted`].
    pub async fn execute(&self, request: &SymbolRequest) -> Result<RawPayload, FetchError> {
        let max_tries = self.policy.max_tries.max(1);
        let mut attempt = 0;

        loop {
            debug!(symbol = %request.symbol, "attempt {} of {max_tries}", attempt + 1);

            match self.attempt(request).await {
                Ok(payload) => return Ok(payload),
                Err(cause) if attempt + 1 >= max_tries => {
                    error!(
                        symbol = %request.symbol,
                        "all {max_tries} attempts failed: {cause}"
                    );
                    return Err(FetchError::RetriesExhausted {
                        attempts: max_tries,
                        source: cause,
                    });
                }
                Err(cause) => {
                    let delay = self.policy.delay_after(attempt);
                    debug!(
                        symbol = %request.symbol,
                        "attempt {} failed ({cause}); waiting {delay:?} before retrying",
                        attempt + 1
                    );
                    tokio::time::sleep(delay).await;
                }
            }

            attempt += 1;
        }
    }

    async fn attempt(&self, request: &SymbolRequest) -> Result<RawPayload, TransportError> {
        let response = self.session.get(&request.url, &request.params).await?;
        validate_response(&response)?;
        serde_json::from_str(&response.body).map_err(|e| TransportError::Decode(e.to_string()))
    }
}
