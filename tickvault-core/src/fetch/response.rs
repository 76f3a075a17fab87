//! HTTP response validation, applied before decoding the body.

use crate::error::TransportError;
use tracing::error;

/// Characters of a rejected body kept for diagnostics.
const SNIPPET_CHARS: usize = 200;

/// Transport-agnostic view of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: Some("application/json".into()),
            body: body.into(),
        }
    }
}

/// Reject anything that is not a 200 with a JSON content type.
pub fn validate_response(response: &HttpResponse) -> Result<(), TransportError> {
    if response.status != 200 {
        return Err(TransportError::InvalidStatus {
            status: response.status,
        });
    }

    let content_type = response
        .content_type
        .as_deref()
        .unwrap_or("")
        .to_ascii_lowercase();
    if !content_type.starts_with("application/json") {
        let snippet: String = response.body.chars().take(SNIPPET_CHARS).collect();
        error!(content_type = %content_type, "unexpected content type");
        error!("first {SNIPPET_CHARS} characters of the response: {snippet}");
        return Err(TransportError::UnexpectedContentType {
            content_type,
            snippet,
        });
    }

    Ok(())
}
