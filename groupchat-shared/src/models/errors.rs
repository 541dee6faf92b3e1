use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error body returned by the chat server (`{"detail": ...}`).
///
/// `detail` is usually a string, but validation failures carry a list of
/// objects, so the raw JSON value is kept.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Human readable explanation or structured validation report.
    pub detail: Value,
}

impl ErrorResponse {
    /// Creates an error response with a plain string detail.
    #[must_use]
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: Value::String(detail.into()),
        }
    }

    /// Best-effort extraction of an error body; falls back to the raw text.
    #[must_use]
    pub fn from_body(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_else(|_| Self::new(body.trim()))
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.detail {
            Value::String(text) => f.write_str(text),
            other => write!(f, "{other}"),
        }
    }
}

impl std::error::Error for ErrorResponse {}
