//! Error types for admin API access.

use std::time::Duration;

use thiserror::Error;

/// Error type for admin API operations.
///
/// Two families matter to callers: [`GatewayError::Rejected`] means the
/// control plane answered and refused the request (validation failure,
/// not-found, conflict, or an internal control-plane error); everything else
/// means the control plane could not be reached or its answer could not be
/// read.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GatewayError {
    /// The control plane returned a non-success status.
    #[error("control plane rejected the request: HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Transport error (connection refused, DNS failure, reset, ...).
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The configured per-request timeout elapsed.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// TLS setup failed at client construction.
    #[error("TLS setup failed: {0}")]
    Tls(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The admin API base URL is unusable.
    #[error("invalid admin API URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Response body exceeded the configured size cap.
    #[error("response body too large: limit {limit} bytes, got {actual} bytes")]
    BodyTooLarge { limit: usize, actual: usize },

    /// The control plane answered with a body that does not decode.
    #[error("failed to decode control-plane response: {0}")]
    Json(#[from] serde_json::Error),

    /// Request construction failed.
    #[error("failed to build request: {0}")]
    Http(#[from] http::Error),
}

impl GatewayError {
    /// Build a [`GatewayError::Rejected`] from a response status and body.
    ///
    /// The control plane reports errors as JSON objects with a `message`
    /// field; when the body is not of that shape a truncated preview of the
    /// raw bytes is carried instead.
    #[must_use]
    pub fn rejected(status: http::StatusCode, body: &[u8]) -> Self {
        let message = serde_json::from_slice::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_owned))
            .unwrap_or_else(|| {
                let preview = String::from_utf8_lossy(&body[..body.len().min(256)]);
                preview.trim().to_owned()
            });
        Self::Rejected {
            status: status.as_u16(),
            message,
        }
    }

    /// True if the control plane answered and refused the request.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// HTTP status of a rejection, if this is one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<hyper::Error> for GatewayError {
    fn from(err: hyper::Error) -> Self {
        Self::Transport(Box::new(err))
    }
}

impl From<hyper_util::client::legacy::Error> for GatewayError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        Self::Transport(Box::new(err))
    }
}
