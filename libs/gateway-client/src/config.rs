use std::time::Duration;

use url::Url;

use crate::error::GatewayError;

/// Default admin API base URL (the control plane's local listener).
pub const DEFAULT_ADMIN_URL: &str = "http://localhost:8001";

/// Default per-request timeout.
///
/// Always an explicit value: no request is ever issued with a transport
/// library's built-in default.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on collected response bodies (1 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Default User-Agent string for admin API requests.
pub const DEFAULT_USER_AGENT: &str = concat!("datagate/", env!("CARGO_PKG_VERSION"));

/// Configuration for [`crate::GatewayClient`].
///
/// Passed explicitly into the client constructor; there is no ambient or
/// global configuration anywhere in the crate.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the admin API, scheme `http` or `https`.
    pub base_url: Url,
    /// Timeout applied to every request round trip.
    pub request_timeout: Duration,
    /// Maximum accepted response body size in bytes.
    pub max_body_size: usize,
    /// User-Agent header value.
    pub user_agent: String,
}

impl GatewayConfig {
    /// Create a configuration for the given admin API base URL.
    ///
    /// # Errors
    /// Returns [`GatewayError::InvalidUrl`] if the URL does not parse, has a
    /// scheme other than `http`/`https`, or lacks a host.
    pub fn new(base_url: &str) -> Result<Self, GatewayError> {
        let parsed = Url::parse(base_url).map_err(|e| GatewayError::InvalidUrl {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(GatewayError::InvalidUrl {
                url: base_url.to_owned(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        if parsed.host_str().is_none() {
            return Err(GatewayError::InvalidUrl {
                url: base_url.to_owned(),
                reason: "missing host".to_owned(),
            });
        }
        Ok(Self {
            base_url: parsed,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        })
    }

    /// Set the per-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the maximum accepted response body size.
    #[must_use]
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Base URL with any trailing slash removed, for path concatenation.
    pub(crate) fn base(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }
}
