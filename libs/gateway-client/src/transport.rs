//! HTTP transport for the admin API.
//!
//! One hyper client behind JSON helpers. Every round trip is bounded by the
//! configured request timeout, and response bodies are capped at the
//! configured size before decoding.

use std::sync::Arc;

use bytes::Bytes;
use http::{Method, Request, header};
use http_body_util::{BodyExt, Full};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::GatewayConfig;
use crate::error::GatewayError;

#[derive(Clone)]
pub(crate) struct Transport {
    http: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    config: GatewayConfig,
}

/// Resolve the TLS crypto provider: reuse a globally installed one when
/// present, otherwise fall back to aws-lc-rs without touching global state.
fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

impl Transport {
    /// Build the transport.
    ///
    /// The connector accepts both `https` and plain `http`: the admin API's
    /// default listener is `http://localhost:8001`.
    pub(crate) fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let https = HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(crypto_provider())
            .map_err(|e| GatewayError::Tls(Box::new(e)))?
            .https_or_http()
            .enable_all_versions()
            .build();

        let http = Client::builder(TokioExecutor::new()).build::<_, Full<Bytes>>(https);

        Ok(Self { http, config })
    }

    pub(crate) fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// GET `path` and decode the JSON response.
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let bytes = self.send(Method::GET, path, None).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// POST `body` as JSON to `path` and decode the JSON response.
    pub(crate) async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, GatewayError>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let payload = serde_json::to_vec(body)?;
        let bytes = self.send(Method::POST, path, Some(Bytes::from(payload))).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// DELETE `path`, discarding any response body.
    pub(crate) async fn delete(&self, path: &str) -> Result<(), GatewayError> {
        self.send(Method::DELETE, path, None).await?;
        Ok(())
    }

    /// One bounded round trip: build, send under the configured timeout,
    /// collect the body, and map non-success statuses to `Rejected`.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Bytes>,
    ) -> Result<Bytes, GatewayError> {
        let url = format!("{}{path}", self.config.base());
        tracing::debug!(%method, %url, "admin API request");

        let builder = Request::builder()
            .method(method)
            .uri(&url)
            .header(header::USER_AGENT, &self.config.user_agent)
            .header(header::ACCEPT, "application/json");

        let request = match body {
            Some(bytes) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Full::new(bytes))?,
            None => builder.body(Full::default())?,
        };

        let response = tokio::time::timeout(self.config.request_timeout, self.http.request(request))
            .await
            .map_err(|_| GatewayError::Timeout(self.config.request_timeout))??;

        let (parts, body) = response.into_parts();
        let bytes = body.collect().await?.to_bytes();

        if bytes.len() > self.config.max_body_size {
            return Err(GatewayError::BodyTooLarge {
                limit: self.config.max_body_size,
                actual: bytes.len(),
            });
        }

        if !parts.status.is_success() {
            tracing::debug!(status = %parts.status, %url, "admin API rejection");
            return Err(GatewayError::rejected(parts.status, &bytes));
        }

        Ok(bytes)
    }
}
