//! Typed client for a Kong-compatible gateway admin API.
//!
//! This crate is the I/O boundary of datagate: it knows the wire shapes of
//! the six control-plane resource kinds (service, route, plugin, consumer,
//! ACL membership, key credential) and how to reach them over HTTP, and
//! nothing about provisioning policy. All state lives in the control plane;
//! the client holds only its configuration and a connection pool.
//!
//! ```ignore
//! let config = GatewayConfig::new("http://localhost:8001")?;
//! let client = GatewayClient::new(config)?;
//! let services = client.list_services().await?;
//! ```

mod client;
mod config;
mod error;
mod models;
mod transport;

pub use client::GatewayClient;
pub use config::{DEFAULT_ADMIN_URL, DEFAULT_REQUEST_TIMEOUT, GatewayConfig};
pub use error::GatewayError;
pub use models::{
    AclConfig, AclMembership, Consumer, DataStoreKind, KeyAuthConfig, KeyCredential, ListPage,
    NewAclMembership, NewConsumer, NewKeyCredential, NewPlugin, NewRoute, NewService,
    ParseDataStoreKindError, ParseProtocolError, Plugin, PluginConfig, Protocol, Route, Service,
    ServiceRef,
};
