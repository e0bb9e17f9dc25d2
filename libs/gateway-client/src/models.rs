//! Wire models for the admin API resources.
//!
//! `New*` types are request payloads (serialize only); the bare types are
//! what the control plane returns. Fields the control plane may report as
//! `null` deserialize through [`null_as_default`].

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Deserialize `null` as the type's default (the control plane reports
/// absent tag lists and paths as explicit nulls).
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Upstream-facing protocol of a service or route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a [`Protocol`] from user input.
#[derive(Debug, Error)]
#[error("unknown protocol '{0}', expected one of: http, https")]
pub struct ParseProtocolError(String);

impl FromStr for Protocol {
    type Err = ParseProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Self::Http),
            "https" => Ok(Self::Https),
            other => Err(ParseProtocolError(other.to_owned())),
        }
    }
}

/// Classification of a data store, carried only as a tag on the remote
/// service — the single queryable classification mechanism the control
/// plane offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataStoreKind {
    Fhir,
    S3,
}

impl DataStoreKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fhir => "fhir",
            Self::S3 => "s3",
        }
    }
}

impl std::fmt::Display for DataStoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a [`DataStoreKind`] from user input.
#[derive(Debug, Error)]
#[error("unknown data store type '{0}', expected one of: fhir, s3")]
pub struct ParseDataStoreKindError(String);

impl FromStr for DataStoreKind {
    type Err = ParseDataStoreKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fhir" => Ok(Self::Fhir),
            "s3" => Ok(Self::S3),
            other => Err(ParseDataStoreKindError(other.to_owned())),
        }
    }
}

/// Paginated list envelope returned by every admin API list endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ListPage<T> {
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Vec<T>,
    /// Relative URL of the next page, when the listing is truncated.
    #[serde(default)]
    pub next: Option<String>,
}

/// Request payload for registering an upstream service.
#[derive(Debug, Clone, Serialize)]
pub struct NewService {
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub enabled: bool,
    /// `None` leaves TLS verification at the control plane's default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_verify: Option<bool>,
    pub tags: Vec<String>,
}

impl NewService {
    /// Standard payload for a data store: enabled, no TLS-verification
    /// override, tagged with its kind.
    #[must_use]
    pub fn data_store(
        protocol: Protocol,
        host: impl Into<String>,
        port: u16,
        path: Option<String>,
        kind: DataStoreKind,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            protocol,
            path,
            enabled: true,
            tls_verify: None,
            tags: vec![kind.as_str().to_owned()],
        }
    }
}

/// An upstream service as reported by the control plane.
#[derive(Debug, Clone, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

impl Service {
    /// True if the service carries the given tag.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Reference to the service owning a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRef {
    pub id: Uuid,
}

/// Request payload for creating a route under a service.
#[derive(Debug, Clone, Serialize)]
pub struct NewRoute {
    pub name: String,
    pub protocols: Vec<Protocol>,
    pub methods: Vec<String>,
    pub paths: Vec<String>,
    pub https_redirect_status_code: u16,
    pub preserve_host: bool,
    pub request_buffering: bool,
    pub response_buffering: bool,
    pub tags: Vec<String>,
}

/// A route as reported by the control plane.
#[derive(Debug, Clone, Deserialize)]
pub struct Route {
    pub id: Uuid,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub protocols: Vec<Protocol>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub methods: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub paths: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    /// Owning service; every route belongs to exactly one.
    pub service: ServiceRef,
}

impl Route {
    /// True if the route carries the given tag.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Configuration of the key-based authentication plugin.
#[derive(Debug, Clone, Serialize)]
pub struct KeyAuthConfig {
    pub hide_credentials: bool,
    pub key_in_body: bool,
    pub key_in_header: bool,
    pub key_in_query: bool,
    pub key_names: Vec<String>,
    pub run_on_preflight: bool,
}

/// Configuration of the group-based authorization plugin.
#[derive(Debug, Clone, Serialize)]
pub struct AclConfig {
    pub allow: Vec<String>,
    pub hide_groups_header: bool,
}

/// Per-plugin configuration payload.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PluginConfig {
    KeyAuth(KeyAuthConfig),
    Acl(AclConfig),
}

/// Request payload for attaching a plugin to a route.
#[derive(Debug, Clone, Serialize)]
pub struct NewPlugin {
    pub name: String,
    pub instance_name: String,
    pub config: PluginConfig,
    pub enabled: bool,
    pub protocols: Vec<Protocol>,
}

impl NewPlugin {
    /// Key-based authentication: the key is accepted only via the `apikey`
    /// header, hidden from the upstream, and checked on preflight requests.
    #[must_use]
    pub fn key_auth(project: &str, protocols: &[Protocol]) -> Self {
        Self {
            name: "key-auth".to_owned(),
            instance_name: format!("{project}-keyauth"),
            config: PluginConfig::KeyAuth(KeyAuthConfig {
                hide_credentials: true,
                key_in_body: false,
                key_in_header: true,
                key_in_query: false,
                key_names: vec!["apikey".to_owned()],
                run_on_preflight: true,
            }),
            enabled: true,
            protocols: protocols.to_vec(),
        }
    }

    /// Group-based authorization: allow-list of exactly the project group,
    /// with the internal group header hidden from the upstream.
    #[must_use]
    pub fn acl(project: &str, protocols: &[Protocol]) -> Self {
        Self {
            name: "acl".to_owned(),
            instance_name: format!("{project}-acl"),
            config: PluginConfig::Acl(AclConfig {
                allow: vec![project.to_owned()],
                hide_groups_header: true,
            }),
            enabled: true,
            protocols: protocols.to_vec(),
        }
    }
}

/// A plugin instance as reported by the control plane.
#[derive(Debug, Clone, Deserialize)]
pub struct Plugin {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub instance_name: Option<String>,
}

/// Request payload for creating a consumer identity.
#[derive(Debug, Clone, Serialize)]
pub struct NewConsumer {
    pub username: String,
    pub custom_id: String,
    pub tags: Vec<String>,
}

/// A consumer identity as reported by the control plane.
#[derive(Debug, Clone, Deserialize)]
pub struct Consumer {
    pub id: Uuid,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub custom_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

/// Request payload for granting a consumer membership in a group.
#[derive(Debug, Clone, Serialize)]
pub struct NewAclMembership {
    pub group: String,
    pub tags: Vec<String>,
}

/// A group membership as reported by the control plane.
#[derive(Debug, Clone, Deserialize)]
pub struct AclMembership {
    pub id: Uuid,
    pub group: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

/// Request payload for issuing a key credential.
///
/// The key itself is omitted so the control plane generates it.
#[derive(Debug, Clone, Serialize)]
pub struct NewKeyCredential {
    pub tags: Vec<String>,
}

/// A key credential as reported by the control plane.
///
/// The `key` is the opaque bearer secret; the control plane is the system of
/// record, and the value is surfaced to the caller exactly once.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyCredential {
    pub id: Uuid,
    pub key: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}
