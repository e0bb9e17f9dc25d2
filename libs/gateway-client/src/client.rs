//! The typed admin API client.

use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::models::{
    AclMembership, Consumer, KeyCredential, ListPage, NewAclMembership, NewConsumer,
    NewKeyCredential, NewPlugin, NewRoute, NewService, Plugin, Route, Service,
};
use crate::transport::Transport;

/// Client for the gateway admin API.
///
/// One typed method per control-plane operation this system consumes; no
/// business logic lives here. Cloning is cheap — the underlying connection
/// pool is shared.
#[derive(Clone)]
pub struct GatewayClient {
    transport: Transport,
}

impl GatewayClient {
    /// Build a client for the configured admin API.
    ///
    /// # Errors
    /// Returns an error if TLS initialization fails.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        Ok(Self {
            transport: Transport::new(config)?,
        })
    }

    /// The configured admin API base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.transport.config().base_url.as_str()
    }

    /// Walk a paginated listing to completion, following `next` links.
    async fn list_all<T: serde::de::DeserializeOwned>(
        &self,
        first: String,
    ) -> Result<Vec<T>, GatewayError> {
        let mut items = Vec::new();
        let mut path = Some(first);
        while let Some(current) = path.take() {
            let page: ListPage<T> = self.transport.get_json(&current).await?;
            items.extend(page.data);
            path = page.next;
        }
        Ok(items)
    }

    // === Services ===

    /// Register an upstream service.
    pub async fn create_service(&self, new: &NewService) -> Result<Service, GatewayError> {
        self.transport.post_json("/services", new).await
    }

    /// List all services known to the control plane (unfiltered).
    pub async fn list_services(&self) -> Result<Vec<Service>, GatewayError> {
        self.list_all("/services".to_owned()).await
    }

    // === Routes ===

    /// Create a route under the given service.
    pub async fn create_route_for_service(
        &self,
        service_id: Uuid,
        new: &NewRoute,
    ) -> Result<Route, GatewayError> {
        self.transport
            .post_json(&format!("/services/{service_id}/routes"), new)
            .await
    }

    /// List routes carrying the given tag.
    ///
    /// Tag filtering is the only correlation mechanism the control plane
    /// offers; this is a filtered scan, not a join.
    pub async fn list_routes(&self, tag: &str) -> Result<Vec<Route>, GatewayError> {
        self.list_all(format!("/routes?tags={}", urlencoding::encode(tag)))
            .await
    }

    /// Delete a route by id.
    pub async fn delete_route(&self, route_id: Uuid) -> Result<(), GatewayError> {
        self.transport.delete(&format!("/routes/{route_id}")).await
    }

    // === Plugins ===

    /// Attach a plugin to the given route.
    pub async fn create_plugin_for_route(
        &self,
        route_id: Uuid,
        new: &NewPlugin,
    ) -> Result<Plugin, GatewayError> {
        self.transport
            .post_json(&format!("/routes/{route_id}/plugins"), new)
            .await
    }

    // === Consumers ===

    /// Create a consumer identity.
    pub async fn create_consumer(&self, new: &NewConsumer) -> Result<Consumer, GatewayError> {
        self.transport.post_json("/consumers", new).await
    }

    /// Grant the given consumer membership in a group.
    pub async fn create_acl_for_consumer(
        &self,
        consumer_id: Uuid,
        new: &NewAclMembership,
    ) -> Result<AclMembership, GatewayError> {
        self.transport
            .post_json(&format!("/consumers/{consumer_id}/acls"), new)
            .await
    }

    /// Issue a key credential for the given consumer.
    ///
    /// The key is generated by the control plane and returned in the
    /// response; it is not retrievable again through this client.
    pub async fn create_key_auth_for_consumer(
        &self,
        consumer_id: Uuid,
        new: &NewKeyCredential,
    ) -> Result<KeyCredential, GatewayError> {
        self.transport
            .post_json(&format!("/consumers/{consumer_id}/key-auths"), new)
            .await
    }
}
