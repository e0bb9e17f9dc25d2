//! Data store registration and listing.

use gateway_client::{
    DataStoreKind, GatewayClient, GatewayError, NewService, Protocol, Service,
};

use crate::outcome::Idempotency;

/// Input for registering a data store.
#[derive(Debug, Clone)]
pub struct NewDataStore {
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
    /// Optional request path prefix on the upstream, with a leading slash.
    pub path: Option<String>,
    pub kind: DataStoreKind,
}

impl NewDataStore {
    /// True if `service` already represents this data store: same endpoint
    /// coordinates and carrying this kind's tag.
    fn matches(&self, service: &Service) -> bool {
        service.protocol == self.protocol
            && service.host == self.host
            && service.port == self.port
            && service.path == self.path
            && service.has_tag(self.kind.as_str())
    }
}

/// Result of a registration.
#[derive(Debug, Clone)]
pub struct RegisteredDataStore {
    pub service: Service,
    /// True if an existing matching service was reused instead of created.
    pub reused: bool,
}

/// Registers upstream backends as gateway services and lists them.
pub struct DataStoreRegistry {
    gateway: GatewayClient,
}

impl DataStoreRegistry {
    #[must_use]
    pub fn new(gateway: GatewayClient) -> Self {
        Self { gateway }
    }

    /// Register a data store.
    ///
    /// Under [`Idempotency::AllowDuplicates`] no pre-existence check is
    /// made: two identical calls create two distinct services. Under
    /// [`Idempotency::ReuseExisting`] the registry first scans the existing
    /// services and returns a match instead of creating another.
    ///
    /// # Errors
    /// Returns the control plane's rejection or the transport failure of
    /// the single mutation involved.
    pub async fn register(
        &self,
        new: &NewDataStore,
        idempotency: Idempotency,
    ) -> Result<RegisteredDataStore, GatewayError> {
        if idempotency == Idempotency::ReuseExisting {
            let existing = self.gateway.list_services().await?;
            if let Some(service) = existing.into_iter().find(|s| new.matches(s)) {
                tracing::info!(id = %service.id, host = %service.host, "reusing registered data store");
                return Ok(RegisteredDataStore {
                    service,
                    reused: true,
                });
            }
        }

        let payload = NewService::data_store(
            new.protocol,
            new.host.clone(),
            new.port,
            new.path.clone(),
            new.kind,
        );
        let service = self.gateway.create_service(&payload).await?;
        tracing::info!(id = %service.id, host = %service.host, kind = %new.kind, "data store registered");
        Ok(RegisteredDataStore {
            service,
            reused: false,
        })
    }

    /// List every data store known to the control plane.
    ///
    /// Unfiltered by design; an empty listing is a valid state the caller
    /// reports explicitly, not an error.
    ///
    /// # Errors
    /// Returns the transport failure or rejection of the listing call.
    pub async fn list(&self) -> Result<Vec<Service>, GatewayError> {
        self.gateway.list_services().await
    }
}
