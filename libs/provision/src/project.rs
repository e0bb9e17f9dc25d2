//! Linking projects to data stores and tearing the links down.
//!
//! A link is one route under the data store's service plus two plugins
//! scoped to that route: key-based authentication and group-based
//! authorization. The three creations are independently fallible remote
//! mutations with no native transaction; the [`crate::FailurePolicy`]
//! decides whether a plugin failure leaves the route behind (historical
//! behavior) or compensates by deleting it again.

use gateway_client::{
    DataStoreKind, GatewayClient, GatewayError, NewPlugin, NewRoute, Plugin, Protocol, Route,
};
use uuid::Uuid;

use crate::outcome::{FailurePolicy, Idempotency, OperationOutcome, StepStatus};

/// Derive the route path for a project/kind pair: exactly
/// `/{project}/{kind}`.
#[must_use]
pub fn route_path(project: &str, kind: DataStoreKind) -> String {
    format!("/{project}/{}", kind.as_str())
}

/// Input for connecting a project to a data store.
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub data_store: Uuid,
    pub project: String,
    pub kind: DataStoreKind,
    pub protocols: Vec<Protocol>,
    pub methods: Vec<String>,
}

impl ConnectRequest {
    fn new_route(&self) -> NewRoute {
        NewRoute {
            name: self.project.clone(),
            protocols: self.protocols.clone(),
            methods: self.methods.clone(),
            paths: vec![route_path(&self.project, self.kind)],
            https_redirect_status_code: 426,
            preserve_host: false,
            request_buffering: true,
            response_buffering: true,
            tags: vec![self.project.clone(), self.kind.as_str().to_owned()],
        }
    }
}

/// Outcome of a connect operation.
#[derive(Debug)]
pub struct ConnectReport {
    /// The created (or reused) route; `None` when creation failed or the
    /// route was rolled back again.
    pub route: Option<Route>,
    pub key_auth: Option<Plugin>,
    pub acl: Option<Plugin>,
    /// True if an existing equivalent route was found and no mutation ran.
    pub reused: bool,
    pub outcome: OperationOutcome,
}

/// Outcome of a disconnect operation.
#[derive(Debug)]
pub struct DisconnectReport {
    /// Routes that were actually deleted.
    pub removed: Vec<Route>,
    pub outcome: OperationOutcome,
}

const STEP_ROUTE: &str = "route";
const STEP_KEY_AUTH: &str = "key-auth plugin";
const STEP_ACL: &str = "acl plugin";
const STEP_ROLLBACK: &str = "rollback: delete route";

/// Links projects to data stores via tagged routes.
pub struct ProjectConnector {
    gateway: GatewayClient,
}

impl ProjectConnector {
    #[must_use]
    pub fn new(gateway: GatewayClient) -> Self {
        Self { gateway }
    }

    /// Connect a project to a data store.
    ///
    /// Sequence: create the route, attach the key-auth plugin, attach the
    /// acl plugin. When route creation fails the plugin steps are skipped
    /// (there is no route id to scope them to). Plugin failures are handled
    /// per `policy`; under [`FailurePolicy::ContinueOnError`] the two plugin
    /// attachments are independent of each other.
    pub async fn connect(
        &self,
        request: &ConnectRequest,
        policy: FailurePolicy,
        idempotency: Idempotency,
    ) -> ConnectReport {
        let mut outcome = OperationOutcome::new();

        if idempotency == Idempotency::ReuseExisting {
            match self.find_existing(request).await {
                Ok(Some(route)) => {
                    tracing::info!(route_id = %route.id, project = %request.project, "reusing existing route");
                    outcome.record(STEP_ROUTE, StepStatus::Succeeded);
                    return ConnectReport {
                        route: Some(route),
                        key_auth: None,
                        acl: None,
                        reused: true,
                        outcome,
                    };
                }
                Ok(None) => {}
                Err(err) => {
                    // Without the lookup there is no duplicate guarantee, so
                    // nothing is mutated.
                    outcome.record("route lookup", StepStatus::from_error(&err));
                    outcome.record(STEP_ROUTE, StepStatus::skipped("route lookup"));
                    outcome.record(STEP_KEY_AUTH, StepStatus::skipped(STEP_ROUTE));
                    outcome.record(STEP_ACL, StepStatus::skipped(STEP_ROUTE));
                    return ConnectReport {
                        route: None,
                        key_auth: None,
                        acl: None,
                        reused: false,
                        outcome,
                    };
                }
            }
        }

        let created = self
            .gateway
            .create_route_for_service(request.data_store, &request.new_route())
            .await;
        outcome.record_result(STEP_ROUTE, &created);

        let route = match created {
            Ok(route) => {
                tracing::info!(route_id = %route.id, project = %request.project, "route created");
                route
            }
            Err(_) => {
                outcome.record(STEP_KEY_AUTH, StepStatus::skipped(STEP_ROUTE));
                outcome.record(STEP_ACL, StepStatus::skipped(STEP_ROUTE));
                return ConnectReport {
                    route: None,
                    key_auth: None,
                    acl: None,
                    reused: false,
                    outcome,
                };
            }
        };

        let key_auth_result = self
            .gateway
            .create_plugin_for_route(
                route.id,
                &NewPlugin::key_auth(&request.project, &request.protocols),
            )
            .await;
        outcome.record_result(STEP_KEY_AUTH, &key_auth_result);

        if key_auth_result.is_err() && policy == FailurePolicy::RollbackOnError {
            outcome.record(STEP_ACL, StepStatus::skipped(STEP_KEY_AUTH));
            let kept = self.roll_back(&mut outcome, &route).await;
            return ConnectReport {
                route: kept.then_some(route),
                key_auth: None,
                acl: None,
                reused: false,
                outcome,
            };
        }

        let acl_result = self
            .gateway
            .create_plugin_for_route(route.id, &NewPlugin::acl(&request.project, &request.protocols))
            .await;
        outcome.record_result(STEP_ACL, &acl_result);

        if acl_result.is_err() && policy == FailurePolicy::RollbackOnError {
            let kept = self.roll_back(&mut outcome, &route).await;
            return ConnectReport {
                route: kept.then_some(route),
                key_auth: None,
                acl: None,
                reused: false,
                outcome,
            };
        }

        // The route stays even when a plugin attach failed: the link exists
        // but is under-protected, and the report says so.
        if key_auth_result.is_err() {
            tracing::warn!(route_id = %route.id, "route is missing its key-auth plugin");
        }
        if acl_result.is_err() {
            tracing::warn!(route_id = %route.id, "route is missing its acl plugin");
        }

        ConnectReport {
            route: Some(route),
            key_auth: key_auth_result.ok(),
            acl: acl_result.ok(),
            reused: false,
            outcome,
        }
    }

    /// Delete the just-created route again. Returns `true` if the route
    /// still exists (the compensation itself failed).
    async fn roll_back(&self, outcome: &mut OperationOutcome, route: &Route) -> bool {
        let deleted = self.gateway.delete_route(route.id).await;
        outcome.record_result(STEP_ROLLBACK, &deleted);
        match deleted {
            Ok(()) => {
                tracing::info!(route_id = %route.id, "route rolled back");
                outcome.mark_rolled_back();
                false
            }
            Err(err) => {
                tracing::warn!(route_id = %route.id, error = %err, "rollback failed; route persists");
                true
            }
        }
    }

    /// Find an existing route equivalent to `request`: same name (the
    /// project id), carrying the kind tag, under the same service. Listing
    /// is by the project tag; the rest is filtered client-side.
    async fn find_existing(&self, request: &ConnectRequest) -> Result<Option<Route>, GatewayError> {
        let routes = self.gateway.list_routes(&request.project).await?;
        Ok(routes.into_iter().find(|r| {
            r.name.as_deref() == Some(request.project.as_str())
                && r.has_tag(request.kind.as_str())
                && r.service.id == request.data_store
        }))
    }

    /// List the routes linking this project to data stores.
    ///
    /// # Errors
    /// Returns the transport failure or rejection of the listing call.
    pub async fn list(&self, project: &str) -> Result<Vec<Route>, GatewayError> {
        self.gateway.list_routes(project).await
    }

    /// Disconnect a project from all its data stores.
    ///
    /// Lists the project's routes by tag and deletes each one; a failing
    /// deletion is recorded and never halts the remaining deletions.
    /// Route-scoped plugins are not deleted here — the control plane is
    /// expected to cascade them away with the route.
    pub async fn disconnect(&self, project: &str) -> DisconnectReport {
        let mut outcome = OperationOutcome::new();
        let mut removed = Vec::new();

        let routes = match self.gateway.list_routes(project).await {
            Ok(routes) => {
                outcome.record("route listing", StepStatus::Succeeded);
                routes
            }
            Err(err) => {
                outcome.record("route listing", StepStatus::from_error(&err));
                return DisconnectReport { removed, outcome };
            }
        };

        for route in routes {
            let step = format!("delete route {}", route.id);
            match self.gateway.delete_route(route.id).await {
                Ok(()) => {
                    outcome.record(step, StepStatus::Succeeded);
                    tracing::info!(route_id = %route.id, project, "route deleted");
                    removed.push(route);
                }
                Err(err) => {
                    outcome.record(step, StepStatus::from_error(&err));
                    tracing::warn!(route_id = %route.id, project, error = %err, "route deletion failed; continuing");
                }
            }
        }

        DisconnectReport { removed, outcome }
    }
}
