//! Provisioning core for multi-tenant data-store access.
//!
//! Three orchestrators compose linked objects in the gateway control plane:
//!
//! - [`DataStoreRegistry`] registers upstream backends as services;
//! - [`ProjectConnector`] links a project to a data store (route + key-auth
//!   plugin + acl plugin) and tears the links down again;
//! - [`AnalysisProvisioner`] creates a per-analysis consumer with group
//!   membership and an API key.
//!
//! The control plane has no cross-call transaction, so every multi-step
//! operation here is a sequence of independently fallible remote creates.
//! Instead of letting one failure abort or pass silently, each step is
//! folded into an [`OperationOutcome`] that callers classify as success,
//! partial failure, or failure — and the historically loose behaviors
//! (duplicate creation, no rollback) stay available behind the explicit
//! [`Idempotency`] and [`FailurePolicy`] knobs.

mod analysis;
mod datastore;
mod outcome;
mod project;

pub use analysis::{AnalysisProvisioner, AnalysisReport};
pub use datastore::{DataStoreRegistry, NewDataStore, RegisteredDataStore};
pub use outcome::{
    Classification, FailurePolicy, Idempotency, OperationOutcome, StepReport, StepStatus,
};
pub use project::{ConnectReport, ConnectRequest, DisconnectReport, ProjectConnector, route_path};
