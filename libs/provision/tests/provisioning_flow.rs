//! End-to-end provisioning flows against a mock control plane.

use gateway_client::{DataStoreKind, GatewayClient, GatewayConfig, Protocol};
use httpmock::prelude::*;
use provision::{
    AnalysisProvisioner, Classification, ConnectRequest, DataStoreRegistry, FailurePolicy,
    Idempotency, NewDataStore, ProjectConnector,
};
use serde_json::json;
use uuid::{Uuid, uuid};

const DATA_STORE_ID: Uuid = uuid!("9d7f01cf-7c5a-4e25-9d52-c73f5e16d10f");
const ROUTE_ID: Uuid = uuid!("46e47c3b-fc8d-4e3c-a2ff-89959b17f3c4");
const OTHER_ROUTE_ID: Uuid = uuid!("8c1d45aa-3f60-47ce-9b3e-0d2b8f4a6a01");
const KEY_AUTH_ID: Uuid = uuid!("11111111-2222-4333-8444-555555555555");
const ACL_ID: Uuid = uuid!("66666666-7777-4888-9999-aaaaaaaaaaaa");
const CONSUMER_ID: Uuid = uuid!("f1e2d3c4-b5a6-4978-8899-aabbccddeeff");

fn client(server: &MockServer) -> GatewayClient {
    GatewayClient::new(GatewayConfig::new(&server.base_url()).unwrap()).unwrap()
}

fn fhir_store() -> NewDataStore {
    NewDataStore {
        protocol: Protocol::Https,
        host: "api.example.org".to_owned(),
        port: 443,
        path: Some("/base".to_owned()),
        kind: DataStoreKind::Fhir,
    }
}

fn connect_request() -> ConnectRequest {
    ConnectRequest {
        data_store: DATA_STORE_ID,
        project: "proj-42".to_owned(),
        kind: DataStoreKind::Fhir,
        protocols: vec![Protocol::Http, Protocol::Https],
        methods: vec!["GET".to_owned(), "POST".to_owned()],
    }
}

fn service_json() -> serde_json::Value {
    json!({
        "id": DATA_STORE_ID,
        "host": "api.example.org",
        "port": 443,
        "protocol": "https",
        "path": "/base",
        "tags": ["fhir"],
    })
}

fn route_json(id: Uuid, service: Uuid) -> serde_json::Value {
    json!({
        "id": id,
        "name": "proj-42",
        "protocols": ["http", "https"],
        "methods": ["GET", "POST"],
        "paths": ["/proj-42/fhir"],
        "tags": ["proj-42", "fhir"],
        "service": { "id": service },
    })
}

// === Data store registration ===

#[tokio::test]
async fn register_then_list_shows_the_data_store() {
    let server = MockServer::start();
    let create = server.mock(|when, then| {
        when.method(POST).path("/services");
        then.status(201).json_body(service_json());
    });
    server.mock(|when, then| {
        when.method(GET).path("/services");
        then.status(200)
            .json_body(json!({ "data": [service_json()], "next": null }));
    });

    let registry = DataStoreRegistry::new(client(&server));
    let registered = registry
        .register(&fhir_store(), Idempotency::AllowDuplicates)
        .await
        .unwrap();
    create.assert();
    assert_eq!(registered.service.id, DATA_STORE_ID);
    assert!(!registered.reused);

    let listed = registry.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].host, "api.example.org");
    assert_eq!(listed[0].port, 443);
    assert_eq!(listed[0].path.as_deref(), Some("/base"));
}

#[tokio::test]
async fn register_reuses_matching_service_when_asked() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/services");
        then.status(200)
            .json_body(json!({ "data": [service_json()], "next": null }));
    });
    let create = server.mock(|when, then| {
        when.method(POST).path("/services");
        then.status(201).json_body(service_json());
    });

    let registry = DataStoreRegistry::new(client(&server));
    let registered = registry
        .register(&fhir_store(), Idempotency::ReuseExisting)
        .await
        .unwrap();
    assert!(registered.reused);
    assert_eq!(registered.service.id, DATA_STORE_ID);
    assert_eq!(create.calls(), 0);
}

#[tokio::test]
async fn register_duplicates_when_allowed() {
    let server = MockServer::start();
    let create = server.mock(|when, then| {
        when.method(POST).path("/services");
        then.status(201).json_body(service_json());
    });

    let registry = DataStoreRegistry::new(client(&server));
    registry
        .register(&fhir_store(), Idempotency::AllowDuplicates)
        .await
        .unwrap();
    registry
        .register(&fhir_store(), Idempotency::AllowDuplicates)
        .await
        .unwrap();
    // No pre-existence check: both calls reached the control plane.
    assert_eq!(create.calls(), 2);
}

// === Project connection ===

#[tokio::test]
async fn connect_creates_route_and_both_plugins() {
    let server = MockServer::start();
    let route = server.mock(|when, then| {
        when.method(POST)
            .path(format!("/services/{DATA_STORE_ID}/routes"))
            .json_body(json!({
                "name": "proj-42",
                "protocols": ["http", "https"],
                "methods": ["GET", "POST"],
                "paths": ["/proj-42/fhir"],
                "https_redirect_status_code": 426,
                "preserve_host": false,
                "request_buffering": true,
                "response_buffering": true,
                "tags": ["proj-42", "fhir"],
            }));
        then.status(201).json_body(route_json(ROUTE_ID, DATA_STORE_ID));
    });
    let key_auth = server.mock(|when, then| {
        when.method(POST)
            .path(format!("/routes/{ROUTE_ID}/plugins"))
            .json_body_includes(r#"{"name": "key-auth", "instance_name": "proj-42-keyauth"}"#);
        then.status(201)
            .json_body(json!({ "id": KEY_AUTH_ID, "name": "key-auth" }));
    });
    let acl = server.mock(|when, then| {
        when.method(POST)
            .path(format!("/routes/{ROUTE_ID}/plugins"))
            .json_body_includes(r#"{"name": "acl", "instance_name": "proj-42-acl"}"#);
        then.status(201).json_body(json!({ "id": ACL_ID, "name": "acl" }));
    });

    let connector = ProjectConnector::new(client(&server));
    let report = connector
        .connect(
            &connect_request(),
            FailurePolicy::ContinueOnError,
            Idempotency::AllowDuplicates,
        )
        .await;

    route.assert();
    key_auth.assert();
    acl.assert();
    assert_eq!(report.outcome.classification(), Classification::Success);
    let created = report.route.expect("route should exist");
    assert_eq!(created.id, ROUTE_ID);
    assert_eq!(created.paths, vec!["/proj-42/fhir".to_owned()]);
    assert_eq!(report.key_auth.expect("key-auth id").id, KEY_AUTH_ID);
    assert_eq!(report.acl.expect("acl id").id, ACL_ID);
}

#[tokio::test]
async fn connect_route_failure_skips_plugin_steps() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST)
            .path(format!("/services/{DATA_STORE_ID}/routes"));
        then.status(400)
            .json_body(json!({"message": "schema violation"}));
    });
    let plugins = server.mock(|when, then| {
        when.method(POST).path_includes("/plugins");
        then.status(201).json_body(json!({ "id": ACL_ID, "name": "acl" }));
    });

    let connector = ProjectConnector::new(client(&server));
    let report = connector
        .connect(
            &connect_request(),
            FailurePolicy::ContinueOnError,
            Idempotency::AllowDuplicates,
        )
        .await;

    assert_eq!(plugins.calls(), 0);
    assert!(report.route.is_none());
    assert_eq!(report.outcome.classification(), Classification::Failure);
    // Route failed, both plugin steps recorded as skipped.
    assert_eq!(report.outcome.steps().len(), 3);
    assert_eq!(report.outcome.failed_steps().count(), 3);
}

#[tokio::test]
async fn connect_plugin_failure_is_partial_and_independent() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST)
            .path(format!("/services/{DATA_STORE_ID}/routes"));
        then.status(201).json_body(route_json(ROUTE_ID, DATA_STORE_ID));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path(format!("/routes/{ROUTE_ID}/plugins"))
            .json_body_includes(r#"{"name": "key-auth"}"#);
        then.status(500)
            .json_body(json!({"message": "an unexpected error occurred"}));
    });
    let acl = server.mock(|when, then| {
        when.method(POST)
            .path(format!("/routes/{ROUTE_ID}/plugins"))
            .json_body_includes(r#"{"name": "acl"}"#);
        then.status(201).json_body(json!({ "id": ACL_ID, "name": "acl" }));
    });
    let delete = server.mock(|when, then| {
        when.method(DELETE).path(format!("/routes/{ROUTE_ID}"));
        then.status(204);
    });

    let connector = ProjectConnector::new(client(&server));
    let report = connector
        .connect(
            &connect_request(),
            FailurePolicy::ContinueOnError,
            Idempotency::AllowDuplicates,
        )
        .await;

    // The acl attachment still ran; the route was left in place.
    acl.assert();
    assert_eq!(delete.calls(), 0);
    assert_eq!(report.outcome.classification(), Classification::PartialFailure);
    assert!(report.route.is_some());
    assert!(report.key_auth.is_none());
    assert_eq!(report.acl.expect("acl id").id, ACL_ID);
}

#[tokio::test]
async fn connect_rollback_deletes_the_route() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST)
            .path(format!("/services/{DATA_STORE_ID}/routes"));
        then.status(201).json_body(route_json(ROUTE_ID, DATA_STORE_ID));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path(format!("/routes/{ROUTE_ID}/plugins"))
            .json_body_includes(r#"{"name": "key-auth"}"#);
        then.status(500)
            .json_body(json!({"message": "an unexpected error occurred"}));
    });
    let acl = server.mock(|when, then| {
        when.method(POST)
            .path(format!("/routes/{ROUTE_ID}/plugins"))
            .json_body_includes(r#"{"name": "acl"}"#);
        then.status(201).json_body(json!({ "id": ACL_ID, "name": "acl" }));
    });
    let delete = server.mock(|when, then| {
        when.method(DELETE).path(format!("/routes/{ROUTE_ID}"));
        then.status(204);
    });

    let connector = ProjectConnector::new(client(&server));
    let report = connector
        .connect(
            &connect_request(),
            FailurePolicy::RollbackOnError,
            Idempotency::AllowDuplicates,
        )
        .await;

    delete.assert();
    assert_eq!(acl.calls(), 0);
    assert!(report.route.is_none());
    assert!(report.outcome.rolled_back());
    assert_eq!(report.outcome.classification(), Classification::Failure);
}

#[tokio::test]
async fn connect_reuses_existing_route_when_asked() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/routes").query_param("tags", "proj-42");
        then.status(200)
            .json_body(json!({ "data": [route_json(ROUTE_ID, DATA_STORE_ID)], "next": null }));
    });
    let create = server.mock(|when, then| {
        when.method(POST)
            .path(format!("/services/{DATA_STORE_ID}/routes"));
        then.status(201).json_body(route_json(ROUTE_ID, DATA_STORE_ID));
    });

    let connector = ProjectConnector::new(client(&server));
    let report = connector
        .connect(
            &connect_request(),
            FailurePolicy::ContinueOnError,
            Idempotency::ReuseExisting,
        )
        .await;

    assert_eq!(create.calls(), 0);
    assert!(report.reused);
    assert_eq!(report.route.expect("route").id, ROUTE_ID);
    assert_eq!(report.outcome.classification(), Classification::Success);
}

#[tokio::test]
async fn connect_then_list_returns_the_linked_data_store() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST)
            .path(format!("/services/{DATA_STORE_ID}/routes"));
        then.status(201).json_body(route_json(ROUTE_ID, DATA_STORE_ID));
    });
    server.mock(|when, then| {
        when.method(POST).path(format!("/routes/{ROUTE_ID}/plugins"));
        then.status(201)
            .json_body(json!({ "id": KEY_AUTH_ID, "name": "key-auth" }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/routes").query_param("tags", "proj-42");
        then.status(200)
            .json_body(json!({ "data": [route_json(ROUTE_ID, DATA_STORE_ID)], "next": null }));
    });

    let connector = ProjectConnector::new(client(&server));
    let report = connector
        .connect(
            &connect_request(),
            FailurePolicy::ContinueOnError,
            Idempotency::AllowDuplicates,
        )
        .await;
    assert_eq!(report.outcome.classification(), Classification::Success);

    let linked = connector.list("proj-42").await.unwrap();
    assert_eq!(linked.len(), 1);
    assert_eq!(linked[0].service.id, DATA_STORE_ID);
}

// === Project disconnection ===

#[tokio::test]
async fn disconnect_continues_past_a_failing_deletion() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/routes").query_param("tags", "proj-42");
        then.status(200).json_body(json!({
            "data": [
                route_json(ROUTE_ID, DATA_STORE_ID),
                route_json(OTHER_ROUTE_ID, DATA_STORE_ID),
            ],
            "next": null,
        }));
    });
    server.mock(|when, then| {
        when.method(DELETE).path(format!("/routes/{ROUTE_ID}"));
        then.status(500)
            .json_body(json!({"message": "an unexpected error occurred"}));
    });
    let second = server.mock(|when, then| {
        when.method(DELETE).path(format!("/routes/{OTHER_ROUTE_ID}"));
        then.status(204);
    });

    let connector = ProjectConnector::new(client(&server));
    let report = connector.disconnect("proj-42").await;

    second.assert();
    assert_eq!(report.removed.len(), 1);
    assert_eq!(report.removed[0].id, OTHER_ROUTE_ID);
    assert_eq!(report.outcome.classification(), Classification::PartialFailure);
}

#[tokio::test]
async fn disconnect_removes_all_routes_then_list_is_empty() {
    let server = MockServer::start();
    let mut listing = server.mock(|when, then| {
        when.method(GET).path("/routes").query_param("tags", "proj-42");
        then.status(200).json_body(json!({
            "data": [
                route_json(ROUTE_ID, DATA_STORE_ID),
                route_json(OTHER_ROUTE_ID, DATA_STORE_ID),
            ],
            "next": null,
        }));
    });
    let first = server.mock(|when, then| {
        when.method(DELETE).path(format!("/routes/{ROUTE_ID}"));
        then.status(204);
    });
    let second = server.mock(|when, then| {
        when.method(DELETE).path(format!("/routes/{OTHER_ROUTE_ID}"));
        then.status(204);
    });

    let connector = ProjectConnector::new(client(&server));
    let report = connector.disconnect("proj-42").await;
    first.assert();
    second.assert();
    assert_eq!(report.removed.len(), 2);
    assert_eq!(report.outcome.classification(), Classification::Success);

    // The routes are gone now; the listing reflects that.
    listing.delete();
    server.mock(|when, then| {
        when.method(GET).path("/routes").query_param("tags", "proj-42");
        then.status(200).json_body(json!({ "data": [], "next": null }));
    });
    let remaining = connector.list("proj-42").await.unwrap();
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn disconnect_with_no_routes_is_a_success() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/routes").query_param("tags", "proj-7");
        then.status(200).json_body(json!({ "data": [], "next": null }));
    });

    let connector = ProjectConnector::new(client(&server));
    let report = connector.disconnect("proj-7").await;
    assert!(report.removed.is_empty());
    assert_eq!(report.outcome.classification(), Classification::Success);
}

// === Analysis provisioning ===

fn mock_consumer_chain(server: &MockServer) -> (httpmock::Mock<'_>, httpmock::Mock<'_>, httpmock::Mock<'_>) {
    let consumer = server.mock(|when, then| {
        when.method(POST).path("/consumers").json_body(json!({
            "username": "an-7",
            "custom_id": "an-7",
            "tags": ["proj-42"],
        }));
        then.status(201).json_body(json!({
            "id": CONSUMER_ID,
            "username": "an-7",
            "custom_id": "an-7",
            "tags": ["proj-42"],
        }));
    });
    let membership = server.mock(|when, then| {
        when.method(POST)
            .path(format!("/consumers/{CONSUMER_ID}/acls"))
            .json_body(json!({"group": "proj-42", "tags": ["proj-42"]}));
        then.status(201).json_body(json!({
            "id": ACL_ID,
            "group": "proj-42",
            "tags": ["proj-42"],
        }));
    });
    let credential = server.mock(|when, then| {
        when.method(POST)
            .path(format!("/consumers/{CONSUMER_ID}/key-auths"))
            .json_body(json!({"tags": ["proj-42"]}));
        then.status(201).json_body(json!({
            "id": KEY_AUTH_ID,
            "key": "rIhEJDPYAFhZbLWBEpBwSTJQAXnaMJ98",
            "tags": ["proj-42"],
        }));
    });
    (consumer, membership, credential)
}

#[tokio::test]
async fn analysis_registration_yields_key_and_group() {
    let server = MockServer::start();
    let (consumer, membership, credential) = mock_consumer_chain(&server);

    let provisioner = AnalysisProvisioner::new(client(&server));
    let report = provisioner.register("proj-42", "an-7").await;

    consumer.assert();
    membership.assert();
    credential.assert();
    assert_eq!(report.outcome.classification(), Classification::Success);
    assert_eq!(report.consumer.as_ref().expect("consumer").id, CONSUMER_ID);
    assert_eq!(report.membership.as_ref().expect("membership").group, "proj-42");
    let key = report.api_key().expect("api key");
    assert!(!key.is_empty());
}

#[tokio::test]
async fn analysis_consumer_failure_skips_dependent_steps() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/consumers");
        then.status(409)
            .json_body(json!({"message": "UNIQUE violation detected on '{username=\"an-7\"}'"}));
    });
    let dependents = server.mock(|when, then| {
        when.method(POST).path_includes(format!("/consumers/{CONSUMER_ID}"));
        then.status(201).json_body(json!({}));
    });

    let provisioner = AnalysisProvisioner::new(client(&server));
    let report = provisioner.register("proj-42", "an-7").await;

    assert_eq!(dependents.calls(), 0);
    assert!(report.consumer.is_none());
    assert!(report.api_key().is_none());
    assert_eq!(report.outcome.classification(), Classification::Failure);
    assert_eq!(report.outcome.steps().len(), 3);
}

#[tokio::test]
async fn analysis_membership_failure_still_issues_key() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/consumers");
        then.status(201).json_body(json!({
            "id": CONSUMER_ID,
            "username": "an-7",
            "tags": ["proj-42"],
        }));
    });
    server.mock(|when, then| {
        when.method(POST).path(format!("/consumers/{CONSUMER_ID}/acls"));
        then.status(500)
            .json_body(json!({"message": "an unexpected error occurred"}));
    });
    let credential = server.mock(|when, then| {
        when.method(POST)
            .path(format!("/consumers/{CONSUMER_ID}/key-auths"));
        then.status(201).json_body(json!({
            "id": KEY_AUTH_ID,
            "key": "rIhEJDPYAFhZbLWBEpBwSTJQAXnaMJ98",
            "tags": ["proj-42"],
        }));
    });

    let provisioner = AnalysisProvisioner::new(client(&server));
    let report = provisioner.register("proj-42", "an-7").await;

    credential.assert();
    assert_eq!(report.outcome.classification(), Classification::PartialFailure);
    assert!(report.membership.is_none());
    assert!(report.api_key().is_some());
}
