//! API regression tests.
//!
//! Drive the assembled router the way the daemon wires it: one redb store
//! shared by the registry and orchestrator, an in-memory control plane,
//! and keyring authentication.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use fleetgrid_api::{ApiState, KeyringAuthenticator, build_router};
use fleetgrid_control::{ClusterSummary, MemoryClusterControl};
use fleetgrid_orchestrator::{Orchestrator, OrchestratorConfig};
use fleetgrid_registry::WorkerRegistry;
use fleetgrid_state::*;

struct Daemon {
    router: Router,
    store: StateStore,
    control: Arc<MemoryClusterControl>,
    token: String,
}

fn daemon_with(store: StateStore) -> Daemon {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let control = Arc::new(MemoryClusterControl::new(vec![
        ClusterSummary::kubernetes("1.2.3.4", "demo-cluster", &["pool-a"]),
        ClusterSummary::docker("10.0.0.5", "robot-1"),
    ]));
    let config = OrchestratorConfig {
        registry_prefix: "registry.example.com/apps/".to_string(),
        ..Default::default()
    };
    let auth = KeyringAuthenticator::new(
        HashMap::from([("ci".to_string(), "ci-secret".to_string())]),
        HashMap::from([("alice@example.com".to_string(), "u-alice".to_string())]),
    );
    let token = auth.issue("ci").unwrap();
    let state = ApiState {
        registry: Arc::new(WorkerRegistry::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            clock.clone(),
        )),
        orchestrator: Arc::new(Orchestrator::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            control.clone(),
            clock,
            config,
        )),
        auth: Arc::new(auth),
    };
    Daemon {
        router: build_router(state),
        store,
        control,
        token,
    }
}

fn daemon() -> Daemon {
    daemon_with(StateStore::open_in_memory().unwrap())
}

fn on_disk(dir: &Path) -> StateStore {
    StateStore::open(&dir.join("fleetgrid.redb")).unwrap()
}

impl Daemon {
    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header("tokenName", "ci")
            .header("authToken", &self.token)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req).await
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let req = Request::builder()
            .uri(uri)
            .header("tokenName", "ci")
            .header("authToken", &self.token)
            .body(Body::empty())
            .unwrap();
        self.send(req).await
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn deploy_nginx(&self) -> String {
        let (status, body) = self
            .post(
                "/api/v1/cluster/deploy",
                json!({
                    "address": "1.2.3.4",
                    "clusterName": "demo-cluster",
                    "imageName": "nginx",
                    "port": [80],
                    "email": "alice@example.com"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["data"]["containerId"].as_str().unwrap().to_string()
    }
}

fn alice_target(container_id: &str) -> Value {
    json!({
        "address": "1.2.3.4",
        "clusterName": "demo-cluster",
        "containerId": container_id,
        "email": "alice@example.com"
    })
}

fn demo() -> ClusterId {
    ClusterId::new("1.2.3.4", "demo-cluster")
}

#[tokio::test]
async fn deploy_then_rollback_end_to_end() {
    let d = daemon();
    let id = d.deploy_nginx().await;

    let deploys = d.control.deploys().await;
    assert_eq!(deploys.len(), 1);
    assert_eq!(deploys[0].image, "registry.example.com/apps/nginx");

    let (status, body) = d.post("/api/v1/container/rollback", alice_target(&id)).await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(body["status"], "rollback_not_configured");

    let mut set = alice_target(&id);
    set["image"] = json!("nginx-old");
    set["port"] = json!([8080]);
    let (status, _) = d.post("/api/v1/container/rollback/set", set).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = d.post("/api/v1/container/rollback", alice_target(&id)).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let record = d.store.get_container(&demo(), &id).unwrap().unwrap();
    assert_eq!(record.info.image, "nginx-old");
    assert_eq!(record.info.port, vec![8080]);
}

#[tokio::test]
async fn undeploy_clears_records_when_remote_fails() {
    let d = daemon();
    let id = d.deploy_nginx().await;
    d.control.fail_undeploys(true).await;

    let (status, _) = d.post("/api/v1/cluster/undeploy", alice_target(&id)).await;
    assert_eq!(status, StatusCode::OK);

    assert!(d.store.get_container(&demo(), &id).unwrap().is_none());
    let (_, body) = d.get("/api/v1/deployments?email=alice@example.com").await;
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn rejected_deploy_surfaces_message() {
    let d = daemon();
    d.control.reject_deploys(Some("quota exceeded")).await;

    let (status, body) = d
        .post(
            "/api/v1/cluster/deploy",
            json!({
                "address": "1.2.3.4",
                "clusterName": "demo-cluster",
                "imageName": "nginx",
                "port": [80]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "deploy_rejected");
    assert!(body["error"].as_str().unwrap().contains("quota exceeded"));
}

#[tokio::test]
async fn missing_fields_are_rejected_without_side_effects() {
    let d = daemon();
    let (status, body) = d
        .post(
            "/api/v1/cluster/deploy",
            json!({"address": "1.2.3.4", "clusterName": "demo-cluster"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "invalid_parameter");
    assert_eq!(d.control.namespace_calls().await, 0);
    assert!(d.control.deploys().await.is_empty());
}

#[tokio::test]
async fn state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    let id = {
        let d = daemon_with(on_disk(dir.path()));
        d.deploy_nginx().await
    };

    let d = daemon_with(on_disk(dir.path()));
    let (status, body) = d.get("/api/v1/deployments?email=alice@example.com").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["containerId"], id.as_str());

    let record = d.store.get_container(&demo(), &id).unwrap().unwrap();
    assert_eq!(record.email, Some(vec!["alice@example.com".to_string()]));
}

#[tokio::test]
async fn worker_lifecycle_through_api() {
    let d = daemon();
    let (status, _) = d
        .post(
            "/api/v1/workers/heartbeat",
            json!({"id": "w-1", "address": "10.0.0.5", "clusterName": "robot-1", "isDocker": true}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = d.get("/api/v1/workers?refresh=true").await;
    assert_eq!(body["data"][0]["platform"], "docker");

    let (status, _) = d
        .post(
            "/api/v1/workers/metadata",
            json!({"address": "10.0.0.5", "clusterName": "robot-1", "nextAlias": "rover", "type": "robot"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = d.get("/api/v1/workers/aliases").await;
    let aliases: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|w| w["alias"].as_str())
        .collect();
    assert_eq!(aliases, vec!["rover"]);

    // Taking an alias that is already in use conflicts.
    d.post(
        "/api/v1/workers/heartbeat",
        json!({"id": "w-2", "address": "1.2.3.4", "clusterName": "demo-cluster"}),
    )
    .await;
    d.post("/api/v1/workers/sweep", json!({})).await;
    let (status, body) = d
        .post(
            "/api/v1/workers/metadata",
            json!({"currAlias": "demo-cluster@1.2.3.4", "nextAlias": "rover"}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
}
