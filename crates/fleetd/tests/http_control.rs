//! Deploy through the real HTTP control client against a fake control API.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tower::ServiceExt;

use fleetgrid_api::{ApiState, KeyringAuthenticator, build_router};
use fleetgrid_control::*;
use fleetgrid_orchestrator::{Orchestrator, OrchestratorConfig};
use fleetgrid_registry::WorkerRegistry;
use fleetgrid_state::*;

async fn fake_control(namespace_calls: Arc<AtomicUsize>) -> String {
    let router = Router::new()
        .route(
            "/clusters",
            get(|| async {
                Json(Envelope::ok(vec![ClusterSummary::kubernetes(
                    "1.2.3.4",
                    "demo-cluster",
                    &["pool-a"],
                )]))
            }),
        )
        .route(
            "/namespaces",
            post(move |Json(_): Json<TargetRef>| {
                let calls = namespace_calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Json(Envelope::ok(NamespaceCreated {
                        namespace_id: Some("ns-remote".to_string()),
                    }))
                }
            }),
        )
        .route(
            "/deploy",
            post(|Json(req): Json<DeployRequest>| async move {
                let port = req.container_info.port.first().copied().unwrap_or_default();
                Json(Envelope::ok(Deployed {
                    container_id: format!("web-{}", req.namespace_id),
                    endpoint: Some(BTreeMap::from([(
                        port.to_string(),
                        format!("https://web-{port}.{}", req.target.target_address),
                    )])),
                }))
            }),
        )
        .route(
            "/status",
            post(|| async {
                Json(Envelope::ok(ContainerStatus {
                    status: Some("running".to_string()),
                }))
            }),
        )
        .route("/undeploy", post(|| async { Json(Envelope::ok(json!({}))) }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn call(router: &Router, token: &str, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder()
        .method(method)
        .uri(uri)
        .header("tokenName", "ci")
        .header("authToken", token);
    let body = match body {
        Some(json) => {
            req = req.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let resp = router.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn deploy_and_list_over_http_control() {
    let namespace_calls = Arc::new(AtomicUsize::new(0));
    let base_url = fake_control(namespace_calls.clone()).await;

    let store = StateStore::open_in_memory().unwrap();
    let clock = Arc::new(SystemClock);
    let control = Arc::new(HttpClusterControl::new(&base_url, Duration::from_secs(5)).unwrap());
    let auth = KeyringAuthenticator::new(
        HashMap::from([("ci".to_string(), "ci-secret".to_string())]),
        HashMap::new(),
    );
    let token = auth.issue("ci").unwrap();
    let router = build_router(ApiState {
        registry: Arc::new(WorkerRegistry::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            clock.clone(),
        )),
        orchestrator: Arc::new(Orchestrator::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            control,
            clock,
            OrchestratorConfig::default(),
        )),
        auth: Arc::new(auth),
    });

    let deploy = json!({
        "address": "1.2.3.4",
        "clusterName": "demo-cluster",
        "imageName": "nginx",
        "port": [80]
    });
    let (status, body) = call(&router, &token, "POST", "/api/v1/cluster/deploy", Some(deploy.clone())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["containerId"], "web-ns-remote");
    assert_eq!(body["data"]["namespaceId"], "ns-remote");
    assert_eq!(body["data"]["nodePool"], "pool-a");

    // The namespace is memoized for the tenant.
    let (status, _) = call(&router, &token, "POST", "/api/v1/cluster/deploy", Some(deploy)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(namespace_calls.load(Ordering::SeqCst), 1);

    let (status, body) = call(
        &router,
        &token,
        "GET",
        "/api/v1/containers?address=1.2.3.4&clusterName=demo-cluster",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["status"], "running");
    assert_eq!(body["data"][0]["endpoint"], "https://web-80.1.2.3.4");
}

#[tokio::test]
async fn unreachable_control_fails_namespace_creation() {
    let store = StateStore::open_in_memory().unwrap();
    let clock = Arc::new(SystemClock);
    let control = Arc::new(HttpClusterControl::new("http://127.0.0.1:1", Duration::from_millis(500)).unwrap());
    let auth = KeyringAuthenticator::new(
        HashMap::from([("ci".to_string(), "ci-secret".to_string())]),
        HashMap::new(),
    );
    let token = auth.issue("ci").unwrap();
    let router = build_router(ApiState {
        registry: Arc::new(WorkerRegistry::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            clock.clone(),
        )),
        orchestrator: Arc::new(Orchestrator::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            control,
            clock,
            OrchestratorConfig::default(),
        )),
        auth: Arc::new(auth),
    });

    let (status, body) = call(
        &router,
        &token,
        "POST",
        "/api/v1/cluster/deploy",
        Some(json!({
            "address": "1.2.3.4",
            "clusterName": "demo-cluster",
            "imageName": "nginx",
            "port": [80]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "namespace_creation_failed");
}
