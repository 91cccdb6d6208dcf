//! REST API handlers for workers and deploys.
//!
//! Each handler authenticates, delegates to the registry or orchestrator,
//! and returns a JSON envelope. Failures map to HTTP through `ApiError`.

use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use tracing::info;

use fleetgrid_orchestrator::{ContainerRow, DeployParams, DeployReceipt};
use fleetgrid_registry::{SweepOutcome, SweepReport, WorkerSelector, WorkerView};
use fleetgrid_state::*;

use crate::ApiState;
use crate::error::{ApiError, ApiResponse, ApiResult};
use crate::extract::{Authenticated, JsonBody, QueryParams};

/// Optional email scoping carried in a query string.
#[derive(Debug, Default, Deserialize)]
pub struct EmailQuery {
    pub email: Option<String>,
}

// ── Workers ────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListWorkersQuery {
    #[serde(default)]
    pub refresh: bool,
}

/// GET /api/v1/workers
pub async fn list_workers(
    State(state): State<ApiState>,
    _auth: Authenticated,
    QueryParams(query): QueryParams<ListWorkersQuery>,
) -> ApiResult<Vec<WorkerView>> {
    Ok(ApiResponse::ok(state.registry.list(query.refresh)?))
}

/// GET /api/v1/workers/aliases
pub async fn list_workers_by_alias(
    State(state): State<ApiState>,
    _auth: Authenticated,
) -> ApiResult<Vec<WorkerView>> {
    Ok(ApiResponse::ok(state.registry.list_by_alias()?))
}

/// GET /api/v1/workers/alias/{alias}
pub async fn get_worker(
    State(state): State<ApiState>,
    _auth: Authenticated,
    Path(alias): Path<String>,
) -> ApiResult<WorkerView> {
    Ok(ApiResponse::ok(state.registry.get_by_alias(&alias)?))
}

/// Metadata edit body. Everything besides the addressing fields is the
/// new metadata.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetMetadataRequest {
    pub curr_alias: Option<String>,
    pub next_alias: Option<String>,
    pub address: Option<String>,
    pub cluster_name: Option<String>,
    #[serde(flatten)]
    pub metadata: Metadata,
}

impl SetMetadataRequest {
    fn selector(&self) -> Result<WorkerSelector, ApiError> {
        if let Some(alias) = self.curr_alias.as_deref().filter(|a| !a.is_empty()) {
            return Ok(WorkerSelector::Alias(alias.to_string()));
        }
        match (&self.address, &self.cluster_name) {
            (Some(address), Some(name)) if !address.is_empty() && !name.is_empty() => {
                Ok(WorkerSelector::Cluster(ClusterId::new(address, name)))
            }
            _ => Err(ApiError::invalid("currAlias or address and clusterName are required")),
        }
    }
}

/// POST /api/v1/workers/metadata
pub async fn set_worker_metadata(
    State(state): State<ApiState>,
    _auth: Authenticated,
    JsonBody(req): JsonBody<SetMetadataRequest>,
) -> ApiResult<&'static str> {
    let selector = req.selector()?;
    let next_alias = req.next_alias.as_deref().filter(|a| !a.is_empty());
    state.registry.set_metadata(&selector, req.metadata, next_alias)?;
    Ok(ApiResponse::ok("updated"))
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    pub id: String,
    #[serde(flatten)]
    pub params: WorkerParams,
}

/// POST /api/v1/workers/heartbeat
pub async fn heartbeat(
    State(state): State<ApiState>,
    _auth: Authenticated,
    JsonBody(req): JsonBody<HeartbeatRequest>,
) -> ApiResult<&'static str> {
    if req.id.is_empty() || req.params.address.is_empty() || req.params.cluster_name.is_empty() {
        return Err(ApiError::invalid("id, address and clusterName are required"));
    }
    state.registry.heartbeat(&req.id, req.params)?;
    Ok(ApiResponse::ok("recorded"))
}

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<SweepReport>,
}

/// POST /api/v1/workers/sweep
pub async fn sweep(State(state): State<ApiState>, _auth: Authenticated) -> ApiResult<SweepResponse> {
    let response = match state.registry.sweep()? {
        SweepOutcome::Completed(report) => SweepResponse {
            skipped: false,
            report: Some(report),
        },
        SweepOutcome::Skipped => SweepResponse {
            skipped: true,
            report: None,
        },
    };
    Ok(ApiResponse::ok(response))
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub removed: usize,
}

/// POST /api/v1/workers/namespaces/purge
pub async fn purge_namespaces(
    State(state): State<ApiState>,
    auth: Authenticated,
    JsonBody(cluster): JsonBody<ClusterId>,
) -> ApiResult<PurgeResponse> {
    require_cluster(&cluster)?;
    let removed = state.orchestrator.namespaces().purge_cluster(&cluster)?;
    info!(%cluster, removed, token = %auth.token_name, "namespaces purged via API");
    Ok(ApiResponse::ok(PurgeResponse { removed }))
}

// ── Deploys ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DeployRequest {
    pub email: Option<String>,
    #[serde(flatten)]
    pub params: DeployParams,
}

/// Names one container on one cluster.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRef {
    pub address: String,
    pub cluster_name: String,
    pub container_id: String,
    pub email: Option<String>,
}

impl ContainerRef {
    pub fn cluster(&self) -> ClusterId {
        ClusterId::new(&self.address, &self.cluster_name)
    }

    pub(crate) fn validate(&self) -> Result<ClusterId, ApiError> {
        let cluster = self.cluster();
        require_cluster(&cluster)?;
        if self.container_id.is_empty() {
            return Err(ApiError::invalid("containerId is required"));
        }
        Ok(cluster)
    }
}

async fn deploy(
    state: ApiState,
    auth: Authenticated,
    platform: Platform,
    req: DeployRequest,
) -> ApiResult<DeployReceipt> {
    let caller = auth.caller(&state, req.email.as_deref()).await?;
    let receipt = state.orchestrator.deploy(&caller, platform, &req.params).await?;
    Ok(ApiResponse::ok(receipt))
}

async fn undeploy(state: ApiState, auth: Authenticated, target: ContainerRef) -> ApiResult<&'static str> {
    let cluster = target.validate()?;
    let caller = auth.caller(&state, target.email.as_deref()).await?;
    state
        .orchestrator
        .undeploy(&caller, &cluster, &target.container_id)
        .await?;
    Ok(ApiResponse::ok("undeployed"))
}

/// POST /api/v1/cluster/deploy
pub async fn deploy_cluster(
    State(state): State<ApiState>,
    auth: Authenticated,
    JsonBody(req): JsonBody<DeployRequest>,
) -> ApiResult<DeployReceipt> {
    deploy(state, auth, Platform::Kubernetes, req).await
}

/// POST /api/v1/machine/deploy
pub async fn deploy_machine(
    State(state): State<ApiState>,
    auth: Authenticated,
    JsonBody(req): JsonBody<DeployRequest>,
) -> ApiResult<DeployReceipt> {
    deploy(state, auth, Platform::Docker, req).await
}

/// POST /api/v1/cluster/undeploy
pub async fn undeploy_cluster(
    State(state): State<ApiState>,
    auth: Authenticated,
    JsonBody(target): JsonBody<ContainerRef>,
) -> ApiResult<&'static str> {
    undeploy(state, auth, target).await
}

/// POST /api/v1/machine/undeploy
pub async fn undeploy_machine(
    State(state): State<ApiState>,
    auth: Authenticated,
    JsonBody(target): JsonBody<ContainerRef>,
) -> ApiResult<&'static str> {
    undeploy(state, auth, target).await
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainersQuery {
    pub address: String,
    pub cluster_name: String,
    pub email: Option<String>,
}

/// GET /api/v1/containers
pub async fn list_containers(
    State(state): State<ApiState>,
    _auth: Authenticated,
    QueryParams(query): QueryParams<ContainersQuery>,
) -> ApiResult<Vec<ContainerRow>> {
    let cluster = ClusterId::new(&query.address, &query.cluster_name);
    require_cluster(&cluster)?;
    let email = query.email.as_deref().filter(|e| !e.is_empty());
    Ok(ApiResponse::ok(
        state.orchestrator.list_containers(&cluster, email).await?,
    ))
}

/// GET /api/v1/deployments
pub async fn list_deployments(
    State(state): State<ApiState>,
    auth: Authenticated,
    QueryParams(query): QueryParams<EmailQuery>,
) -> ApiResult<Vec<DeploymentRecord>> {
    let caller = auth.caller(&state, query.email.as_deref()).await?;
    Ok(ApiResponse::ok(
        state.orchestrator.list_deployments(&caller.tenant)?,
    ))
}

pub(crate) fn require_cluster(cluster: &ClusterId) -> Result<(), ApiError> {
    if cluster.address.is_empty() || cluster.cluster_name.is_empty() {
        return Err(ApiError::invalid("address and clusterName are required"));
    }
    Ok(())
}
