//! Container operation handlers: sync replicas, rollback, update, autoscaler.

use axum::extract::State;
use serde::Deserialize;

use fleetgrid_orchestrator::SyncTargetRequest;
use fleetgrid_state::{ContainerRecord, Ports, SyncTarget};

use crate::ApiState;
use crate::error::{ApiResponse, ApiResult};
use crate::extract::{Authenticated, JsonBody};
use crate::handlers::ContainerRef;

#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    #[serde(flatten)]
    pub target: ContainerRef,
    #[serde(default)]
    pub targets: Vec<SyncTargetRequest>,
}

/// POST /api/v1/container/sync
pub async fn set_sync(
    State(state): State<ApiState>,
    auth: Authenticated,
    JsonBody(req): JsonBody<SyncRequest>,
) -> ApiResult<Vec<SyncTarget>> {
    let cluster = req.target.validate()?;
    let caller = auth.caller(&state, req.target.email.as_deref()).await?;
    let targets = state
        .orchestrator
        .set_sync(&caller, &cluster, &req.target.container_id, &req.targets)
        .await?;
    Ok(ApiResponse::ok(targets))
}

#[derive(Debug, Deserialize)]
pub struct SetRollbackRequest {
    #[serde(flatten)]
    pub target: ContainerRef,
    pub image: String,
    #[serde(default)]
    pub port: Ports,
}

/// POST /api/v1/container/rollback/set
pub async fn set_rollback(
    State(state): State<ApiState>,
    auth: Authenticated,
    JsonBody(req): JsonBody<SetRollbackRequest>,
) -> ApiResult<&'static str> {
    let cluster = req.target.validate()?;
    let caller = auth.caller(&state, req.target.email.as_deref()).await?;
    state
        .orchestrator
        .set_rollback(&caller, &cluster, &req.target.container_id, &req.image, req.port)?;
    Ok(ApiResponse::ok("rollback configured"))
}

/// POST /api/v1/container/rollback
pub async fn rollback(
    State(state): State<ApiState>,
    auth: Authenticated,
    JsonBody(target): JsonBody<ContainerRef>,
) -> ApiResult<ContainerRecord> {
    let cluster = target.validate()?;
    let caller = auth.caller(&state, target.email.as_deref()).await?;
    let record = state
        .orchestrator
        .rollback(&caller, &cluster, &target.container_id)
        .await?;
    Ok(ApiResponse::ok(record))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    #[serde(flatten)]
    pub target: ContainerRef,
    pub image: String,
    pub port: Option<Ports>,
}

/// POST /api/v1/container/update
pub async fn update(
    State(state): State<ApiState>,
    auth: Authenticated,
    JsonBody(req): JsonBody<UpdateRequest>,
) -> ApiResult<ContainerRecord> {
    let cluster = req.target.validate()?;
    let caller = auth.caller(&state, req.target.email.as_deref()).await?;
    let record = state
        .orchestrator
        .update_deploy(&caller, &cluster, &req.target.container_id, &req.image, req.port)
        .await?;
    Ok(ApiResponse::ok(record))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoscalerRequest {
    #[serde(flatten)]
    pub target: ContainerRef,
    pub cpu_percent: u32,
    pub min: u32,
    pub max: u32,
}

/// POST /api/v1/container/autoscaler
pub async fn set_autoscaler(
    State(state): State<ApiState>,
    auth: Authenticated,
    JsonBody(req): JsonBody<AutoscalerRequest>,
) -> ApiResult<&'static str> {
    let cluster = req.target.validate()?;
    let caller = auth.caller(&state, req.target.email.as_deref()).await?;
    state
        .orchestrator
        .set_autoscaler(
            &caller,
            &cluster,
            &req.target.container_id,
            req.cpu_percent,
            req.min,
            req.max,
        )
        .await?;
    Ok(ApiResponse::ok("autoscaler attached"))
}

/// DELETE /api/v1/container/autoscaler
pub async fn delete_autoscaler(
    State(state): State<ApiState>,
    auth: Authenticated,
    JsonBody(target): JsonBody<ContainerRef>,
) -> ApiResult<&'static str> {
    let cluster = target.validate()?;
    let caller = auth.caller(&state, target.email.as_deref()).await?;
    state
        .orchestrator
        .delete_autoscaler(&caller, &cluster, &target.container_id)
        .await?;
    Ok(ApiResponse::ok("autoscaler removed"))
}
