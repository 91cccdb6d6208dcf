//! The `ClusterControl` trait.

use async_trait::async_trait;
use fleetgrid_state::ClusterId;

use crate::error::ControlResult;
use crate::types::*;

/// Remote operations against the fleet's clusters.
///
/// Calls are not retried here and are not cancellable; the implementation
/// owns its request timeout.
#[async_trait]
pub trait ClusterControl: Send + Sync {
    /// Every cluster the control service currently knows about.
    async fn list_clusters(&self) -> ControlResult<Vec<ClusterSummary>>;

    /// Ask the cluster for a fresh namespace. `namespace_id` is `None` when
    /// the remote answered without one.
    async fn create_namespace(&self, cluster: &ClusterId) -> ControlResult<NamespaceCreated>;

    async fn deploy(&self, req: &DeployRequest) -> ControlResult<DeployOutcome>;

    async fn deploy_docker(&self, req: &DockerDeployRequest) -> ControlResult<DeployOutcome>;

    async fn undeploy(&self, req: &UndeployRequest) -> ControlResult<()>;

    async fn undeploy_docker(&self, cluster: &ClusterId, container_id: &str) -> ControlResult<()>;

    /// Run an admin command on the cluster and return its console output.
    async fn run_command(&self, cluster: &ClusterId, command: &str) -> ControlResult<CommandOutput>;

    async fn container_status(&self, req: &StatusRequest) -> ControlResult<ContainerStatus>;

    async fn container_status_docker(
        &self,
        cluster: &ClusterId,
        container_id: &str,
    ) -> ControlResult<ContainerStatus>;
}
