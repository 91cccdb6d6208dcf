//! In-process `ClusterControl` for tests and local runs.
//!
//! Keeps a fixed cluster list, hands out sequential container ids, and
//! records every mutating call so callers can assert on what was sent.
//! Failure switches let tests drive each error path.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use fleetgrid_state::ClusterId;
use tokio::sync::Mutex;
use tracing::debug;

use crate::client::ClusterControl;
use crate::error::{ControlError, ControlResult};
use crate::types::*;

/// A deploy the fake accepted or refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedDeploy {
    pub cluster: ClusterId,
    pub image: String,
    pub docker: bool,
    pub accepted: bool,
}

#[derive(Default)]
struct Inner {
    clusters: Vec<ClusterSummary>,
    next_id: u64,
    namespace_calls: usize,
    namespace_delay: Option<Duration>,
    fail_namespace: bool,
    deploy_rejection: Option<String>,
    rejecting_clusters: HashSet<ClusterId>,
    fail_undeploy: bool,
    silent_commands: bool,
    running: HashMap<(ClusterId, String), String>,
    deploys: Vec<RecordedDeploy>,
    undeploys: Vec<(ClusterId, String)>,
    commands: Vec<(ClusterId, String)>,
}

/// In-memory Cluster Control API.
#[derive(Default)]
pub struct MemoryClusterControl {
    inner: Mutex<Inner>,
}

impl MemoryClusterControl {
    pub fn new(clusters: Vec<ClusterSummary>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                clusters,
                ..Default::default()
            }),
        }
    }

    // ── Failure switches ───────────────────────────────────────────

    /// Make `create_namespace` fail with a transport error.
    pub async fn fail_namespace_creation(&self, fail: bool) {
        self.inner.lock().await.fail_namespace = fail;
    }

    /// Hold every `create_namespace` call for `delay` before answering.
    pub async fn delay_namespace_creation(&self, delay: Duration) {
        self.inner.lock().await.namespace_delay = Some(delay);
    }

    /// Answer every deploy with `errMessage`.
    pub async fn reject_deploys(&self, message: Option<&str>) {
        self.inner.lock().await.deploy_rejection = message.map(str::to_string);
    }

    /// Answer deploys to one cluster with an `errMessage`.
    pub async fn reject_deploys_on(&self, cluster: ClusterId) {
        self.inner.lock().await.rejecting_clusters.insert(cluster);
    }

    pub async fn fail_undeploys(&self, fail: bool) {
        self.inner.lock().await.fail_undeploy = fail;
    }

    /// Make admin commands print nothing.
    pub async fn silence_commands(&self, silent: bool) {
        self.inner.lock().await.silent_commands = silent;
    }

    // ── Inspection ─────────────────────────────────────────────────

    pub async fn namespace_calls(&self) -> usize {
        self.inner.lock().await.namespace_calls
    }

    pub async fn deploys(&self) -> Vec<RecordedDeploy> {
        self.inner.lock().await.deploys.clone()
    }

    pub async fn undeploys(&self) -> Vec<(ClusterId, String)> {
        self.inner.lock().await.undeploys.clone()
    }

    pub async fn commands(&self) -> Vec<(ClusterId, String)> {
        self.inner.lock().await.commands.clone()
    }

    pub async fn is_running(&self, cluster: &ClusterId, container_id: &str) -> bool {
        self.inner
            .lock()
            .await
            .running
            .contains_key(&(cluster.clone(), container_id.to_string()))
    }

    fn place(
        inner: &mut Inner,
        cluster: ClusterId,
        image: &str,
        docker: bool,
        ports: &[u16],
    ) -> DeployOutcome {
        let known = inner.clusters.iter().any(|c| c.matches(&cluster));
        let rejection = if !known {
            Some(format!("cluster {cluster} not found"))
        } else if inner.rejecting_clusters.contains(&cluster) {
            Some(format!("cluster {cluster} refused the deploy"))
        } else {
            inner.deploy_rejection.clone()
        };

        inner.deploys.push(RecordedDeploy {
            cluster: cluster.clone(),
            image: image.to_string(),
            docker,
            accepted: rejection.is_none(),
        });
        if let Some(message) = rejection {
            return DeployOutcome::Rejected(message);
        }

        inner.next_id += 1;
        let container_id = format!("c-{}", inner.next_id);
        let endpoint = (!docker).then(|| {
            ports
                .iter()
                .map(|p| {
                    (
                        p.to_string(),
                        format!("http://{container_id}-{p}.{}", cluster.address),
                    )
                })
                .collect::<BTreeMap<_, _>>()
        });
        inner
            .running
            .insert((cluster.clone(), container_id.clone()), "running".to_string());
        debug!(%cluster, %container_id, %image, "fake deploy accepted");

        DeployOutcome::Deployed(Deployed {
            container_id,
            endpoint,
        })
    }
}

#[async_trait]
impl ClusterControl for MemoryClusterControl {
    async fn list_clusters(&self) -> ControlResult<Vec<ClusterSummary>> {
        Ok(self.inner.lock().await.clusters.clone())
    }

    async fn create_namespace(&self, cluster: &ClusterId) -> ControlResult<NamespaceCreated> {
        let delay = {
            let mut inner = self.inner.lock().await;
            inner.namespace_calls += 1;
            inner.namespace_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.lock().await;
        if inner.fail_namespace {
            return Err(ControlError::Transport("namespace service unavailable".to_string()));
        }
        inner.next_id += 1;
        Ok(NamespaceCreated {
            namespace_id: Some(format!("ns-{}-{}", cluster.cluster_name, inner.next_id)),
        })
    }

    async fn deploy(&self, req: &DeployRequest) -> ControlResult<DeployOutcome> {
        let mut inner = self.inner.lock().await;
        Ok(Self::place(
            &mut inner,
            req.target.identity(),
            &req.container_info.image_name,
            false,
            &req.container_info.port,
        ))
    }

    async fn deploy_docker(&self, req: &DockerDeployRequest) -> ControlResult<DeployOutcome> {
        let mut inner = self.inner.lock().await;
        Ok(Self::place(&mut inner, req.target.identity(), &req.image, true, &[]))
    }

    async fn undeploy(&self, req: &UndeployRequest) -> ControlResult<()> {
        let mut inner = self.inner.lock().await;
        let cluster = req.target.identity();
        inner.undeploys.push((cluster.clone(), req.container_id.clone()));
        if inner.fail_undeploy {
            return Err(ControlError::Rejected("undeploy failed".to_string()));
        }
        inner.running.remove(&(cluster, req.container_id.clone()));
        Ok(())
    }

    async fn undeploy_docker(&self, cluster: &ClusterId, container_id: &str) -> ControlResult<()> {
        let mut inner = self.inner.lock().await;
        inner.undeploys.push((cluster.clone(), container_id.to_string()));
        if inner.fail_undeploy {
            return Err(ControlError::Rejected("undeploy failed".to_string()));
        }
        inner.running.remove(&(cluster.clone(), container_id.to_string()));
        Ok(())
    }

    async fn run_command(&self, cluster: &ClusterId, command: &str) -> ControlResult<CommandOutput> {
        let mut inner = self.inner.lock().await;
        inner.commands.push((cluster.clone(), command.to_string()));
        let stdout = if inner.silent_commands {
            String::new()
        } else {
            format!("{command}: ok\n")
        };
        Ok(CommandOutput { stdout })
    }

    async fn container_status(&self, req: &StatusRequest) -> ControlResult<ContainerStatus> {
        let inner = self.inner.lock().await;
        let status = inner
            .running
            .get(&(req.target.identity(), req.container_id.clone()))
            .cloned();
        Ok(ContainerStatus { status })
    }

    async fn container_status_docker(
        &self,
        cluster: &ClusterId,
        container_id: &str,
    ) -> ControlResult<ContainerStatus> {
        let inner = self.inner.lock().await;
        let status = inner
            .running
            .get(&(cluster.clone(), container_id.to_string()))
            .cloned();
        Ok(ContainerStatus { status })
    }
}
