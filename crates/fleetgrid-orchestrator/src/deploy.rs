//! Deployment orchestrator.
//!
//! A deploy walks a fixed sequence of phases:
//!
//! ```text
//! Validate → AllocateNamespace → SelectPool → InvokeDeploy
//!          → PersistContainer → PersistDeploymentRecord → Done
//! ```
//!
//! Namespace allocation and pool selection are skipped for Docker-style
//! targets. Any phase may fail; nothing on the cluster is mutated before
//! `InvokeDeploy`, and only the deployment record write is best-effort.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use fleetgrid_control::*;
use fleetgrid_state::*;

use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::namespace::NamespaceAllocator;

/// Who is asking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub tenant: TenantId,
    /// Set for email-scoped requests; checked against container allow-lists.
    pub email: Option<String>,
}

impl Caller {
    pub fn token(name: &str) -> Self {
        Self {
            tenant: TenantId::Token(name.to_string()),
            email: None,
        }
    }

    pub fn user(user_id: &str, email: &str) -> Self {
        Self {
            tenant: TenantId::User(user_id.to_string()),
            email: Some(email.to_string()),
        }
    }
}

/// Deploy request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployParams {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub cluster_name: String,
    #[serde(default)]
    pub image_name: String,
    #[serde(default)]
    pub port: Ports,
    /// Preferred node pool; ignored if the cluster has no such pool.
    #[serde(default)]
    pub node_pool: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    /// Values are coerced to strings before they are sent.
    #[serde(default)]
    pub envs: Option<Metadata>,
    /// Use `image_name` as a full reference, without the registry prefix.
    #[serde(default)]
    pub exact_image: bool,
    /// Docker only: host networking, no published ports.
    #[serde(default)]
    pub is_host: bool,
    /// Docker only.
    #[serde(default)]
    pub privileged: bool,
}

impl DeployParams {
    pub fn cluster(&self) -> ClusterId {
        ClusterId::new(&self.address, &self.cluster_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployPhase {
    Validate,
    AllocateNamespace,
    SelectPool,
    InvokeDeploy,
    PersistContainer,
    PersistDeploymentRecord,
    Done,
}

impl fmt::Display for DeployPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeployPhase::Validate => "validate",
            DeployPhase::AllocateNamespace => "allocate_namespace",
            DeployPhase::SelectPool => "select_pool",
            DeployPhase::InvokeDeploy => "invoke_deploy",
            DeployPhase::PersistContainer => "persist_container",
            DeployPhase::PersistDeploymentRecord => "persist_deployment_record",
            DeployPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// What a successful deploy returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployReceipt {
    pub container_id: String,
    pub address: String,
    pub cluster_name: String,
    pub platform: Platform,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_pool: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<BTreeMap<String, String>>,
}

/// One row of a container listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRow {
    pub container_id: String,
    pub image_name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// Tracks the current phase of one deploy for logging.
struct PhaseTracker<'a> {
    cluster: &'a ClusterId,
    phase: DeployPhase,
}

impl<'a> PhaseTracker<'a> {
    fn new(cluster: &'a ClusterId) -> Self {
        Self {
            cluster,
            phase: DeployPhase::Validate,
        }
    }

    fn enter(&mut self, phase: DeployPhase) {
        debug!(cluster = %self.cluster, from = %self.phase, to = %phase, "deploy phase");
        self.phase = phase;
    }

    fn fail(&self, err: OrchestratorError) -> OrchestratorError {
        warn!(cluster = %self.cluster, phase = %self.phase, error = %err, "deploy failed");
        err
    }
}

/// Deploys containers and operates on them afterwards.
pub struct Orchestrator {
    pub(crate) docs: Arc<dyn DocumentStore>,
    pub(crate) live: Arc<dyn LiveStore>,
    pub(crate) control: Arc<dyn ClusterControl>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: OrchestratorConfig,
    pub(crate) namespaces: NamespaceAllocator,
}

impl Orchestrator {
    pub fn new(
        docs: Arc<dyn DocumentStore>,
        live: Arc<dyn LiveStore>,
        control: Arc<dyn ClusterControl>,
        clock: Arc<dyn Clock>,
        config: OrchestratorConfig,
    ) -> Self {
        let namespaces = NamespaceAllocator::new(docs.clone(), control.clone(), clock.clone())
            .with_fixed_namespaces(config.fixed_namespaces.clone());
        Self {
            docs,
            live,
            control,
            clock,
            config,
            namespaces,
        }
    }

    pub fn namespaces(&self) -> &NamespaceAllocator {
        &self.namespaces
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    // ── Deploy ─────────────────────────────────────────────────────

    /// Deploy `params` for `caller` as a `platform` container.
    pub async fn deploy(
        &self,
        caller: &Caller,
        platform: Platform,
        params: &DeployParams,
    ) -> OrchestratorResult<DeployReceipt> {
        let cluster = params.cluster();
        let mut tracker = PhaseTracker::new(&cluster);

        validate(platform, params).map_err(|e| tracker.fail(e))?;

        let (namespace_id, node_pool, outcome) = match platform {
            Platform::Kubernetes => {
                tracker.enter(DeployPhase::AllocateNamespace);
                let namespace_id = self
                    .namespaces
                    .get_or_create(&caller.tenant, &cluster)
                    .await
                    .map_err(|e| tracker.fail(e))?;

                tracker.enter(DeployPhase::SelectPool);
                let pool = self
                    .select_pool(&cluster, params.node_pool.as_deref())
                    .await
                    .map_err(|e| tracker.fail(e))?;

                tracker.enter(DeployPhase::InvokeDeploy);
                let request = DeployRequest {
                    target: TargetRef::from(&cluster),
                    namespace_id: namespace_id.clone(),
                    container_info: ContainerSpec {
                        image_name: self.config.image_ref(&params.image_name, params.exact_image),
                        node_pool_name: pool.clone(),
                        hw_spec: self.config.hardware,
                        port: params.port.clone(),
                        command: params.command.clone().filter(|c| !c.is_empty()),
                        env: coerce_env(params.envs.as_ref()),
                    },
                };
                let outcome = self.control.deploy(&request).await;
                (Some(namespace_id), Some(pool), outcome)
            }
            Platform::Docker => {
                tracker.enter(DeployPhase::InvokeDeploy);
                let request = DockerDeployRequest {
                    target: TargetRef::from(&cluster),
                    image: self.config.image_ref(&params.image_name, params.exact_image),
                    publish_ports: (!params.is_host).then(|| publish_ports(&params.port)),
                    privileged: params.privileged,
                    command: params
                        .command
                        .clone()
                        .filter(|c| !c.is_empty())
                        .map(|c| vec![c]),
                    env: coerce_env(params.envs.as_ref()),
                };
                let outcome = self.control.deploy_docker(&request).await;
                (None, None, outcome)
            }
        };

        let deployed = match outcome.map_err(|e| tracker.fail(e.into()))? {
            DeployOutcome::Deployed(deployed) => deployed,
            DeployOutcome::Rejected(message) => {
                return Err(tracker.fail(OrchestratorError::DeployRejected(message)));
            }
        };
        let endpoint = match platform {
            Platform::Kubernetes => deployed.endpoint.clone(),
            Platform::Docker => None,
        };

        tracker.enter(DeployPhase::PersistContainer);
        let record = ContainerRecord {
            cluster: cluster.clone(),
            container_id: deployed.container_id.clone(),
            info: ContainerInfo {
                image: params.image_name.clone(),
                platform,
                namespace_id: namespace_id.clone(),
                port: params.port.clone(),
                endpoint: endpoint.clone(),
            },
            params: ContainerParams {
                image_name: params.image_name.clone(),
                port: params.port.clone(),
                exact_image: params.exact_image,
            },
            rollback: None,
            targets: None,
            email: caller.email.clone().map(|email| vec![email]),
            owner: Some(caller.tenant.clone()),
        };
        self.live.put_container(&record).map_err(|e| tracker.fail(e.into()))?;

        tracker.enter(DeployPhase::PersistDeploymentRecord);
        let audit = DeploymentRecord {
            tenant: caller.tenant.clone(),
            container_id: deployed.container_id.clone(),
            cluster: cluster.clone(),
            platform,
            image: params.image_name.clone(),
            port: params.port.clone(),
            endpoint: endpoint.clone(),
            namespace_id: namespace_id.clone(),
            created_at: self.clock.now_millis(),
        };
        if let Err(e) = self.docs.put_deployment_record(&audit) {
            warn!(%cluster, container_id = %deployed.container_id, error = %e, "failed to store deployment record");
        }

        tracker.enter(DeployPhase::Done);
        info!(
            %cluster,
            container_id = %deployed.container_id,
            tenant = %caller.tenant,
            platform = platform.as_str(),
            image = %params.image_name,
            "container deployed"
        );

        Ok(DeployReceipt {
            container_id: deployed.container_id,
            address: cluster.address,
            cluster_name: cluster.cluster_name,
            platform,
            namespace_id,
            node_pool,
            endpoint,
        })
    }

    /// The caller's preferred pool if the cluster has it, else the lowest key.
    async fn select_pool(&self, cluster: &ClusterId, preferred: Option<&str>) -> OrchestratorResult<String> {
        let clusters = self.control.list_clusters().await?;
        let summary = clusters
            .iter()
            .find(|c| c.matches(cluster))
            .ok_or_else(|| OrchestratorError::InsufficientResources(format!("cluster {cluster} is not available")))?;

        if let Some(pool) = preferred.filter(|p| summary.node_pool.contains_key(*p)) {
            return Ok(pool.to_string());
        }
        summary
            .node_pool
            .keys()
            .next()
            .cloned()
            .ok_or_else(|| OrchestratorError::InsufficientResources(format!("cluster {cluster} has no node pool")))
    }

    // ── Undeploy ───────────────────────────────────────────────────

    /// Remove a container. Local records are deleted even if the remote
    /// undeploy fails.
    pub async fn undeploy(&self, caller: &Caller, cluster: &ClusterId, container_id: &str) -> OrchestratorResult<()> {
        if cluster.address.is_empty() || cluster.cluster_name.is_empty() || container_id.is_empty() {
            return Err(OrchestratorError::InvalidParameter(
                "address, clusterName and containerId are required".to_string(),
            ));
        }

        let record = self.live.get_container(cluster, container_id)?;
        if let Some(record) = &record {
            if !record.permits(caller.email.as_deref()) {
                return Err(OrchestratorError::PermissionDenied(format!(
                    "container {container_id} belongs to someone else"
                )));
            }
        }

        let platform = match &record {
            Some(record) => record.info.platform,
            None => self.platform_of(cluster).await?,
        };
        let remote = match platform {
            Platform::Kubernetes => {
                let namespace_id = match record.as_ref().and_then(|r| r.info.namespace_id.clone()) {
                    Some(ns) => Some(ns),
                    None => self.namespaces.lookup(&caller.tenant, cluster)?,
                };
                let request = UndeployRequest {
                    target: TargetRef::from(cluster),
                    namespace_id,
                    container_id: container_id.to_string(),
                };
                self.control.undeploy(&request).await
            }
            Platform::Docker => self.control.undeploy_docker(cluster, container_id).await,
        };
        if let Err(e) = remote {
            warn!(%cluster, %container_id, error = %e, "remote undeploy failed, removing records anyway");
        }

        if let Some(record) = &record {
            if !record.sync_targets().is_empty() {
                self.teardown_targets(record.sync_targets()).await;
            }
        }

        if let Err(e) = self.live.delete_container(cluster, container_id) {
            warn!(%cluster, %container_id, error = %e, "failed to delete container record");
        }
        // The deploying tenant's record, which may differ from the caller's.
        let owner = record
            .as_ref()
            .and_then(|r| r.owner.clone())
            .unwrap_or_else(|| caller.tenant.clone());
        if let Err(e) = self.docs.delete_deployment_record(&owner, container_id) {
            warn!(%cluster, %container_id, error = %e, "failed to delete deployment record");
        }
        info!(%cluster, %container_id, tenant = %caller.tenant, %owner, "container undeployed");
        Ok(())
    }

    async fn platform_of(&self, cluster: &ClusterId) -> OrchestratorResult<Platform> {
        self.control
            .list_clusters()
            .await?
            .iter()
            .find(|c| c.matches(cluster))
            .map(ClusterSummary::platform)
            .ok_or_else(|| OrchestratorError::NotFound(format!("cluster {cluster}")))
    }

    // ── Listing ────────────────────────────────────────────────────

    /// Containers on `cluster` that `caller_email` may see, with live status.
    ///
    /// Kubernetes-style containers produce one row per endpoint; containers
    /// the cluster reports no status for are left out.
    pub async fn list_containers(
        &self,
        cluster: &ClusterId,
        caller_email: Option<&str>,
    ) -> OrchestratorResult<Vec<ContainerRow>> {
        let mut rows = Vec::new();
        for record in self.live.list_containers(cluster)? {
            if !record.permits(caller_email) {
                continue;
            }

            let status = match record.info.platform {
                Platform::Kubernetes => {
                    let request = StatusRequest {
                        target: TargetRef::from(cluster),
                        namespace_id: record.info.namespace_id.clone(),
                        container_id: record.container_id.clone(),
                    };
                    self.control.container_status(&request).await
                }
                Platform::Docker => {
                    self.control
                        .container_status_docker(cluster, &record.container_id)
                        .await
                }
            };
            let status = match status {
                Ok(ContainerStatus { status: Some(s) }) => s,
                Ok(_) => continue,
                Err(e) => {
                    warn!(%cluster, container_id = %record.container_id, error = %e, "status lookup failed");
                    continue;
                }
            };

            match (record.info.platform, &record.info.endpoint) {
                (Platform::Kubernetes, Some(endpoints)) => {
                    rows.extend(endpoints.values().map(|url| ContainerRow {
                        container_id: record.container_id.clone(),
                        image_name: record.info.image.clone(),
                        status: status.clone(),
                        endpoint: Some(url.clone()),
                    }));
                }
                (Platform::Kubernetes, None) => {}
                (Platform::Docker, _) => rows.push(ContainerRow {
                    container_id: record.container_id.clone(),
                    image_name: record.info.image.clone(),
                    status,
                    endpoint: None,
                }),
            }
        }
        Ok(rows)
    }

    /// The tenant's deployment records.
    pub fn list_deployments(&self, tenant: &TenantId) -> OrchestratorResult<Vec<DeploymentRecord>> {
        Ok(self.docs.list_deployment_records(tenant)?)
    }

    /// Load a container and check the caller may mutate it.
    pub(crate) fn owned_container(
        &self,
        caller: &Caller,
        cluster: &ClusterId,
        container_id: &str,
    ) -> OrchestratorResult<ContainerRecord> {
        let record = self
            .live
            .get_container(cluster, container_id)?
            .ok_or_else(|| OrchestratorError::NotFound(format!("container {container_id} on {cluster}")))?;
        if !record.permits(caller.email.as_deref()) {
            return Err(OrchestratorError::PermissionDenied(format!(
                "container {container_id} belongs to someone else"
            )));
        }
        Ok(record)
    }
}

fn validate(platform: Platform, params: &DeployParams) -> OrchestratorResult<()> {
    let mut missing = Vec::new();
    if params.address.is_empty() {
        missing.push("address");
    }
    if params.cluster_name.is_empty() {
        missing.push("clusterName");
    }
    if params.image_name.is_empty() {
        missing.push("imageName");
    }
    let ports_optional = platform.is_docker() && params.is_host;
    if params.port.is_empty() && !ports_optional {
        missing.push("port");
    }
    if !missing.is_empty() {
        return Err(OrchestratorError::InvalidParameter(format!(
            "missing {}",
            missing.join(", ")
        )));
    }
    check_image_ref(&params.image_name)
}

/// Image references reach admin commands verbatim, so only the characters a
/// registry reference can hold are accepted.
pub(crate) fn check_image_ref(image: &str) -> OrchestratorResult<()> {
    if image.is_empty() {
        return Err(OrchestratorError::InvalidParameter("image is required".to_string()));
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | ':' | '@' | '-');
    if let Some(bad) = image.chars().find(|c| !allowed(*c)) {
        return Err(OrchestratorError::InvalidParameter(format!(
            "image {image:?} contains invalid character {bad:?}"
        )));
    }
    Ok(())
}

/// Stringify env values; an empty map is sent as no env at all.
fn coerce_env(envs: Option<&Metadata>) -> Option<BTreeMap<String, String>> {
    let envs = envs.filter(|e| !e.is_empty())?;
    Some(
        envs.iter()
            .map(|(k, v)| {
                let value = match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect(),
    )
}

pub(crate) fn publish_ports(ports: &[u16]) -> BTreeMap<String, String> {
    ports.iter().map(|p| (p.to_string(), p.to_string())).collect()
}
