//! Domain records for the FleetGrid state store.
//!
//! Live records (heartbeats, containers) and durable documents (worker
//! metadata, aliases, namespaces, deployment records). All types are
//! serializable to/from JSON for storage in redb tables; field names are
//! camelCase on the wire.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Free-form annotations attached to a worker.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Container ports, in the order the caller supplied them.
pub type Ports = Vec<u16>;

// ── Cluster identity ──────────────────────────────────────────────

/// Composite key identifying a deployment target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterId {
    pub address: String,
    pub cluster_name: String,
}

impl ClusterId {
    pub fn new(address: impl Into<String>, cluster_name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            cluster_name: cluster_name.into(),
        }
    }

    /// Canonical `{clusterName}@{address}` form, also the default alias.
    pub fn key(&self) -> String {
        format!("{}@{}", self.cluster_name, self.address)
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.cluster_name, self.address)
    }
}

/// Kind of deployment target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Pooled cluster with namespaces and node pools.
    Kubernetes,
    /// Single machine running containers directly.
    Docker,
}

impl Platform {
    pub fn from_is_docker(is_docker: bool) -> Self {
        if is_docker {
            Platform::Docker
        } else {
            Platform::Kubernetes
        }
    }

    pub fn is_docker(self) -> bool {
        self == Platform::Docker
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Kubernetes => "kubernetes",
            Platform::Docker => "docker",
        }
    }
}

// ── Workers ───────────────────────────────────────────────────────

/// Connection parameters a worker reports with each heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerParams {
    pub address: String,
    pub cluster_name: String,
    #[serde(default)]
    pub is_docker: bool,
}

impl WorkerParams {
    pub fn cluster(&self) -> ClusterId {
        ClusterId::new(&self.address, &self.cluster_name)
    }

    pub fn platform(&self) -> Platform {
        Platform::from_is_docker(self.is_docker)
    }
}

/// Live heartbeat record written by the heartbeat producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRecord {
    pub params: WorkerParams,
    /// Unix ms of the last heartbeat. Records without one are never swept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<u64>,
}

/// Durable per-worker document, created the first time a worker is seen live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerMetadata {
    pub cluster: ClusterId,
    pub alias: String,
    pub params: WorkerParams,
    #[serde(default)]
    pub metadata: Metadata,
    pub registered_at: u64,
}

/// Alias index entry: a reference to a worker metadata document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasEntry {
    pub alias: String,
    #[serde(rename = "ref")]
    pub target: ClusterId,
}

/// "This worker is currently known" marker, refreshed by each sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LivenessMarker {
    pub cluster: ClusterId,
    pub updated_at: u64,
}

// ── Tenancy ───────────────────────────────────────────────────────

/// Who owns a namespace or deployment record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum TenantId {
    /// API token holder, identified by token name.
    Token(String),
    /// Registered user, identified by internal user id.
    User(String),
}

impl TenantId {
    /// Storage key, e.g. `tokens/ci-bot` or `users/u-123`.
    pub fn key(&self) -> String {
        match self {
            TenantId::Token(name) => format!("tokens/{name}"),
            TenantId::User(id) => format!("users/{id}"),
        }
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// The namespace a tenant owns on one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceRecord {
    pub tenant: TenantId,
    pub cluster: ClusterId,
    pub namespace_id: String,
    pub created_at: u64,
}

// ── Containers ────────────────────────────────────────────────────

/// What is currently running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerInfo {
    pub image: String,
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_id: Option<String>,
    #[serde(default)]
    pub port: Ports,
    /// Port → public URL; Kubernetes deploys only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<BTreeMap<String, String>>,
}

/// Values the container was created with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerParams {
    pub image_name: String,
    #[serde(default)]
    pub port: Ports,
    /// `image_name` is a full reference and takes no registry prefix.
    #[serde(default)]
    pub exact_image: bool,
}

/// Designated fallback for `rollback`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackSpec {
    pub image: String,
    #[serde(default)]
    pub port: Ports,
}

/// A synchronized replica on a secondary target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncTarget {
    pub address: String,
    pub cluster_name: String,
    pub container_id: String,
}

impl SyncTarget {
    pub fn cluster(&self) -> ClusterId {
        ClusterId::new(&self.address, &self.cluster_name)
    }
}

/// Live record of a deployed container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRecord {
    pub cluster: ClusterId,
    pub container_id: String,
    pub info: ContainerInfo,
    pub params: ContainerParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback: Option<RollbackSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<SyncTarget>>,
    /// Ownership allow-list. `None` means anyone may mutate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<Vec<String>>,
    /// Tenant whose deployment record tracks this container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<TenantId>,
}

impl ContainerRecord {
    /// Whether `caller` may mutate this container.
    pub fn permits(&self, caller: Option<&str>) -> bool {
        match &self.email {
            None => true,
            Some(allowed) => caller.is_some_and(|c| allowed.iter().any(|a| a == c)),
        }
    }

    /// Active sync replicas, if any.
    pub fn sync_targets(&self) -> &[SyncTarget] {
        self.targets.as_deref().unwrap_or_default()
    }
}

/// Per-tenant audit snapshot of a deploy result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub tenant: TenantId,
    pub container_id: String,
    pub cluster: ClusterId,
    pub platform: Platform,
    pub image: String,
    #[serde(default)]
    pub port: Ports,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_id: Option<String>,
    pub created_at: u64,
}

// ── Table keys ────────────────────────────────────────────────────

impl WorkerMetadata {
    pub fn table_key(&self) -> String {
        self.cluster.key()
    }
}

impl LivenessMarker {
    pub fn table_key(&self) -> String {
        self.cluster.key()
    }
}

impl NamespaceRecord {
    /// Build the composite key for the namespaces table.
    pub fn table_key(&self) -> String {
        namespace_key(&self.tenant, &self.cluster)
    }
}

impl ContainerRecord {
    /// Build the composite key for the containers table.
    pub fn table_key(&self) -> String {
        container_key(&self.cluster, &self.container_id)
    }
}

impl DeploymentRecord {
    /// Build the composite key for the deployment records table.
    pub fn table_key(&self) -> String {
        deployment_record_key(&self.tenant, &self.container_id)
    }
}

pub fn namespace_key(tenant: &TenantId, cluster: &ClusterId) -> String {
    format!("{}/{}", cluster.key(), tenant.key())
}

pub fn container_key(cluster: &ClusterId, container_id: &str) -> String {
    format!("{}/{}", cluster.key(), container_id)
}

pub fn deployment_record_key(tenant: &TenantId, container_id: &str) -> String {
    format!("{}/{}", tenant.key(), container_id)
}
