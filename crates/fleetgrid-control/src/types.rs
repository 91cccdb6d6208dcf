//! Wire types for the Cluster Control API.
//!
//! Field names are camelCase on the wire to match the control service.

use std::collections::BTreeMap;

use fleetgrid_state::{ClusterId, Platform};
use serde::{Deserialize, Serialize};

// ── Clusters ──────────────────────────────────────────────────────

/// One entry of the remote cluster list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    pub address: String,
    pub cluster_name: String,
    #[serde(default)]
    pub is_docker: bool,
    /// Pool name → pool metadata. Empty for Docker-style hosts.
    #[serde(default)]
    pub node_pool: BTreeMap<String, serde_json::Value>,
}

impl ClusterSummary {
    /// A Kubernetes-style cluster with the named pools.
    pub fn kubernetes(address: &str, cluster_name: &str, pools: &[&str]) -> Self {
        Self {
            address: address.to_string(),
            cluster_name: cluster_name.to_string(),
            is_docker: false,
            node_pool: pools
                .iter()
                .map(|p| (p.to_string(), serde_json::Value::Object(Default::default())))
                .collect(),
        }
    }

    /// A single Docker-style host.
    pub fn docker(address: &str, cluster_name: &str) -> Self {
        Self {
            address: address.to_string(),
            cluster_name: cluster_name.to_string(),
            is_docker: true,
            node_pool: BTreeMap::new(),
        }
    }

    pub fn identity(&self) -> ClusterId {
        ClusterId::new(&self.address, &self.cluster_name)
    }

    pub fn platform(&self) -> Platform {
        Platform::from_is_docker(self.is_docker)
    }

    pub fn matches(&self, cluster: &ClusterId) -> bool {
        self.address == cluster.address && self.cluster_name == cluster.cluster_name
    }
}

/// Address of a cluster in request bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetRef {
    pub target_address: String,
    pub cluster_name: String,
}

impl From<&ClusterId> for TargetRef {
    fn from(id: &ClusterId) -> Self {
        Self {
            target_address: id.address.clone(),
            cluster_name: id.cluster_name.clone(),
        }
    }
}

impl TargetRef {
    pub fn identity(&self) -> ClusterId {
        ClusterId::new(&self.target_address, &self.cluster_name)
    }
}

// ── Namespaces ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceCreated {
    #[serde(default)]
    pub namespace_id: Option<String>,
}

// ── Deploy ────────────────────────────────────────────────────────

/// Resource shape requested for a Kubernetes-style container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareSpec {
    /// Millicores.
    pub cpu: u32,
    /// MiB.
    pub memory: u32,
    pub gpu: u32,
}

impl Default for HardwareSpec {
    fn default() -> Self {
        Self {
            cpu: 500,
            memory: 512,
            gpu: 0,
        }
    }
}

/// Container descriptor for a Kubernetes-style deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSpec {
    pub image_name: String,
    pub node_pool_name: String,
    pub hw_spec: HardwareSpec,
    pub port: Vec<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest {
    #[serde(flatten)]
    pub target: TargetRef,
    pub namespace_id: String,
    pub container_info: ContainerSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerDeployRequest {
    #[serde(flatten)]
    pub target: TargetRef,
    pub image: String,
    /// Container port → host port. `None` for host networking.
    #[serde(default)]
    pub publish_ports: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub privileged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
}

/// Successful deploy result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployed {
    pub container_id: String,
    /// Port → public URL. Kubernetes-style only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<BTreeMap<String, String>>,
}

/// What a deploy call came back with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    Deployed(Deployed),
    /// The remote side refused; the message is passed on verbatim.
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndeployRequest {
    #[serde(flatten)]
    pub target: TargetRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_id: Option<String>,
    pub container_id: String,
}

// ── Commands & status ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    #[serde(flatten)]
    pub target: TargetRef,
    pub command: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    #[serde(default)]
    pub stdout: String,
}

impl CommandOutput {
    /// Admin commands count as applied only when they printed something.
    pub fn succeeded(&self) -> bool {
        !self.stdout.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    #[serde(flatten)]
    pub target: TargetRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_id: Option<String>,
    pub container_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStatus {
    #[serde(default)]
    pub status: Option<String>,
}

/// Response envelope used by every control API endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err_message: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(result: T) -> Self {
        Self {
            result: Some(result),
            err_message: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            result: None,
            err_message: Some(message.into()),
        }
    }
}
