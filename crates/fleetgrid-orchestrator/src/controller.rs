//! Day-two operations on deployed containers: sync replicas, rollback,
//! in-place update, and autoscaling.

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use fleetgrid_control::*;
use fleetgrid_state::*;

use crate::commands;
use crate::deploy::{Caller, Orchestrator, check_image_ref};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::wallet;

/// A requested sync target with the mnemonic proving ownership of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncTargetRequest {
    pub address: String,
    pub cluster_name: String,
    pub mnemonic: String,
}

impl SyncTargetRequest {
    pub fn cluster(&self) -> ClusterId {
        ClusterId::new(&self.address, &self.cluster_name)
    }
}

impl Orchestrator {
    // ── Sync ───────────────────────────────────────────────────────

    /// Replace the container's sync replicas.
    ///
    /// An empty list just clears `targets`. Otherwise each target must be a
    /// known Docker-style host whose address the mnemonic derives to;
    /// others are dropped. The stored list changes only if at least one
    /// replica deploys. Returns the targets in effect afterwards.
    pub async fn set_sync(
        &self,
        caller: &Caller,
        cluster: &ClusterId,
        container_id: &str,
        targets: &[SyncTargetRequest],
    ) -> OrchestratorResult<Vec<SyncTarget>> {
        if targets.is_empty() {
            if let Some(mut record) = self.live.get_container(cluster, container_id)? {
                record.targets = None;
                self.live.put_container(&record)?;
                info!(%cluster, %container_id, "sync targets cleared");
            }
            return Ok(Vec::new());
        }

        let mut record = self.owned_container(caller, cluster, container_id)?;
        let clusters = self.control.list_clusters().await?;

        let verified: Vec<&SyncTargetRequest> = targets
            .iter()
            .filter(|t| {
                let target = t.cluster();
                let Some(summary) = clusters.iter().find(|c| c.matches(&target)) else {
                    warn!(%target, "dropping sync target: unknown cluster");
                    return false;
                };
                if !summary.is_docker {
                    warn!(%target, "dropping sync target: not a docker host");
                    return false;
                }
                if !wallet::proves_ownership(&t.mnemonic, &t.address) {
                    warn!(%target, "dropping sync target: ownership proof failed");
                    return false;
                }
                true
            })
            .collect();
        if verified.is_empty() {
            return Ok(record.sync_targets().to_vec());
        }

        let new_targets = self
            .deploy_replicas(&record, verified.iter().map(|t| t.cluster()).collect())
            .await;
        if new_targets.is_empty() {
            warn!(%cluster, %container_id, "no sync replica deployed, keeping previous targets");
            return Ok(record.sync_targets().to_vec());
        }

        let previous = record.sync_targets().to_vec();
        if !previous.is_empty() {
            self.teardown_targets(&previous).await;
        }
        record.targets = Some(new_targets.clone());
        self.live.put_container(&record)?;
        info!(%cluster, %container_id, replicas = new_targets.len(), "sync targets replaced");
        Ok(new_targets)
    }

    /// Deploy the record's current image to each host in parallel.
    /// Returns the replicas that came up.
    async fn deploy_replicas(&self, record: &ContainerRecord, hosts: Vec<ClusterId>) -> Vec<SyncTarget> {
        let image = self
            .config
            .image_ref(&record.info.image, record.params.exact_image);
        let deploys = hosts.into_iter().map(|host| {
            let request = DockerDeployRequest {
                target: TargetRef::from(&host),
                image: image.clone(),
                publish_ports: None,
                privileged: false,
                command: None,
                env: None,
            };
            async move { (host, self.control.deploy_docker(&request).await) }
        });

        let mut replicas = Vec::new();
        for (host, outcome) in join_all(deploys).await {
            match outcome {
                Ok(DeployOutcome::Deployed(deployed)) => {
                    let replica = ContainerRecord {
                        cluster: host.clone(),
                        container_id: deployed.container_id.clone(),
                        info: ContainerInfo {
                            image: record.info.image.clone(),
                            platform: Platform::Docker,
                            namespace_id: None,
                            port: record.info.port.clone(),
                            endpoint: None,
                        },
                        params: ContainerParams {
                            image_name: record.info.image.clone(),
                            port: record.info.port.clone(),
                            exact_image: record.params.exact_image,
                        },
                        rollback: None,
                        targets: None,
                        email: record.email.clone(),
                        owner: record.owner.clone(),
                    };
                    if let Err(e) = self.live.put_container(&replica) {
                        warn!(%host, container_id = %deployed.container_id, error = %e, "failed to record sync replica");
                    }
                    replicas.push(SyncTarget {
                        address: host.address,
                        cluster_name: host.cluster_name,
                        container_id: deployed.container_id,
                    });
                }
                Ok(DeployOutcome::Rejected(message)) => {
                    warn!(%host, %message, "sync replica rejected");
                }
                Err(e) => warn!(%host, error = %e, "sync replica deploy failed"),
            }
        }
        replicas
    }

    /// Undeploy replicas in parallel; failures are logged.
    pub(crate) async fn teardown_targets(&self, targets: &[SyncTarget]) {
        let teardowns = targets.iter().map(|t| async move {
            let host = t.cluster();
            let result = self.control.undeploy_docker(&host, &t.container_id).await;
            (t, host, result)
        });
        for (target, host, result) in join_all(teardowns).await {
            if let Err(e) = result {
                warn!(%host, container_id = %target.container_id, error = %e, "sync replica undeploy failed");
            }
            if let Err(e) = self.live.delete_container(&host, &target.container_id) {
                warn!(%host, container_id = %target.container_id, error = %e, "failed to delete sync replica record");
            }
        }
    }

    // ── Rollback & update ──────────────────────────────────────────

    /// Record the image and ports `rollback` reverts to.
    pub fn set_rollback(
        &self,
        caller: &Caller,
        cluster: &ClusterId,
        container_id: &str,
        image: &str,
        port: Ports,
    ) -> OrchestratorResult<()> {
        check_image_ref(image)?;
        let mut record = self.owned_container(caller, cluster, container_id)?;
        record.rollback = Some(RollbackSpec {
            image: image.to_string(),
            port,
        });
        self.live.put_container(&record)?;
        info!(%cluster, %container_id, %image, "rollback target set");
        Ok(())
    }

    /// Revert the container to its recorded fallback.
    pub async fn rollback(
        &self,
        caller: &Caller,
        cluster: &ClusterId,
        container_id: &str,
    ) -> OrchestratorResult<ContainerRecord> {
        let record = self.owned_container(caller, cluster, container_id)?;
        require_kubernetes(&record)?;
        let Some(fallback) = record.rollback.clone() else {
            return Err(OrchestratorError::RollbackNotConfigured(container_id.to_string()));
        };
        let record = self
            .apply_image_change(record, &fallback.image, Some(fallback.port))
            .await?;
        info!(%cluster, %container_id, image = %fallback.image, "container rolled back");
        Ok(record)
    }

    /// Swap the container's image and, optionally, its ports in place.
    pub async fn update_deploy(
        &self,
        caller: &Caller,
        cluster: &ClusterId,
        container_id: &str,
        image: &str,
        port: Option<Ports>,
    ) -> OrchestratorResult<ContainerRecord> {
        check_image_ref(image)?;
        let record = self.owned_container(caller, cluster, container_id)?;
        require_kubernetes(&record)?;
        let record = self.apply_image_change(record, image, port).await?;
        info!(%cluster, %container_id, %image, "container updated");
        Ok(record)
    }

    /// Run the admin commands for an image/port change, then update the
    /// record and rebuild any sync replicas on the new image.
    async fn apply_image_change(
        &self,
        mut record: ContainerRecord,
        image: &str,
        port: Option<Ports>,
    ) -> OrchestratorResult<ContainerRecord> {
        let namespace = namespace_of(&record)?;
        let cluster = record.cluster.clone();
        let image_ref = self.config.image_ref(image, record.params.exact_image);

        let cmd = commands::set_image(&record.container_id, &namespace, &image_ref);
        self.run_admin(&cluster, &cmd).await?;

        let port = port.filter(|p| !p.is_empty() && *p != record.info.port);
        if let Some(ports) = &port {
            let cmd = commands::patch_service_ports(&record.container_id, &namespace, ports);
            self.run_admin(&cluster, &cmd).await?;
        }

        record.info.image = image.to_string();
        if let Some(ports) = port {
            record.info.port = ports;
        }

        let previous = record.sync_targets().to_vec();
        if !previous.is_empty() {
            self.teardown_targets(&previous).await;
            let hosts = previous.iter().map(SyncTarget::cluster).collect();
            let survivors = self.deploy_replicas(&record, hosts).await;
            if survivors.len() < previous.len() {
                warn!(
                    %cluster,
                    container_id = %record.container_id,
                    lost = previous.len() - survivors.len(),
                    "some sync replicas did not come back"
                );
            }
            record.targets = (!survivors.is_empty()).then_some(survivors);
        }

        self.live.put_container(&record)?;
        Ok(record)
    }

    // ── Autoscaling ────────────────────────────────────────────────

    pub async fn set_autoscaler(
        &self,
        caller: &Caller,
        cluster: &ClusterId,
        container_id: &str,
        cpu_percent: u32,
        min: u32,
        max: u32,
    ) -> OrchestratorResult<()> {
        if !(1..=100).contains(&cpu_percent) || min == 0 || max < min {
            return Err(OrchestratorError::InvalidParameter(
                "need 1 <= cpuPercent <= 100 and 1 <= min <= max".to_string(),
            ));
        }
        let record = self.owned_container(caller, cluster, container_id)?;
        require_kubernetes(&record)?;
        let namespace = namespace_of(&record)?;

        let cmd = commands::attach_autoscaler(container_id, &namespace, cpu_percent, min, max);
        self.run_admin(cluster, &cmd).await?;
        info!(%cluster, %container_id, cpu_percent, min, max, "autoscaler attached");
        Ok(())
    }

    pub async fn delete_autoscaler(
        &self,
        caller: &Caller,
        cluster: &ClusterId,
        container_id: &str,
    ) -> OrchestratorResult<()> {
        let record = self.owned_container(caller, cluster, container_id)?;
        require_kubernetes(&record)?;
        let namespace = namespace_of(&record)?;

        let cmd = commands::detach_autoscaler(container_id, &namespace);
        self.run_admin(cluster, &cmd).await?;
        info!(%cluster, %container_id, "autoscaler detached");
        Ok(())
    }

    /// An admin command that prints nothing did not apply.
    async fn run_admin(&self, cluster: &ClusterId, cmd: &str) -> OrchestratorResult<()> {
        let output = self.control.run_command(cluster, cmd).await?;
        if !output.succeeded() {
            return Err(OrchestratorError::DeployRejected(format!(
                "command produced no output: {cmd}"
            )));
        }
        Ok(())
    }
}

fn require_kubernetes(record: &ContainerRecord) -> OrchestratorResult<()> {
    if record.info.platform.is_docker() {
        return Err(OrchestratorError::UnsupportedPlatform(format!(
            "container {} runs on a docker host",
            record.container_id
        )));
    }
    Ok(())
}

fn namespace_of(record: &ContainerRecord) -> OrchestratorResult<String> {
    record.info.namespace_id.clone().ok_or_else(|| {
        OrchestratorError::NotFound(format!("namespace of container {}", record.container_id))
    })
}
