//! JSON-over-HTTP implementation of `ClusterControl`.

use std::time::Duration;

use async_trait::async_trait;
use fleetgrid_state::ClusterId;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::client::ClusterControl;
use crate::error::{ControlError, ControlResult};
use crate::types::*;

/// Control API client.
pub struct HttpClusterControl {
    client: reqwest::Client,
    base_url: String,
}

impl HttpClusterControl {
    /// Create a client for `base_url` with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> ControlResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ControlError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get<Resp: DeserializeOwned>(&self, path: &str) -> ControlResult<Envelope<Resp>> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "control GET");

        let response = self.client.get(&url).send().await?;
        Self::decode(&url, response).await
    }

    async fn post<Req: Serialize + Sync, Resp: DeserializeOwned>(
        &self,
        path: &str,
        body: &Req,
    ) -> ControlResult<Envelope<Resp>> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "control POST");

        let response = self.client.post(&url).json(body).send().await?;
        Self::decode(&url, response).await
    }

    async fn decode<Resp: DeserializeOwned>(
        url: &str,
        response: reqwest::Response,
    ) -> ControlResult<Envelope<Resp>> {
        if !response.status().is_success() {
            let code = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            error!(%url, code, %body, "control API call failed");
            return Err(ControlError::Http { code, body });
        }
        Ok(response.json().await?)
    }

    /// Unwrap an envelope whose `errMessage` is a hard error.
    fn into_result<T>(envelope: Envelope<T>) -> ControlResult<T> {
        if let Some(message) = envelope.err_message {
            return Err(ControlError::Rejected(message));
        }
        envelope
            .result
            .ok_or_else(|| ControlError::Decode("response carried no result".to_string()))
    }

    fn into_outcome(envelope: Envelope<Deployed>) -> ControlResult<DeployOutcome> {
        match envelope {
            Envelope {
                err_message: Some(message),
                ..
            } => Ok(DeployOutcome::Rejected(message)),
            Envelope {
                result: Some(deployed),
                ..
            } => Ok(DeployOutcome::Deployed(deployed)),
            _ => Err(ControlError::Decode("deploy response carried no result".to_string())),
        }
    }
}

#[async_trait]
impl ClusterControl for HttpClusterControl {
    async fn list_clusters(&self) -> ControlResult<Vec<ClusterSummary>> {
        let envelope = self.get::<Vec<ClusterSummary>>("/clusters").await?;
        Ok(envelope.result.unwrap_or_default())
    }

    async fn create_namespace(&self, cluster: &ClusterId) -> ControlResult<NamespaceCreated> {
        let envelope = self
            .post::<_, NamespaceCreated>("/namespaces", &TargetRef::from(cluster))
            .await?;
        Self::into_result(envelope)
    }

    async fn deploy(&self, req: &DeployRequest) -> ControlResult<DeployOutcome> {
        let envelope = self.post("/deploy", req).await?;
        Self::into_outcome(envelope)
    }

    async fn deploy_docker(&self, req: &DockerDeployRequest) -> ControlResult<DeployOutcome> {
        let envelope = self.post("/docker/deploy", req).await?;
        Self::into_outcome(envelope)
    }

    async fn undeploy(&self, req: &UndeployRequest) -> ControlResult<()> {
        let envelope = self.post::<_, serde_json::Value>("/undeploy", req).await?;
        Self::into_result(envelope).map(|_| ())
    }

    async fn undeploy_docker(&self, cluster: &ClusterId, container_id: &str) -> ControlResult<()> {
        let req = UndeployRequest {
            target: TargetRef::from(cluster),
            namespace_id: None,
            container_id: container_id.to_string(),
        };
        let envelope = self
            .post::<_, serde_json::Value>("/docker/undeploy", &req)
            .await?;
        Self::into_result(envelope).map(|_| ())
    }

    async fn run_command(&self, cluster: &ClusterId, command: &str) -> ControlResult<CommandOutput> {
        let req = CommandRequest {
            target: TargetRef::from(cluster),
            command: command.to_string(),
        };
        let envelope = self.post::<_, CommandOutput>("/command", &req).await?;
        Self::into_result(envelope)
    }

    async fn container_status(&self, req: &StatusRequest) -> ControlResult<ContainerStatus> {
        let envelope = self.post::<_, ContainerStatus>("/status", req).await?;
        Ok(envelope.result.unwrap_or_default())
    }

    async fn container_status_docker(
        &self,
        cluster: &ClusterId,
        container_id: &str,
    ) -> ControlResult<ContainerStatus> {
        let req = StatusRequest {
            target: TargetRef::from(cluster),
            namespace_id: None,
            container_id: container_id.to_string(),
        };
        let envelope = self
            .post::<_, ContainerStatus>("/docker/status", &req)
            .await?;
        Ok(envelope.result.unwrap_or_default())
    }
}
