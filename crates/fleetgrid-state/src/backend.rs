//! Storage seams used by the registry and the orchestrator.
//!
//! `DocumentStore` holds durable documents; `LiveStore` holds the records
//! that change with every heartbeat or deploy. Neither offers cross-record
//! transactions: callers order their writes so a partial failure leaves a
//! state the next sweep or request can repair.

use crate::error::StateResult;
use crate::types::*;

/// Durable, document-oriented storage.
pub trait DocumentStore: Send + Sync {
    // ── Worker metadata ────────────────────────────────────────────

    fn get_worker_metadata(&self, cluster: &ClusterId) -> StateResult<Option<WorkerMetadata>>;
    fn put_worker_metadata(&self, doc: &WorkerMetadata) -> StateResult<()>;
    /// Returns true if it existed.
    fn delete_worker_metadata(&self, cluster: &ClusterId) -> StateResult<bool>;

    // ── Alias index ────────────────────────────────────────────────

    fn get_alias(&self, alias: &str) -> StateResult<Option<AliasEntry>>;
    /// Conditional create. Returns false (and writes nothing) if the alias
    /// is already taken.
    fn insert_alias(&self, entry: &AliasEntry) -> StateResult<bool>;
    fn delete_alias(&self, alias: &str) -> StateResult<bool>;
    fn list_aliases(&self) -> StateResult<Vec<AliasEntry>>;

    // ── Liveness markers ───────────────────────────────────────────

    fn get_liveness(&self, cluster: &ClusterId) -> StateResult<Option<LivenessMarker>>;
    fn put_liveness(&self, marker: &LivenessMarker) -> StateResult<()>;
    fn delete_liveness(&self, cluster: &ClusterId) -> StateResult<bool>;
    fn list_liveness(&self) -> StateResult<Vec<LivenessMarker>>;

    // ── Namespaces ─────────────────────────────────────────────────

    fn get_namespace(
        &self,
        tenant: &TenantId,
        cluster: &ClusterId,
    ) -> StateResult<Option<NamespaceRecord>>;
    /// Conditional create. Returns the record that ends up stored: `record`
    /// if the key was free, otherwise the one that was already there.
    fn insert_namespace(&self, record: &NamespaceRecord) -> StateResult<NamespaceRecord>;
    fn delete_namespace(&self, tenant: &TenantId, cluster: &ClusterId) -> StateResult<bool>;
    fn list_namespaces_for_cluster(&self, cluster: &ClusterId) -> StateResult<Vec<NamespaceRecord>>;

    // ── Deployment records ─────────────────────────────────────────

    fn put_deployment_record(&self, record: &DeploymentRecord) -> StateResult<()>;
    fn get_deployment_record(
        &self,
        tenant: &TenantId,
        container_id: &str,
    ) -> StateResult<Option<DeploymentRecord>>;
    fn delete_deployment_record(&self, tenant: &TenantId, container_id: &str) -> StateResult<bool>;
    fn list_deployment_records(&self, tenant: &TenantId) -> StateResult<Vec<DeploymentRecord>>;
}

/// Low-latency live state.
pub trait LiveStore: Send + Sync {
    // ── Worker heartbeats ──────────────────────────────────────────

    /// All heartbeat records as `(producer id, record)`.
    fn list_workers(&self) -> StateResult<Vec<(String, WorkerRecord)>>;
    fn put_worker(&self, id: &str, record: &WorkerRecord) -> StateResult<()>;
    fn delete_worker(&self, id: &str) -> StateResult<bool>;

    // ── Containers ─────────────────────────────────────────────────

    fn get_container(
        &self,
        cluster: &ClusterId,
        container_id: &str,
    ) -> StateResult<Option<ContainerRecord>>;
    fn put_container(&self, record: &ContainerRecord) -> StateResult<()>;
    fn delete_container(&self, cluster: &ClusterId, container_id: &str) -> StateResult<bool>;
    fn list_containers(&self, cluster: &ClusterId) -> StateResult<Vec<ContainerRecord>>;
}
