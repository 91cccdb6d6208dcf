//! Namespace allocator: one namespace per tenant per cluster.
//!
//! Namespaces are created lazily on a tenant's first deploy to a cluster
//! and memoized in the `DocumentStore`. Concurrent first requests in this
//! process queue on a per-key lock; across processes the store's
//! conditional insert decides the winner and every caller adopts it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use fleetgrid_control::ClusterControl;
use fleetgrid_state::*;

use crate::error::{OrchestratorError, OrchestratorResult};

pub struct NamespaceAllocator {
    docs: Arc<dyn DocumentStore>,
    control: Arc<dyn ClusterControl>,
    clock: Arc<dyn Clock>,
    /// Tenant key → namespace that is never created through the control API.
    fixed: BTreeMap<String, String>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl NamespaceAllocator {
    pub fn new(
        docs: Arc<dyn DocumentStore>,
        control: Arc<dyn ClusterControl>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            docs,
            control,
            clock,
            fixed: BTreeMap::new(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Route the given tenants to pre-provisioned namespaces.
    pub fn with_fixed_namespaces(mut self, fixed: BTreeMap<String, String>) -> Self {
        self.fixed = fixed;
        self
    }

    /// The tenant's namespace on `cluster`, creating it on first use.
    ///
    /// A failed or empty create is `NamespaceCreationFailed` and is not
    /// retried. The record is stored before the id is returned.
    pub async fn get_or_create(&self, tenant: &TenantId, cluster: &ClusterId) -> OrchestratorResult<String> {
        if let Some(namespace) = self.fixed.get(&tenant.key()) {
            debug!(%tenant, %namespace, "using fixed namespace");
            return Ok(namespace.clone());
        }
        if let Some(record) = self.docs.get_namespace(tenant, cluster)? {
            return Ok(record.namespace_id);
        }

        let key = namespace_key(tenant, cluster);
        let lock = self.lock_for(&key).await;
        let result = {
            let _guard = lock.lock().await;
            self.create_locked(tenant, cluster).await
        };
        self.release_lock(&key, lock).await;
        result
    }

    async fn create_locked(&self, tenant: &TenantId, cluster: &ClusterId) -> OrchestratorResult<String> {
        // Someone ahead of us in the queue may have created it.
        if let Some(record) = self.docs.get_namespace(tenant, cluster)? {
            return Ok(record.namespace_id);
        }

        let created = self
            .control
            .create_namespace(cluster)
            .await
            .map_err(|e| OrchestratorError::NamespaceCreationFailed(e.to_string()))?;
        let Some(namespace_id) = created.namespace_id.filter(|id| !id.is_empty()) else {
            return Err(OrchestratorError::NamespaceCreationFailed(
                "control API returned no namespace id".to_string(),
            ));
        };

        let record = NamespaceRecord {
            tenant: tenant.clone(),
            cluster: cluster.clone(),
            namespace_id: namespace_id.clone(),
            created_at: self.clock.now_millis(),
        };
        let stored = self.docs.insert_namespace(&record)?;
        if stored.namespace_id != namespace_id {
            warn!(
                %tenant, %cluster,
                created = %namespace_id,
                kept = %stored.namespace_id,
                "namespace created concurrently elsewhere, adopting stored one"
            );
        } else {
            info!(%tenant, %cluster, namespace = %namespace_id, "namespace created");
        }
        Ok(stored.namespace_id)
    }

    async fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(key.to_string()).or_default().clone()
    }

    async fn release_lock(&self, key: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        // One reference in the map, one held here: nobody else is waiting.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(key);
        }
    }

    /// Forget every namespace bound to `cluster`. Returns how many were removed.
    pub fn purge_cluster(&self, cluster: &ClusterId) -> OrchestratorResult<usize> {
        let mut removed = 0;
        for record in self.docs.list_namespaces_for_cluster(cluster)? {
            if self.docs.delete_namespace(&record.tenant, cluster)? {
                removed += 1;
            }
        }
        info!(%cluster, removed, "purged cluster namespaces");
        Ok(removed)
    }

    /// Stored namespace, without creating one.
    pub fn lookup(&self, tenant: &TenantId, cluster: &ClusterId) -> OrchestratorResult<Option<String>> {
        if let Some(namespace) = self.fixed.get(&tenant.key()) {
            return Ok(Some(namespace.clone()));
        }
        Ok(self.docs.get_namespace(tenant, cluster)?.map(|r| r.namespace_id))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use fleetgrid_control::MemoryClusterControl;

    use super::*;

    fn demo() -> ClusterId {
        ClusterId::new("1.2.3.4", "demo-cluster")
    }

    fn setup() -> (StateStore, Arc<MemoryClusterControl>, Arc<NamespaceAllocator>) {
        let store = StateStore::open_in_memory().unwrap();
        let control = Arc::new(MemoryClusterControl::default());
        let allocator = NamespaceAllocator::new(
            Arc::new(store.clone()),
            control.clone(),
            Arc::new(ManualClock::new(1_000)),
        );
        (store, control, Arc::new(allocator))
    }

    #[tokio::test]
    async fn second_call_reuses_namespace() {
        let (store, control, allocator) = setup();
        let tenant = TenantId::User("alice".into());

        let first = allocator.get_or_create(&tenant, &demo()).await.unwrap();
        let second = allocator.get_or_create(&tenant, &demo()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(control.namespace_calls().await, 1);
        assert_eq!(
            store.get_namespace(&tenant, &demo()).unwrap().unwrap().namespace_id,
            first
        );
    }

    #[tokio::test]
    async fn concurrent_first_calls_create_once() {
        let (_store, control, allocator) = setup();
        control.delay_namespace_creation(Duration::from_millis(50)).await;
        let tenant = TenantId::Token("ci".into());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let allocator = allocator.clone();
                let tenant = tenant.clone();
                tokio::spawn(async move { allocator.get_or_create(&tenant, &demo()).await.unwrap() })
            })
            .collect();
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }

        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(control.namespace_calls().await, 1);
    }

    #[tokio::test]
    async fn tenants_get_separate_namespaces() {
        let (_store, _control, allocator) = setup();
        let a = allocator
            .get_or_create(&TenantId::User("alice".into()), &demo())
            .await
            .unwrap();
        let b = allocator
            .get_or_create(&TenantId::User("bob".into()), &demo())
            .await
            .unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn failed_creation_stores_nothing() {
        let (store, control, allocator) = setup();
        control.fail_namespace_creation(true).await;
        let tenant = TenantId::User("alice".into());

        let err = allocator.get_or_create(&tenant, &demo()).await.unwrap_err();
        assert_eq!(err.status(), Status::NamespaceCreationFailed);
        assert!(store.get_namespace(&tenant, &demo()).unwrap().is_none());
    }

    #[tokio::test]
    async fn fixed_namespace_skips_control_api() {
        let (store, control, _) = setup();
        let allocator = NamespaceAllocator::new(
            Arc::new(store.clone()),
            control.clone(),
            Arc::new(SystemClock),
        )
        .with_fixed_namespaces(BTreeMap::from([(
            "tokens/ide".to_string(),
            "ide-shared".to_string(),
        )]));

        let ns = allocator
            .get_or_create(&TenantId::Token("ide".into()), &demo())
            .await
            .unwrap();
        assert_eq!(ns, "ide-shared");
        assert_eq!(control.namespace_calls().await, 0);
    }

    #[tokio::test]
    async fn purge_removes_cluster_namespaces_only() {
        let (store, _control, allocator) = setup();
        let edge = ClusterId::new("5.6.7.8", "edge");
        let alice = TenantId::User("alice".into());
        allocator.get_or_create(&alice, &demo()).await.unwrap();
        allocator
            .get_or_create(&TenantId::User("bob".into()), &demo())
            .await
            .unwrap();
        allocator.get_or_create(&alice, &edge).await.unwrap();

        assert_eq!(allocator.purge_cluster(&demo()).unwrap(), 2);
        assert!(store.get_namespace(&alice, &demo()).unwrap().is_none());
        assert!(store.get_namespace(&alice, &edge).unwrap().is_some());
    }
}
