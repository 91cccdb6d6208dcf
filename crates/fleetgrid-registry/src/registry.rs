//! Worker registry: tracks which clusters and machines are alive.
//!
//! Heartbeat records live in the `LiveStore`; the durable view (metadata,
//! alias index, liveness markers) lives in the `DocumentStore`. The sweep
//! reconciles the two. Writes are ordered so that a partially applied
//! sweep leaves either an unreferenced document (created before its
//! reference) or a reference-free document set (references deleted first),
//! both of which the next sweep repairs.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use fleetgrid_state::*;

use crate::error::{RegistryError, RegistryResult};

/// Values accepted for the `type` metadata annotation.
pub const WORKER_TYPES: [&str; 4] = ["central_cloud", "edge_server", "edge_cloud", "robot"];

/// How a caller names a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerSelector {
    Alias(String),
    Cluster(ClusterId),
}

/// Listing row for one known worker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkerView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub address: String,
    pub name: String,
    pub platform: Platform,
    pub metadata: Metadata,
}

impl WorkerView {
    fn from_metadata(doc: WorkerMetadata, with_alias: bool) -> Self {
        Self {
            alias: with_alias.then_some(doc.alias),
            address: doc.params.address.clone(),
            name: doc.params.cluster_name.clone(),
            platform: doc.params.platform(),
            metadata: doc.metadata,
        }
    }
}

/// Counters from one completed sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Heartbeats inside the stale threshold.
    pub live: usize,
    /// Workers seen live for the first time.
    pub registered: usize,
    /// Stale heartbeats removed.
    pub evicted: usize,
    /// Missing alias entries recreated and orphaned documents removed.
    pub repaired: usize,
    /// Heartbeats without a timestamp.
    pub ignored: usize,
    /// Per-worker steps that failed and were skipped.
    pub failures: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed(SweepReport),
    /// Another sweep was already running.
    Skipped,
}

enum Refresh {
    Registered,
    Repaired,
    Unchanged,
}

/// Heartbeat-driven worker registry.
pub struct WorkerRegistry {
    docs: Arc<dyn DocumentStore>,
    live: Arc<dyn LiveStore>,
    clock: Arc<dyn Clock>,
    /// Heartbeats at least this old are stale.
    stale_after: Duration,
    sweep_lock: Mutex<()>,
}

impl WorkerRegistry {
    pub fn new(docs: Arc<dyn DocumentStore>, live: Arc<dyn LiveStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            docs,
            live,
            clock,
            stale_after: Duration::from_secs(60 * 60),
            sweep_lock: Mutex::new(()),
        }
    }

    /// Set the stale heartbeat threshold.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    /// Write or refresh a heartbeat record at the clock's current time.
    pub fn heartbeat(&self, id: &str, params: WorkerParams) -> RegistryResult<()> {
        if id.is_empty() || params.address.is_empty() || params.cluster_name.is_empty() {
            return Err(RegistryError::InvalidParameter(
                "heartbeat needs an id, address and clusterName".to_string(),
            ));
        }
        let record = WorkerRecord {
            params,
            updated_at: Some(self.clock.now_millis()),
        };
        self.live.put_worker(id, &record)?;
        debug!(%id, cluster = %record.params.cluster(), "heartbeat recorded");
        Ok(())
    }

    // ── Sweep ──────────────────────────────────────────────────────

    /// Reconcile heartbeat records with the durable worker documents.
    ///
    /// Returns `Skipped` without touching anything if another sweep holds
    /// the run-once lock. Failures on a single worker are logged and
    /// counted; only failing to read the heartbeat list aborts the sweep.
    pub fn sweep(&self) -> RegistryResult<SweepOutcome> {
        let Ok(_guard) = self.sweep_lock.try_lock() else {
            debug!("sweep already running, skipping");
            return Ok(SweepOutcome::Skipped);
        };

        let now = self.clock.now_millis();
        let stale_ms = self.stale_after.as_millis() as u64;
        let workers = self.live.list_workers()?;
        let mut report = SweepReport::default();

        let mut untimed: HashSet<ClusterId> = HashSet::new();
        let mut live = Vec::new();
        let mut stale = Vec::new();
        for (id, record) in workers {
            match record.updated_at {
                None => {
                    report.ignored += 1;
                    untimed.insert(record.params.cluster());
                }
                Some(at) if now.abs_diff(at) >= stale_ms => stale.push((id, record)),
                Some(_) => live.push(record),
            }
        }

        let mut live_clusters = HashSet::new();
        for record in &live {
            report.live += 1;
            let cluster = record.params.cluster();
            match self.refresh_worker(&record.params, now) {
                Ok(Refresh::Registered) => report.registered += 1,
                Ok(Refresh::Repaired) => report.repaired += 1,
                Ok(Refresh::Unchanged) => {}
                Err(e) => {
                    warn!(%cluster, error = %e, "failed to refresh live worker");
                    report.failures += 1;
                }
            }
            live_clusters.insert(cluster);
        }

        for (id, record) in &stale {
            let cluster = record.params.cluster();
            // Another producer may still be heartbeating for the same cluster.
            let keep_documents = live_clusters.contains(&cluster);
            match self.evict_worker(id, &cluster, keep_documents) {
                Ok(()) => {
                    info!(%id, %cluster, "evicted stale worker");
                    report.evicted += 1;
                }
                Err(e) => {
                    warn!(%id, %cluster, error = %e, "failed to evict stale worker");
                    report.failures += 1;
                }
            }
        }

        // Documents whose worker no longer has any heartbeat record.
        let still_known: HashSet<ClusterId> = live_clusters.union(&untimed).cloned().collect();
        match self.orphaned_clusters(&still_known) {
            Ok(orphans) => {
                for cluster in orphans {
                    match self.remove_documents(&cluster) {
                        Ok(()) => {
                            info!(%cluster, "removed orphaned worker documents");
                            report.repaired += 1;
                        }
                        Err(e) => {
                            warn!(%cluster, error = %e, "failed to remove orphaned worker documents");
                            report.failures += 1;
                        }
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "failed to scan for orphaned worker documents");
                report.failures += 1;
            }
        }

        info!(
            live = report.live,
            registered = report.registered,
            evicted = report.evicted,
            repaired = report.repaired,
            failures = report.failures,
            "sweep completed"
        );
        Ok(SweepOutcome::Completed(report))
    }

    /// Referenced before reference: metadata, then alias, then liveness.
    fn refresh_worker(&self, params: &WorkerParams, now: u64) -> RegistryResult<Refresh> {
        let cluster = params.cluster();
        let outcome = match self.docs.get_worker_metadata(&cluster)? {
            None => {
                let doc = WorkerMetadata {
                    cluster: cluster.clone(),
                    alias: cluster.key(),
                    params: params.clone(),
                    metadata: Metadata::new(),
                    registered_at: now,
                };
                self.docs.put_worker_metadata(&doc)?;
                self.ensure_alias(&doc)?;
                info!(%cluster, alias = %doc.alias, "registered worker");
                Refresh::Registered
            }
            Some(doc) => match self.docs.get_alias(&doc.alias)? {
                Some(_) => Refresh::Unchanged,
                None => {
                    self.ensure_alias(&doc)?;
                    info!(%cluster, alias = %doc.alias, "restored missing alias entry");
                    Refresh::Repaired
                }
            },
        };

        self.docs.put_liveness(&LivenessMarker {
            cluster,
            updated_at: now,
        })?;
        Ok(outcome)
    }

    fn ensure_alias(&self, doc: &WorkerMetadata) -> RegistryResult<()> {
        let entry = AliasEntry {
            alias: doc.alias.clone(),
            target: doc.cluster.clone(),
        };
        if !self.docs.insert_alias(&entry)? {
            warn!(cluster = %doc.cluster, alias = %doc.alias, "alias is held by another worker");
        }
        Ok(())
    }

    /// Reference before referenced: heartbeat, then alias, metadata, liveness.
    fn evict_worker(&self, id: &str, cluster: &ClusterId, keep_documents: bool) -> RegistryResult<()> {
        self.live.delete_worker(id)?;
        if !keep_documents {
            self.remove_documents(cluster)?;
        }
        Ok(())
    }

    fn remove_documents(&self, cluster: &ClusterId) -> RegistryResult<()> {
        if let Some(doc) = self.docs.get_worker_metadata(cluster)? {
            if let Some(entry) = self.docs.get_alias(&doc.alias)? {
                if &entry.target == cluster {
                    self.docs.delete_alias(&doc.alias)?;
                }
            }
            self.docs.delete_worker_metadata(cluster)?;
        }
        // Entries left pointing here after a failed rename.
        for entry in self.docs.list_aliases()? {
            if &entry.target == cluster {
                self.docs.delete_alias(&entry.alias)?;
            }
        }
        self.docs.delete_liveness(cluster)?;
        Ok(())
    }

    fn orphaned_clusters(&self, known: &HashSet<ClusterId>) -> RegistryResult<Vec<ClusterId>> {
        let mut orphans: Vec<ClusterId> = self
            .docs
            .list_liveness()?
            .into_iter()
            .map(|m| m.cluster)
            .chain(self.docs.list_aliases()?.into_iter().map(|e| e.target))
            .filter(|c| !known.contains(c))
            .collect();
        orphans.sort();
        orphans.dedup();
        Ok(orphans)
    }

    // ── Lookup ─────────────────────────────────────────────────────

    /// Alias → cluster identity. A dangling alias is `NotFound`.
    pub fn resolve(&self, alias: &str) -> RegistryResult<ClusterId> {
        Ok(self.metadata_by_alias(alias)?.cluster)
    }

    /// One worker by alias.
    pub fn get_by_alias(&self, alias: &str) -> RegistryResult<WorkerView> {
        let doc = self.metadata_by_alias(alias)?;
        Ok(WorkerView::from_metadata(doc, true))
    }

    fn metadata_by_alias(&self, alias: &str) -> RegistryResult<WorkerMetadata> {
        let entry = self
            .docs
            .get_alias(alias)?
            .ok_or_else(|| RegistryError::NotFound(format!("alias {alias}")))?;
        self.docs
            .get_worker_metadata(&entry.target)?
            .ok_or_else(|| RegistryError::NotFound(format!("worker for alias {alias}")))
    }

    fn metadata_for(&self, selector: &WorkerSelector) -> RegistryResult<WorkerMetadata> {
        match selector {
            WorkerSelector::Alias(alias) => self.metadata_by_alias(alias),
            WorkerSelector::Cluster(cluster) => self
                .docs
                .get_worker_metadata(cluster)?
                .ok_or_else(|| RegistryError::NotFound(format!("worker {cluster}"))),
        }
    }

    /// Workers with a liveness marker.
    pub fn list_live(&self) -> RegistryResult<Vec<WorkerView>> {
        let mut views = Vec::new();
        for marker in self.docs.list_liveness()? {
            if let Some(doc) = self.docs.get_worker_metadata(&marker.cluster)? {
                views.push(WorkerView::from_metadata(doc, false));
            }
        }
        Ok(views)
    }

    /// Workers reachable through the alias index, with their alias.
    pub fn list_by_alias(&self) -> RegistryResult<Vec<WorkerView>> {
        let mut views = Vec::new();
        for entry in self.docs.list_aliases()? {
            match self.docs.get_worker_metadata(&entry.target)? {
                Some(doc) => views.push(WorkerView {
                    alias: Some(entry.alias),
                    ..WorkerView::from_metadata(doc, false)
                }),
                None => debug!(alias = %entry.alias, "skipping dangling alias"),
            }
        }
        Ok(views)
    }

    /// `list_live`, optionally after running a sweep first.
    pub fn list(&self, refresh: bool) -> RegistryResult<Vec<WorkerView>> {
        if refresh {
            self.sweep()?;
        }
        self.list_live()
    }

    // ── Mutation ───────────────────────────────────────────────────

    /// Move a worker from `current` to `next` in the alias index.
    ///
    /// Fails with `Conflict` and changes nothing if `next` is taken.
    pub fn rename(&self, current: &str, next: &str) -> RegistryResult<()> {
        if next.is_empty() {
            return Err(RegistryError::InvalidParameter("alias must not be empty".to_string()));
        }
        let doc = self.metadata_by_alias(current)?;
        self.move_alias(doc, next)
    }

    fn move_alias(&self, mut doc: WorkerMetadata, next: &str) -> RegistryResult<()> {
        let current = doc.alias.clone();
        if current == next {
            return Ok(());
        }

        let entry = AliasEntry {
            alias: next.to_string(),
            target: doc.cluster.clone(),
        };
        if !self.docs.insert_alias(&entry)? {
            return Err(RegistryError::Conflict(next.to_string()));
        }

        doc.alias = next.to_string();
        if let Err(e) = self.docs.put_worker_metadata(&doc) {
            if let Err(undo) = self.docs.delete_alias(next) {
                warn!(alias = %next, error = %undo, "failed to roll back new alias entry");
            }
            return Err(e.into());
        }

        self.docs.delete_alias(&current)?;
        info!(cluster = %doc.cluster, from = %current, to = %next, "worker renamed");
        Ok(())
    }

    /// Replace a worker's metadata, optionally renaming it first.
    ///
    /// A `type` annotation must be one of `WORKER_TYPES`.
    pub fn set_metadata(
        &self,
        selector: &WorkerSelector,
        metadata: Metadata,
        next_alias: Option<&str>,
    ) -> RegistryResult<()> {
        if let Some(kind) = metadata.get("type") {
            if !kind.as_str().is_some_and(|k| WORKER_TYPES.contains(&k)) {
                return Err(RegistryError::InvalidParameter(format!(
                    "type should be one of [{}]",
                    WORKER_TYPES.join(", ")
                )));
            }
        }

        let doc = self.metadata_for(selector)?;
        let cluster = doc.cluster.clone();
        if let Some(next) = next_alias.filter(|n| !n.is_empty()) {
            self.move_alias(doc, next)?;
        }

        let mut doc = self
            .docs
            .get_worker_metadata(&cluster)?
            .ok_or_else(|| RegistryError::NotFound(format!("worker {cluster}")))?;
        doc.metadata = metadata;
        self.docs.put_worker_metadata(&doc)?;
        info!(%cluster, "worker metadata updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    const T0: u64 = 1_700_000_000_000;

    struct Harness {
        store: StateStore,
        clock: Arc<ManualClock>,
        registry: WorkerRegistry,
    }

    fn harness() -> Harness {
        let store = StateStore::open_in_memory().unwrap();
        let clock = Arc::new(ManualClock::new(T0));
        let registry = WorkerRegistry::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            clock.clone(),
        );
        Harness {
            store,
            clock,
            registry,
        }
    }

    fn params(address: &str, name: &str, is_docker: bool) -> WorkerParams {
        WorkerParams {
            address: address.to_string(),
            cluster_name: name.to_string(),
            is_docker,
        }
    }

    fn demo() -> ClusterId {
        ClusterId::new("1.2.3.4", "demo-cluster")
    }

    fn completed(outcome: SweepOutcome) -> SweepReport {
        match outcome {
            SweepOutcome::Completed(report) => report,
            SweepOutcome::Skipped => panic!("sweep was skipped"),
        }
    }

    fn heartbeat_minutes_ago(h: &Harness, id: &str, p: WorkerParams, minutes: u64) {
        let record = WorkerRecord {
            params: p,
            updated_at: Some(T0 - minutes * 60_000),
        };
        h.store.put_worker(id, &record).unwrap();
    }

    // ── Sweep ──────────────────────────────────────────────────────

    #[test]
    fn first_sweep_registers_worker() {
        let h = harness();
        h.registry
            .heartbeat("w1", params("1.2.3.4", "demo-cluster", false))
            .unwrap();

        let report = completed(h.registry.sweep().unwrap());
        assert_eq!(report.registered, 1);

        let doc = h.store.get_worker_metadata(&demo()).unwrap().unwrap();
        assert_eq!(doc.alias, "demo-cluster@1.2.3.4");
        assert_eq!(h.registry.resolve("demo-cluster@1.2.3.4").unwrap(), demo());
        assert_eq!(h.store.get_liveness(&demo()).unwrap().unwrap().updated_at, T0);
    }

    #[test]
    fn heartbeat_59_minutes_old_stays() {
        let h = harness();
        heartbeat_minutes_ago(&h, "w1", params("1.2.3.4", "demo-cluster", false), 59);

        let report = completed(h.registry.sweep().unwrap());
        assert_eq!(report.live, 1);
        assert_eq!(report.evicted, 0);
        assert_eq!(h.store.list_workers().unwrap().len(), 1);
        assert!(h.store.get_worker_metadata(&demo()).unwrap().is_some());
    }

    #[test]
    fn heartbeat_61_minutes_old_is_evicted_with_documents() {
        let h = harness();
        h.registry
            .heartbeat("w1", params("1.2.3.4", "demo-cluster", false))
            .unwrap();
        h.registry.sweep().unwrap();

        h.clock.advance(Duration::from_secs(61 * 60));
        let report = completed(h.registry.sweep().unwrap());

        assert_eq!(report.evicted, 1);
        assert!(h.store.list_workers().unwrap().is_empty());
        assert!(h.store.get_worker_metadata(&demo()).unwrap().is_none());
        assert!(h.store.get_alias("demo-cluster@1.2.3.4").unwrap().is_none());
        assert!(h.store.get_liveness(&demo()).unwrap().is_none());
    }

    #[test]
    fn records_without_timestamp_are_ignored() {
        let h = harness();
        let record = WorkerRecord {
            params: params("1.2.3.4", "demo-cluster", false),
            updated_at: None,
        };
        h.store.put_worker("w1", &record).unwrap();

        h.clock.advance(Duration::from_secs(10 * 60 * 60));
        let report = completed(h.registry.sweep().unwrap());
        assert_eq!(report.ignored, 1);
        assert_eq!(h.store.list_workers().unwrap().len(), 1);
        assert!(h.store.get_worker_metadata(&demo()).unwrap().is_none());
    }

    #[test]
    fn sweep_never_overwrites_metadata() {
        let h = harness();
        h.registry
            .heartbeat("w1", params("1.2.3.4", "demo-cluster", false))
            .unwrap();
        h.registry.sweep().unwrap();

        let mut meta = Metadata::new();
        meta.insert("type".into(), "robot".into());
        h.registry
            .set_metadata(&WorkerSelector::Cluster(demo()), meta.clone(), None)
            .unwrap();

        h.clock.advance(Duration::from_secs(60));
        h.registry.sweep().unwrap();
        assert_eq!(h.store.get_worker_metadata(&demo()).unwrap().unwrap().metadata, meta);
    }

    #[test]
    fn sweep_restores_missing_alias() {
        let h = harness();
        h.registry
            .heartbeat("w1", params("1.2.3.4", "demo-cluster", false))
            .unwrap();
        h.registry.sweep().unwrap();
        h.store.delete_alias("demo-cluster@1.2.3.4").unwrap();

        let report = completed(h.registry.sweep().unwrap());
        assert_eq!(report.repaired, 1);
        assert_eq!(h.registry.resolve("demo-cluster@1.2.3.4").unwrap(), demo());
    }

    #[test]
    fn sweep_removes_documents_without_heartbeat() {
        let h = harness();
        h.registry
            .heartbeat("w1", params("1.2.3.4", "demo-cluster", false))
            .unwrap();
        h.registry.sweep().unwrap();
        h.store.delete_worker("w1").unwrap();

        let report = completed(h.registry.sweep().unwrap());
        assert_eq!(report.repaired, 1);
        assert!(h.store.get_worker_metadata(&demo()).unwrap().is_none());
        assert!(h.store.list_liveness().unwrap().is_empty());
        assert!(h.store.list_aliases().unwrap().is_empty());
    }

    #[test]
    fn overlapping_sweep_is_skipped() {
        let h = harness();
        let _running = h.registry.sweep_lock.try_lock().unwrap();
        assert_eq!(h.registry.sweep().unwrap(), SweepOutcome::Skipped);
    }

    /// Document store whose liveness writes can be switched off.
    struct FlakyDocs {
        inner: StateStore,
        fail_liveness: AtomicBool,
    }

    impl DocumentStore for FlakyDocs {
        fn get_worker_metadata(&self, c: &ClusterId) -> StateResult<Option<WorkerMetadata>> {
            self.inner.get_worker_metadata(c)
        }
        fn put_worker_metadata(&self, d: &WorkerMetadata) -> StateResult<()> {
            self.inner.put_worker_metadata(d)
        }
        fn delete_worker_metadata(&self, c: &ClusterId) -> StateResult<bool> {
            self.inner.delete_worker_metadata(c)
        }
        fn get_alias(&self, a: &str) -> StateResult<Option<AliasEntry>> {
            self.inner.get_alias(a)
        }
        fn insert_alias(&self, e: &AliasEntry) -> StateResult<bool> {
            self.inner.insert_alias(e)
        }
        fn delete_alias(&self, a: &str) -> StateResult<bool> {
            self.inner.delete_alias(a)
        }
        fn list_aliases(&self) -> StateResult<Vec<AliasEntry>> {
            self.inner.list_aliases()
        }
        fn get_liveness(&self, c: &ClusterId) -> StateResult<Option<LivenessMarker>> {
            self.inner.get_liveness(c)
        }
        fn put_liveness(&self, m: &LivenessMarker) -> StateResult<()> {
            if self.fail_liveness.load(Ordering::SeqCst) {
                return Err(StateError::Write("liveness unavailable".to_string()));
            }
            self.inner.put_liveness(m)
        }
        fn delete_liveness(&self, c: &ClusterId) -> StateResult<bool> {
            self.inner.delete_liveness(c)
        }
        fn list_liveness(&self) -> StateResult<Vec<LivenessMarker>> {
            self.inner.list_liveness()
        }
        fn get_namespace(&self, t: &TenantId, c: &ClusterId) -> StateResult<Option<NamespaceRecord>> {
            self.inner.get_namespace(t, c)
        }
        fn insert_namespace(&self, r: &NamespaceRecord) -> StateResult<NamespaceRecord> {
            self.inner.insert_namespace(r)
        }
        fn delete_namespace(&self, t: &TenantId, c: &ClusterId) -> StateResult<bool> {
            self.inner.delete_namespace(t, c)
        }
        fn list_namespaces_for_cluster(&self, c: &ClusterId) -> StateResult<Vec<NamespaceRecord>> {
            self.inner.list_namespaces_for_cluster(c)
        }
        fn put_deployment_record(&self, r: &DeploymentRecord) -> StateResult<()> {
            self.inner.put_deployment_record(r)
        }
        fn get_deployment_record(&self, t: &TenantId, id: &str) -> StateResult<Option<DeploymentRecord>> {
            self.inner.get_deployment_record(t, id)
        }
        fn delete_deployment_record(&self, t: &TenantId, id: &str) -> StateResult<bool> {
            self.inner.delete_deployment_record(t, id)
        }
        fn list_deployment_records(&self, t: &TenantId) -> StateResult<Vec<DeploymentRecord>> {
            self.inner.list_deployment_records(t)
        }
    }

    #[test]
    fn partial_failure_is_counted_and_repaired_next_sweep() {
        let store = StateStore::open_in_memory().unwrap();
        let docs = Arc::new(FlakyDocs {
            inner: store.clone(),
            fail_liveness: AtomicBool::new(true),
        });
        let clock = Arc::new(ManualClock::new(T0));
        let registry = WorkerRegistry::new(docs.clone(), Arc::new(store.clone()), clock);
        registry
            .heartbeat("w1", params("1.2.3.4", "demo-cluster", false))
            .unwrap();
        registry
            .heartbeat("w2", params("5.6.7.8", "edge", true))
            .unwrap();

        let report = completed(registry.sweep().unwrap());
        assert_eq!(report.failures, 2);
        // Metadata and alias landed before the failing liveness write.
        assert_eq!(registry.resolve("demo-cluster@1.2.3.4").unwrap(), demo());
        assert!(registry.list_live().unwrap().is_empty());

        docs.fail_liveness.store(false, Ordering::SeqCst);
        let report = completed(registry.sweep().unwrap());
        assert_eq!(report.failures, 0);
        assert_eq!(registry.list_live().unwrap().len(), 2);
    }

    // ── Alias & metadata ───────────────────────────────────────────

    fn registered(h: &Harness) {
        h.registry
            .heartbeat("w1", params("1.2.3.4", "demo-cluster", false))
            .unwrap();
        h.registry
            .heartbeat("w2", params("5.6.7.8", "edge", true))
            .unwrap();
        h.registry.sweep().unwrap();
    }

    #[test]
    fn rename_moves_alias() {
        let h = harness();
        registered(&h);

        h.registry.rename("demo-cluster@1.2.3.4", "lab").unwrap();

        assert_eq!(h.registry.resolve("lab").unwrap(), demo());
        assert!(matches!(
            h.registry.resolve("demo-cluster@1.2.3.4"),
            Err(RegistryError::NotFound(_))
        ));
        assert_eq!(h.store.get_worker_metadata(&demo()).unwrap().unwrap().alias, "lab");
    }

    #[test]
    fn rename_to_existing_alias_conflicts() {
        let h = harness();
        registered(&h);

        let err = h.registry.rename("demo-cluster@1.2.3.4", "edge@5.6.7.8").unwrap_err();
        assert_eq!(err.status(), Status::Conflict);

        assert_eq!(h.registry.resolve("demo-cluster@1.2.3.4").unwrap(), demo());
        assert_eq!(
            h.registry.resolve("edge@5.6.7.8").unwrap(),
            ClusterId::new("5.6.7.8", "edge")
        );
        assert_eq!(
            h.store.get_worker_metadata(&demo()).unwrap().unwrap().alias,
            "demo-cluster@1.2.3.4"
        );
    }

    #[test]
    fn dangling_alias_is_not_found() {
        let h = harness();
        h.store
            .insert_alias(&AliasEntry {
                alias: "ghost".to_string(),
                target: demo(),
            })
            .unwrap();

        let err = h.registry.resolve("ghost").unwrap_err();
        assert_eq!(err.status(), Status::NotFound);
        assert!(h.registry.list_by_alias().unwrap().is_empty());
    }

    #[test]
    fn set_metadata_rejects_unknown_type() {
        let h = harness();
        registered(&h);

        let mut meta = Metadata::new();
        meta.insert("type".into(), "spaceship".into());
        let err = h
            .registry
            .set_metadata(&WorkerSelector::Alias("edge@5.6.7.8".into()), meta, None)
            .unwrap_err();
        assert_eq!(err.status(), Status::InvalidParameter);
    }

    #[test]
    fn set_metadata_with_rename() {
        let h = harness();
        registered(&h);

        let mut meta = Metadata::new();
        meta.insert("type".into(), "edge_server".into());
        meta.insert("floor".into(), 3.into());
        h.registry
            .set_metadata(
                &WorkerSelector::Alias("edge@5.6.7.8".into()),
                meta.clone(),
                Some("robot-arm"),
            )
            .unwrap();

        let view = h.registry.get_by_alias("robot-arm").unwrap();
        assert_eq!(view.metadata, meta);
        assert_eq!(view.platform, Platform::Docker);
        assert_eq!(view.alias.as_deref(), Some("robot-arm"));
    }

    #[test]
    fn listings_carry_platform() {
        let h = harness();
        registered(&h);

        let mut live = h.registry.list_live().unwrap();
        live.sort_by(|a, b| a.address.cmp(&b.address));
        assert_eq!(live.len(), 2);
        assert_eq!(live[0].platform, Platform::Kubernetes);
        assert!(live[0].alias.is_none());

        let by_alias = h.registry.list_by_alias().unwrap();
        assert!(by_alias.iter().all(|v| v.alias.is_some()));
    }

    #[test]
    fn list_with_refresh_runs_sweep() {
        let h = harness();
        h.registry
            .heartbeat("w1", params("1.2.3.4", "demo-cluster", false))
            .unwrap();

        assert!(h.registry.list(false).unwrap().is_empty());
        assert_eq!(h.registry.list(true).unwrap().len(), 1);
    }
}
