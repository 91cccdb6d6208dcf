//! StateStore — redb-backed persistence for FleetGrid.
//!
//! Implements both `DocumentStore` and `LiveStore` over one database. All
//! values are JSON-serialized into redb's `&[u8]` value columns. The store
//! supports both on-disk and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, TableHandle};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::backend::{DocumentStore, LiveStore};
use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

type Table = TableDefinition<'static, &'static str, &'static [u8]>;

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        for table in [
            WORKER_INFO,
            CONTAINERS,
            WORKER_METADATA,
            ALIASES,
            LIVENESS,
            NAMESPACES,
            DEPLOYMENT_RECORDS,
        ] {
            txn.open_table(table).map_err(map_err!(Table))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Generic row access ─────────────────────────────────────────

    fn put_row<T: Serialize>(&self, table: Table, key: &str, value: &T) -> StateResult<()> {
        let bytes = serde_json::to_vec(value).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut t = txn.open_table(table).map_err(map_err!(Table))?;
            t.insert(key, bytes.as_slice()).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(table = table.name(), %key, "row stored");
        Ok(())
    }

    fn get_row<T: DeserializeOwned>(&self, table: Table, key: &str) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let t = txn.open_table(table).map_err(map_err!(Table))?;
        match t.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let value = serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn delete_row(&self, table: Table, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut t = txn.open_table(table).map_err(map_err!(Table))?;
            existed = t.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(table = table.name(), %key, existed, "row deleted");
        Ok(existed)
    }

    /// Insert `value` unless `key` is taken. Returns the row already there, if any.
    fn insert_row_if_absent<T>(&self, table: Table, key: &str, value: &T) -> StateResult<Option<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        let bytes = serde_json::to_vec(value).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existing: Option<T>;
        {
            let mut t = txn.open_table(table).map_err(map_err!(Table))?;
            existing = match t.get(key).map_err(map_err!(Read))? {
                Some(guard) => {
                    Some(serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?)
                }
                None => None,
            };
            if existing.is_none() {
                t.insert(key, bytes.as_slice()).map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(table = table.name(), %key, inserted = existing.is_none(), "conditional insert");
        Ok(existing)
    }

    /// All rows whose key starts with `prefix`, with their keys.
    fn scan_rows<T: DeserializeOwned>(
        &self,
        table: Table,
        prefix: &str,
    ) -> StateResult<Vec<(String, T)>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let t = txn.open_table(table).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in t.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(prefix) {
                let row: T =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                results.push((key.value().to_string(), row));
            }
        }
        Ok(results)
    }

    fn scan_values<T: DeserializeOwned>(&self, table: Table, prefix: &str) -> StateResult<Vec<T>> {
        Ok(self
            .scan_rows(table, prefix)?
            .into_iter()
            .map(|(_, row)| row)
            .collect())
    }
}

impl DocumentStore for StateStore {
    fn get_worker_metadata(&self, cluster: &ClusterId) -> StateResult<Option<WorkerMetadata>> {
        self.get_row(WORKER_METADATA, &cluster.key())
    }

    fn put_worker_metadata(&self, doc: &WorkerMetadata) -> StateResult<()> {
        self.put_row(WORKER_METADATA, &doc.table_key(), doc)
    }

    fn delete_worker_metadata(&self, cluster: &ClusterId) -> StateResult<bool> {
        self.delete_row(WORKER_METADATA, &cluster.key())
    }

    fn get_alias(&self, alias: &str) -> StateResult<Option<AliasEntry>> {
        self.get_row(ALIASES, alias)
    }

    fn insert_alias(&self, entry: &AliasEntry) -> StateResult<bool> {
        Ok(self
            .insert_row_if_absent(ALIASES, &entry.alias, entry)?
            .is_none())
    }

    fn delete_alias(&self, alias: &str) -> StateResult<bool> {
        self.delete_row(ALIASES, alias)
    }

    fn list_aliases(&self) -> StateResult<Vec<AliasEntry>> {
        self.scan_values(ALIASES, "")
    }

    fn get_liveness(&self, cluster: &ClusterId) -> StateResult<Option<LivenessMarker>> {
        self.get_row(LIVENESS, &cluster.key())
    }

    fn put_liveness(&self, marker: &LivenessMarker) -> StateResult<()> {
        self.put_row(LIVENESS, &marker.table_key(), marker)
    }

    fn delete_liveness(&self, cluster: &ClusterId) -> StateResult<bool> {
        self.delete_row(LIVENESS, &cluster.key())
    }

    fn list_liveness(&self) -> StateResult<Vec<LivenessMarker>> {
        self.scan_values(LIVENESS, "")
    }

    fn get_namespace(
        &self,
        tenant: &TenantId,
        cluster: &ClusterId,
    ) -> StateResult<Option<NamespaceRecord>> {
        self.get_row(NAMESPACES, &namespace_key(tenant, cluster))
    }

    fn insert_namespace(&self, record: &NamespaceRecord) -> StateResult<NamespaceRecord> {
        let existing = self.insert_row_if_absent(NAMESPACES, &record.table_key(), record)?;
        Ok(existing.unwrap_or_else(|| record.clone()))
    }

    fn delete_namespace(&self, tenant: &TenantId, cluster: &ClusterId) -> StateResult<bool> {
        self.delete_row(NAMESPACES, &namespace_key(tenant, cluster))
    }

    fn list_namespaces_for_cluster(&self, cluster: &ClusterId) -> StateResult<Vec<NamespaceRecord>> {
        let records: Vec<NamespaceRecord> = self.scan_values(NAMESPACES, &format!("{}/", cluster.key()))?;
        // Names may contain '/', so the prefix alone can over-match.
        Ok(records.into_iter().filter(|r| r.cluster == *cluster).collect())
    }

    fn put_deployment_record(&self, record: &DeploymentRecord) -> StateResult<()> {
        self.put_row(DEPLOYMENT_RECORDS, &record.table_key(), record)
    }

    fn get_deployment_record(
        &self,
        tenant: &TenantId,
        container_id: &str,
    ) -> StateResult<Option<DeploymentRecord>> {
        self.get_row(DEPLOYMENT_RECORDS, &deployment_record_key(tenant, container_id))
    }

    fn delete_deployment_record(&self, tenant: &TenantId, container_id: &str) -> StateResult<bool> {
        self.delete_row(DEPLOYMENT_RECORDS, &deployment_record_key(tenant, container_id))
    }

    fn list_deployment_records(&self, tenant: &TenantId) -> StateResult<Vec<DeploymentRecord>> {
        let records: Vec<DeploymentRecord> =
            self.scan_values(DEPLOYMENT_RECORDS, &format!("{}/", tenant.key()))?;
        Ok(records.into_iter().filter(|r| r.tenant == *tenant).collect())
    }
}

impl LiveStore for StateStore {
    fn list_workers(&self) -> StateResult<Vec<(String, WorkerRecord)>> {
        self.scan_rows(WORKER_INFO, "")
    }

    fn put_worker(&self, id: &str, record: &WorkerRecord) -> StateResult<()> {
        self.put_row(WORKER_INFO, id, record)
    }

    fn delete_worker(&self, id: &str) -> StateResult<bool> {
        self.delete_row(WORKER_INFO, id)
    }

    fn get_container(
        &self,
        cluster: &ClusterId,
        container_id: &str,
    ) -> StateResult<Option<ContainerRecord>> {
        self.get_row(CONTAINERS, &container_key(cluster, container_id))
    }

    fn put_container(&self, record: &ContainerRecord) -> StateResult<()> {
        self.put_row(CONTAINERS, &record.table_key(), record)
    }

    fn delete_container(&self, cluster: &ClusterId, container_id: &str) -> StateResult<bool> {
        self.delete_row(CONTAINERS, &container_key(cluster, container_id))
    }

    fn list_containers(&self, cluster: &ClusterId) -> StateResult<Vec<ContainerRecord>> {
        let records: Vec<ContainerRecord> = self.scan_values(CONTAINERS, &format!("{}/", cluster.key()))?;
        Ok(records.into_iter().filter(|r| r.cluster == *cluster).collect())
    }
}
