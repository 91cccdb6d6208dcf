//! redb table definitions for the FleetGrid state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized records).
//! Cluster identities are keyed as `{clusterName}@{address}`.

use redb::TableDefinition;

// ── Live state ────────────────────────────────────────────────────

/// Worker heartbeats keyed by producer id (`worker/info/{id}`).
pub const WORKER_INFO: TableDefinition<&str, &[u8]> = TableDefinition::new("worker_info");

/// Container records keyed by `{cluster}/{container_id}`.
pub const CONTAINERS: TableDefinition<&str, &[u8]> = TableDefinition::new("containers");

// ── Documents ─────────────────────────────────────────────────────

/// Worker metadata keyed by `{cluster}`.
pub const WORKER_METADATA: TableDefinition<&str, &[u8]> =
    TableDefinition::new("worker_metadata");

/// Alias index keyed by alias.
pub const ALIASES: TableDefinition<&str, &[u8]> = TableDefinition::new("aliases");

/// Liveness markers keyed by `{cluster}`.
pub const LIVENESS: TableDefinition<&str, &[u8]> = TableDefinition::new("liveness");

/// Namespace records keyed by `{cluster}/{tenant}`.
pub const NAMESPACES: TableDefinition<&str, &[u8]> = TableDefinition::new("namespaces");

/// Deployment records keyed by `{tenant}/{container_id}`.
pub const DEPLOYMENT_RECORDS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("deployment_records");
