//! fleetgrid-state — records and storage for FleetGrid.
//!
//! Holds the domain records shared by the registry and the orchestrator,
//! the two storage seams they talk through, and a redb-backed store that
//! implements both.
//!
//! # Architecture
//!
//! ```text
//! DocumentStore (durable)            LiveStore (low latency)
//!   ├── worker metadata                ├── worker heartbeats
//!   ├── alias index                    └── container records
//!   ├── liveness markers
//!   ├── namespace records
//!   └── deployment records
//! ```
//!
//! All records are JSON-serialized into redb's `&[u8]` value columns.
//! Composite keys (`{clusterName}@{address}/{containerId}`,
//! `{tenant}/{containerId}`) enable prefix scans for related records.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod backend;
pub mod clock;
pub mod error;
pub mod status;
pub mod store;
pub mod tables;
pub mod types;

pub use backend::{DocumentStore, LiveStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{StateError, StateResult};
pub use status::Status;
pub use store::StateStore;
pub use types::*;
