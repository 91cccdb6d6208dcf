//! fleetgrid-registry — the live set of workers.
//!
//! Workers announce themselves by writing heartbeat records into the
//! `LiveStore`. The `WorkerRegistry` periodically sweeps those records,
//! evicting workers whose last heartbeat is older than the stale
//! threshold and registering new ones in the `DocumentStore` together
//! with an alias and a liveness marker.
//!
//! The `SweepScheduler` drives the sweep on a fixed interval until it
//! is stopped.

pub mod error;
pub mod registry;
pub mod scheduler;

pub use error::{RegistryError, RegistryResult};
pub use registry::{SweepOutcome, SweepReport, WorkerRegistry, WorkerSelector, WorkerView};
pub use scheduler::SweepScheduler;
