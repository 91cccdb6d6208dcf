//! fleetgrid-orchestrator — deploys and day-two operations.
//!
//! Turns a tenant's deploy request into a running container: allocate the
//! tenant's namespace on the target cluster, pick a node pool, call the
//! Cluster Control API, and record the result. Once deployed, a container
//! can be replicated to Docker-style hosts (sync), reverted to a recorded
//! fallback (rollback), updated in place, and given an autoscaler.
//!
//! Every operation returns `OrchestratorResult`; `OrchestratorError::status`
//! maps failures onto the shared `Status` vocabulary.

pub mod commands;
pub mod config;
pub mod controller;
pub mod deploy;
pub mod error;
pub mod namespace;
pub mod wallet;

pub use config::OrchestratorConfig;
pub use controller::SyncTargetRequest;
pub use deploy::{Caller, ContainerRow, DeployParams, DeployPhase, DeployReceipt, Orchestrator};
pub use error::{OrchestratorError, OrchestratorResult};
pub use namespace::NamespaceAllocator;
