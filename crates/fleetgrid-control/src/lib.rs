//! fleetgrid-control — the Cluster Control API seam.
//!
//! Every remote mutation the orchestrator performs (namespace creation,
//! deploy/undeploy, admin commands) and every remote read (cluster list,
//! container status) goes through the `ClusterControl` trait.
//!
//! Two implementations ship with the crate:
//!
//! - `HttpClusterControl`: JSON over HTTP with the `{result}` /
//!   `{errMessage}` envelope and a configurable request timeout.
//! - `MemoryClusterControl`: an in-process fake for tests and local runs.

pub mod client;
pub mod error;
pub mod http;
pub mod memory;
pub mod types;

pub use client::ClusterControl;
pub use error::{ControlError, ControlResult};
pub use http::HttpClusterControl;
pub use memory::MemoryClusterControl;
pub use types::*;
