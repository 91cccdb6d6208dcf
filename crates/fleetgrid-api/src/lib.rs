//! fleetgrid-api — REST API for FleetGrid.
//!
//! Provides axum route handlers for the worker registry, deploys, and
//! container operations. Every route requires the `tokenName` and
//! `authToken` headers; email-scoped routes accept an optional `email`.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/workers` | Live workers (`?refresh=true` sweeps first) |
//! | GET | `/api/v1/workers/aliases` | Workers listed through the alias index |
//! | GET | `/api/v1/workers/alias/{alias}` | One worker by alias |
//! | POST | `/api/v1/workers/metadata` | Replace metadata, optionally rename |
//! | POST | `/api/v1/workers/heartbeat` | Record a heartbeat |
//! | POST | `/api/v1/workers/sweep` | Run one sweep now |
//! | POST | `/api/v1/workers/namespaces/purge` | Forget a cluster's namespaces |
//! | POST | `/api/v1/cluster/deploy` | Deploy to a Kubernetes-style cluster |
//! | POST | `/api/v1/cluster/undeploy` | Undeploy from a Kubernetes-style cluster |
//! | POST | `/api/v1/machine/deploy` | Deploy to a Docker-style host |
//! | POST | `/api/v1/machine/undeploy` | Undeploy from a Docker-style host |
//! | GET | `/api/v1/containers` | Containers on a cluster |
//! | GET | `/api/v1/deployments` | The caller's deployment records |
//! | POST | `/api/v1/container/sync` | Replace sync replicas |
//! | POST | `/api/v1/container/rollback/set` | Configure the rollback image |
//! | POST | `/api/v1/container/rollback` | Roll back |
//! | POST | `/api/v1/container/update` | Change image and ports |
//! | POST/DELETE | `/api/v1/container/autoscaler` | Attach / detach an autoscaler |

pub mod auth;
pub mod container_handlers;
pub mod error;
pub mod extract;
pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use fleetgrid_orchestrator::Orchestrator;
use fleetgrid_registry::WorkerRegistry;

pub use auth::{AuthError, Authenticator, KeyringAuthenticator};
pub use error::{ApiError, ApiResponse, http_status};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub registry: Arc<WorkerRegistry>,
    pub orchestrator: Arc<Orchestrator>,
    pub auth: Arc<dyn Authenticator>,
}

/// Build the complete API router.
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/workers", get(handlers::list_workers))
        .route("/workers/aliases", get(handlers::list_workers_by_alias))
        .route("/workers/alias/{alias}", get(handlers::get_worker))
        .route("/workers/metadata", post(handlers::set_worker_metadata))
        .route("/workers/heartbeat", post(handlers::heartbeat))
        .route("/workers/sweep", post(handlers::sweep))
        .route("/workers/namespaces/purge", post(handlers::purge_namespaces))
        .route("/cluster/deploy", post(handlers::deploy_cluster))
        .route("/cluster/undeploy", post(handlers::undeploy_cluster))
        .route("/machine/deploy", post(handlers::deploy_machine))
        .route("/machine/undeploy", post(handlers::undeploy_machine))
        .route("/containers", get(handlers::list_containers))
        .route("/deployments", get(handlers::list_deployments))
        .route("/container/sync", post(container_handlers::set_sync))
        .route("/container/rollback/set", post(container_handlers::set_rollback))
        .route("/container/rollback", post(container_handlers::rollback))
        .route("/container/update", post(container_handlers::update))
        .route(
            "/container/autoscaler",
            post(container_handlers::set_autoscaler).delete(container_handlers::delete_autoscaler),
        )
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}
