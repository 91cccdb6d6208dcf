//! Daemon wiring: state store, control client, registry, orchestrator,
//! API server, and the background sweep.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info, warn};

use fleetgrid_api::{ApiState, KeyringAuthenticator};
use fleetgrid_control::{ClusterControl, HttpClusterControl, MemoryClusterControl};
use fleetgrid_orchestrator::Orchestrator;
use fleetgrid_registry::{SweepOutcome, SweepScheduler, WorkerRegistry};
use fleetgrid_state::{Clock, StateStore, SystemClock};

use crate::config::{Config, ControlConfig};

fn open_store(config: &Config) -> anyhow::Result<StateStore> {
    std::fs::create_dir_all(&config.server.data_dir)?;
    let db_path = config.db_path();
    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");
    Ok(store)
}

fn build_control(config: &ControlConfig) -> anyhow::Result<Arc<dyn ClusterControl>> {
    match &config.base_url {
        Some(base_url) => {
            let client = HttpClusterControl::new(base_url, config.timeout())?;
            info!(%base_url, timeout_secs = config.timeout_secs, "cluster control client ready");
            Ok(Arc::new(client))
        }
        None => {
            warn!("no control.base_url configured, using an empty in-memory control plane");
            Ok(Arc::new(MemoryClusterControl::default()))
        }
    }
}

fn build_registry(config: &Config, store: &StateStore, clock: Arc<dyn Clock>) -> Arc<WorkerRegistry> {
    let registry = WorkerRegistry::new(Arc::new(store.clone()), Arc::new(store.clone()), clock)
        .with_stale_after(config.registry.stale_after());
    Arc::new(registry)
}

/// Assemble the API state from a store and control client.
pub fn build_state(config: &Config, store: &StateStore, control: Arc<dyn ClusterControl>) -> ApiState {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let orchestrator = Orchestrator::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        control,
        clock.clone(),
        config.orchestrator.clone(),
    );
    let auth = KeyringAuthenticator::new(config.auth.api_keys.clone(), config.auth.users.clone());
    if config.auth.api_keys.is_empty() {
        warn!("no auth.api_keys configured, every request will be rejected");
    }
    ApiState {
        registry: build_registry(config, store, clock),
        orchestrator: Arc::new(orchestrator),
        auth: Arc::new(auth),
    }
}

/// Run the API server and the periodic sweep until Ctrl-C.
pub async fn run_serve(config: Config) -> anyhow::Result<()> {
    info!("FleetGrid daemon starting");

    // ── Initialize subsystems ──────────────────────────────────

    let store = open_store(&config)?;
    let control = build_control(&config.control)?;
    let state = build_state(&config, &store, control);

    // ── Start background sweep ─────────────────────────────────

    let scheduler = SweepScheduler::start(state.registry.clone(), config.registry.sweep_interval());

    // ── Start API server ───────────────────────────────────────

    let router = fleetgrid_api::build_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for shutdown signal");
        }
        info!("shutdown signal received");
    });

    server.await?;

    scheduler.stop().await;

    info!("FleetGrid daemon stopped");
    Ok(())
}

/// Run one sweep against the configured store and exit.
pub fn run_sweep(config: Config) -> anyhow::Result<()> {
    let store = open_store(&config)?;
    let registry = build_registry(&config, &store, Arc::new(SystemClock));

    match registry.sweep()? {
        SweepOutcome::Completed(report) => {
            info!(?report, "sweep finished");
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        SweepOutcome::Skipped => warn!("sweep already running"),
    }
    Ok(())
}

/// Print a signed auth token for a configured token name.
pub fn run_token(config: Config, name: &str) -> anyhow::Result<()> {
    let auth = KeyringAuthenticator::new(config.auth.api_keys, config.auth.users);
    println!("{}", auth.issue(name)?);
    Ok(())
}
