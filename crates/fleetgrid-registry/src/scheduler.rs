//! Fixed-interval driver for `WorkerRegistry::sweep`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::registry::{SweepOutcome, WorkerRegistry};

/// Handle to a running sweep loop. Dropping it without `stop` leaves the
/// loop running until the runtime shuts down.
pub struct SweepScheduler {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SweepScheduler {
    /// Spawn the loop. The first sweep runs after one full interval.
    pub fn start(registry: Arc<WorkerRegistry>, interval: Duration) -> Self {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "sweep scheduler started");
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        match registry.sweep() {
                            Ok(SweepOutcome::Completed(_)) => {}
                            Ok(SweepOutcome::Skipped) => debug!("scheduled sweep skipped"),
                            Err(e) => error!(error = %e, "scheduled sweep failed"),
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        info!("sweep scheduler shutting down");
                        break;
                    }
                }
            }
        });

        Self { shutdown, handle }
    }

    /// Signal the loop and wait for it to exit. A sweep in progress finishes first.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}
