//! # Expiry Sweep
//!
//! Periodic cleanup of expired, unused voucher instances from the
//! user-visible inventory.
//!
//! Advisory only: correctness never depends on the sweep having run, and
//! instances referenced by an active non-cancelled order are excluded by
//! the purge query itself, so the task is safe to run concurrently with
//! checkout, cancellation and admin edits.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use emporia_db::Database;

/// Handle to a running sweep task.
///
/// Dropping the handle does NOT stop the task; call [`shutdown`] for an
/// orderly stop.
///
/// [`shutdown`]: SweepHandle::shutdown
#[derive(Debug)]
pub struct SweepHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl SweepHandle {
    /// Signals the sweep task to stop after its current iteration.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// Spawns the periodic expiry sweep.
///
/// Runs one purge every `interval` until shut down. Purge failures are
/// logged and the loop continues; a missed sweep only delays display
/// cleanup.
pub fn spawn_expiry_sweep(db: Database, interval: Duration) -> SweepHandle {
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "Expiry sweep started");
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so spawning is cheap
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match db.redeemed().purge_expired(Utc::now()).await {
                        Ok(0) => debug!("Expiry sweep: nothing to purge"),
                        Ok(purged) => info!(purged, "Expiry sweep purged instances"),
                        Err(err) => warn!(error = %err, "Expiry sweep failed"),
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Expiry sweep shutting down");
                    break;
                }
            }
        }
    });

    SweepHandle { shutdown_tx }
}

// =============================================================================
// Service Tests
// =============================================================================
