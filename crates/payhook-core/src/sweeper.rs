//! Retention sweeper for processed-webhook records.
//!
//! Correctness never depends on timely deletion: a record only has to exist
//! while a gateway might still redeliver the event. The sweeper just keeps the
//! store bounded by purging records past `expires_at`.

use crate::idempotency::{IdempotencyStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

/// Periodic purge of expired idempotency records
pub struct RetentionSweeper {
    store: Arc<dyn IdempotencyStore>,
    interval: Duration,
}

impl RetentionSweeper {
    pub fn new(store: Arc<dyn IdempotencyStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Purge once using the store's clock
    #[instrument(skip(self))]
    pub async fn sweep_once(&self) -> Result<usize, StoreError> {
        let now = self.store.now();
        let purged = self.store.purge_expired(now).await?;
        if purged > 0 {
            info!(purged, "Purged expired processed-webhook records");
        } else {
            debug!("No expired processed-webhook records");
        }
        Ok(purged)
    }

    /// Sweep on every tick until `shutdown` flips to `true` or its sender drops.
    ///
    /// The first sweep runs immediately. Sweep failures are logged and the
    /// loop continues.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_secs = self.interval.as_secs(), "Retention sweeper started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        warn!(error = %e, "Retention sweep failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Retention sweeper stopped");
    }

    /// Run on a background task
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
#[path = "sweeper_tests.rs"]
mod tests;
