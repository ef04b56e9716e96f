//! Liveness reaper: evicts players that stopped talking.
//!
//! Every `interval` the reaper asks each room to sweep itself. The sweep
//! is a command on the room's own queue, so it is serialized with the
//! room's message handling like anything else.

use std::sync::Arc;
use std::time::Duration;

use volley_room::{RoomError, SessionRegistry, SweepReport};
use volley_tick::{TickConfig, TickScheduler};

/// Periodic sweeper over every room in a [`SessionRegistry`].
pub struct Reaper {
    registry: Arc<SessionRegistry>,
    interval: Duration,
    timeout: Duration,
}

impl Reaper {
    pub fn new(registry: Arc<SessionRegistry>, interval: Duration, timeout: Duration) -> Self {
        Self {
            registry,
            interval,
            timeout,
        }
    }

    /// Sweeps every room once.
    ///
    /// Rooms left empty by the sweep, and rooms whose actor has already
    /// retired, are dropped from the registry. Returns the report of each
    /// room that answered.
    pub async fn sweep_once(&self) -> Vec<SweepReport> {
        let handles = self.registry.handles().await;
        let mut reports = Vec::with_capacity(handles.len());

        for handle in handles {
            match handle.sweep(self.timeout).await {
                Ok(report) => {
                    if report.remaining == 0 {
                        self.registry
                            .remove_if_retired(handle.game_id(), &handle)
                            .await;
                    }
                    reports.push(report);
                }
                Err(RoomError::Unavailable(game_id)) => {
                    tracing::debug!(%game_id, "room retired before sweep");
                    self.registry.remove_if_retired(&game_id, &handle).await;
                }
                Err(e) => tracing::warn!(game_id = %handle.game_id(), error = %e, "sweep failed"),
            }
        }

        let evicted: usize = reports.iter().map(|r| r.evicted.len()).sum();
        if evicted > 0 {
            tracing::info!(rooms = reports.len(), evicted, "reaper sweep");
        } else {
            tracing::trace!(rooms = reports.len(), "reaper sweep");
        }
        reports
    }

    /// Sweeps forever on a fixed period. Spawn this as its own task.
    pub async fn run(self) {
        let mut scheduler = TickScheduler::new(TickConfig::with_period(self.interval).without_jitter());
        tracing::info!(
            interval = ?self.interval,
            timeout = ?self.timeout,
            "liveness reaper started"
        );
        loop {
            scheduler.wait_for_tick().await;
            self.sweep_once().await;
            scheduler.record_tick_end();
        }
    }
}
