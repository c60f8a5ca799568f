//! Periodic housekeeping for the cache and circuit breakers
//!
//! Expired cache entries are also ignored on read, and open circuits also
//! move to half-open on the next check, so the sweeps only keep memory and
//! snapshots tidy. Nothing depends on them for correctness.

use std::sync::Arc;
use std::time::Duration;

use courier_common::cache::ResponseCache;
use courier_common::resilience::CircuitBreakerRegistry;
use courier_domain::ApiResponse;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use super::Dispatcher;

/// What one maintenance pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceReport {
    pub expired_entries: usize,
    pub circuits_half_opened: usize,
}

struct MaintenanceContext {
    cache: Arc<ResponseCache<ApiResponse>>,
    circuits: Arc<CircuitBreakerRegistry>,
    cache_every: Duration,
    circuit_every: Duration,
}

impl Dispatcher {
    /// Run both sweeps once
    pub fn run_maintenance(&self) -> MaintenanceReport {
        MaintenanceReport {
            expired_entries: self.cache.sweep_expired(),
            circuits_half_opened: self.circuits.sweep(),
        }
    }

    /// Spawn the sweep loop on the current runtime
    ///
    /// The cache is swept every `cache.sweep_interval` and the breakers every
    /// `circuit.sweep_interval` until `shutdown` is cancelled.
    #[instrument(skip(self, shutdown))]
    pub fn spawn_maintenance(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let context = MaintenanceContext {
            cache: Arc::clone(&self.cache),
            circuits: Arc::clone(&self.circuits),
            cache_every: self.config.cache.sweep_interval,
            circuit_every: self.config.circuit.sweep_interval,
        };

        info!(
            cache_every = ?context.cache_every,
            circuit_every = ?context.circuit_every,
            "starting dispatcher maintenance"
        );
        tokio::spawn(maintenance_loop(context, shutdown))
    }
}

async fn maintenance_loop(context: MaintenanceContext, cancel: CancellationToken) {
    let MaintenanceContext { cache, circuits, cache_every, circuit_every } = context;

    let mut cache_tick = tokio::time::interval_at(tokio::time::Instant::now() + cache_every, cache_every);
    let mut circuit_tick =
        tokio::time::interval_at(tokio::time::Instant::now() + circuit_every, circuit_every);
    cache_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    circuit_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Maintenance loop cancelled");
                break;
            }
            _ = cache_tick.tick() => {
                let removed = cache.sweep_expired();
                if removed > 0 {
                    debug!(removed, "swept expired cache entries");
                }
            }
            _ = circuit_tick.tick() => {
                let transitioned = circuits.sweep();
                if transitioned > 0 {
                    debug!(transitioned, "swept open circuits");
                }
            }
        }
    }
}
