//! Background cache sweep.
//!
//! Drops router cache entries whose recorded TTL has passed so the cache does
//! not grow without bound between reads.

use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info};

use crate::main_lib::AppState;

/// Starts the periodic cache sweep.
pub fn start_cache_sweep_scheduler(state: Arc<AppState>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        info!("Cache sweep scheduler started ({}s interval)", every.as_secs());

        let mut sweep_interval = interval(every);
        sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        sweep_interval.tick().await;

        loop {
            sweep_interval.tick().await;
            run_sweep(&state);
        }
    })
}

fn run_sweep(state: &AppState) {
    let removed = state.router.sweep_cache();
    let stats = state.router.cache_stats();
    debug!(
        "Cache sweep removed {} entries, {} remain",
        removed, stats.total_entries
    );
}
