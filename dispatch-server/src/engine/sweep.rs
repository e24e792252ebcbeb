//! Periodic sweep driver
//!
//! One loop drives all three sweeps (formation deadlines, overdue solo
//! dispatch, stale offers) on a fixed interval. The loop is registered
//! as a Periodic background task and stops on the shutdown token.

use crate::engine::DispatchEngine;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub async fn sweeper_loop(engine: Arc<DispatchEngine>, shutdown: CancellationToken) {
    let mut interval =
        tokio::time::interval(Duration::from_secs(engine.config().sweep_interval_secs));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                // Spawned dispatches run to completion on their own.
                let _ = engine.run_sweeps(Utc::now());
            }
        }
    }
    tracing::debug!("Sweeper stopped");
}
