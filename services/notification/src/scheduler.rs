//! Scheduler Trigger
//!
//! Fixed-interval timer driving the dispatch engine's sweep.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::dispatch::{EmailDispatcher, EmailTransport, PendingEmailStore};

/// Spawn the periodic sweep timer.
///
/// Every tick launches the sweep as its own task: a sweep slower than the
/// interval never delays the next tick, and overlapping sweeps are accepted.
pub fn spawn_sweep_timer<S, T>(
    dispatcher: EmailDispatcher<S, T>,
    interval: Duration,
) -> JoinHandle<()>
where
    S: PendingEmailStore,
    T: EmailTransport,
{
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher.run_scheduled_sweep().await;
            });
        }
    })
}
