// crates/gapool-rpc/src/poll.rs
//
// Background poll loop: periodically asks the chain node for the current
// job so blocks mined elsewhere reach every miner.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::shared::DispatchState;

/// Default interval between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(25);

/// Run the poll loop forever.
///
/// The first tick fires immediately, which also fills the empty cache at
/// startup. A failed poll is logged and retried on the next tick.
pub async fn run_poll_loop(state: Arc<DispatchState>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!("Poll loop started (interval={:?})", interval);

    loop {
        ticker.tick().await;
        poll_once(&state).await;
    }
}

/// Perform a single poll. Returns whether a new job was broadcast.
pub async fn poll_once(state: &DispatchState) -> bool {
    match state.refresh().await {
        Ok(changed) => changed,
        Err(e) if e.is_upstream() => {
            match state.cache().get().await {
                Ok(job) => tracing::warn!(
                    serving_since = %job.fetched_at(),
                    "Poll: could not fetch job from chain node: {}",
                    e
                ),
                Err(_) => tracing::warn!("Poll: could not fetch job from chain node: {}", e),
            }
            false
        }
        Err(e) => {
            tracing::error!("Poll failed: {}", e);
            false
        }
    }
}
