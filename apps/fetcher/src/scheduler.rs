//! Fixed-tick loop that refreshes stale providers.

use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::main_lib::AppState;

/// Runs fetch-stale on every tick until Ctrl-C. The first tick fires
/// immediately.
pub async fn run_stale_loop(state: &AppState, every: Duration) -> anyhow::Result<()> {
    info!("Stale-provider loop started ({}s interval)", every.as_secs());

    let mut ticker = interval(every);
    // A slow pass must not cause a burst of catch-up passes.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => run_pass(state).await,
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Shutdown requested, stopping loop");
                return Ok(());
            }
        }
    }
}

async fn run_pass(state: &AppState) {
    let response = state.actions.fetch_stale().await;
    if response.success {
        info!("{}", response.message);
    } else {
        warn!("{}", response.message);
    }
    for result in response.results.iter().filter(|r| r.error.is_some()) {
        warn!(
            "Provider {} failed: {}",
            result.provider_id,
            result.error.as_deref().unwrap_or_default()
        );
    }
}
