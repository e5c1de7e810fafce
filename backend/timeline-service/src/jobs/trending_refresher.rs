//! Trending Refresher Background Job
//!
//! Periodically pulls candidates from the engagement source and republishes
//! the trending and guest feeds. Cycles are jittered so multiple instances
//! do not refresh in lockstep, and a failed cycle leaves the previously
//! published feeds in place until their TTL runs out.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::TrendingConfig;
use crate::services::TrendingRanker;

/// Start the trending refresher loop. Runs until the owning task is dropped.
pub async fn start_trending_refresher(ranker: Arc<TrendingRanker>, config: TrendingConfig) {
    info!(
        interval_secs = config.refresh_interval_secs,
        jitter_secs = config.refresh_jitter_secs,
        "starting trending refresher"
    );

    loop {
        sleep(cycle_delay(&config)).await;

        let cycle_start = Instant::now();
        let outcome = ranker.refresh_from_source().await;
        if outcome.refreshed {
            info!(
                ranked = outcome.ranked,
                published = outcome.published,
                duration_ms = cycle_start.elapsed().as_millis() as u64,
                "trending refresh cycle completed"
            );
        } else {
            // The cause was already logged where it happened.
            debug!(
                duration_ms = cycle_start.elapsed().as_millis() as u64,
                "trending refresh cycle left feeds unchanged"
            );
        }
    }
}

fn cycle_delay(config: &TrendingConfig) -> Duration {
    let jitter = rand::random::<u64>() % (config.refresh_jitter_secs + 1);
    Duration::from_secs(config.refresh_interval_secs + jitter)
}
