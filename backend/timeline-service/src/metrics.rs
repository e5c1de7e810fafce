//! Distribution Engine Metrics
//!
//! Prometheus metrics for fan-out delivery, trending refresh and graph cache health

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, HistogramVec,
    IntCounterVec, IntGauge,
};
use std::time::Duration;

static FANOUT_POSTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "timeline_fanout_posts_total",
        "Posts handled by the fan-out engine, by mode and outcome",
        &["mode", "outcome"]
    )
    .expect("Failed to register fanout posts metric")
});

static FANOUT_DELIVERIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "timeline_fanout_deliveries_total",
        "Per-timeline deliveries attempted by the fan-out engine",
        &["outcome"]
    )
    .expect("Failed to register fanout deliveries metric")
});

static FANOUT_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "timeline_fanout_duration_seconds",
        "Duration of one fan-out pass",
        &["mode"],
        vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]
    )
    .expect("Failed to register fanout duration metric")
});

static TRENDING_REFRESH_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "trending_refresh_total",
        "Trending refresh cycles (refreshed/empty/error)",
        &["status"]
    )
    .expect("Failed to register trending refresh metric")
});

static TRENDING_LAST_PUBLISHED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "trending_last_published_entries",
        "Entries published to the trending feed by the last successful refresh"
    )
    .expect("Failed to register trending published metric")
});

static GRAPH_CACHE_LOOKUPS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "graph_cache_lookups_total",
        "Social graph cache lookups (hit/refresh/stale/empty)",
        &["outcome"]
    )
    .expect("Failed to register graph cache lookups metric")
});

/// Record one fan-out pass (outcome: complete/partial/skipped)
pub fn record_fanout_post(mode: &str, outcome: &str) {
    FANOUT_POSTS_TOTAL.with_label_values(&[mode, outcome]).inc();
}

/// Record attempted per-timeline deliveries (outcome: delivered/dropped)
pub fn record_fanout_deliveries(outcome: &str, count: u64) {
    FANOUT_DELIVERIES_TOTAL
        .with_label_values(&[outcome])
        .inc_by(count);
}

/// Record duration of one fan-out pass
pub fn record_fanout_duration(mode: &str, duration: Duration) {
    FANOUT_DURATION_SECONDS
        .with_label_values(&[mode])
        .observe(duration.as_secs_f64());
}

/// Record trending refresh cycle result (refreshed/empty/error)
pub fn record_trending_refresh(status: &str) {
    TRENDING_REFRESH_TOTAL.with_label_values(&[status]).inc();
}

/// Set entries published by the last successful trending refresh
pub fn set_trending_published(count: i64) {
    TRENDING_LAST_PUBLISHED.set(count);
}

/// Record graph cache lookup outcome (hit/refresh/stale/empty)
pub fn record_graph_lookup(outcome: &str) {
    GRAPH_CACHE_LOOKUPS_TOTAL.with_label_values(&[outcome]).inc();
}
