//! Engine configuration, read from the environment with workable defaults.

use serde::{Deserialize, Serialize};

use crate::error::{FeedError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub fanout: FanoutConfig,
    #[serde(default)]
    pub trending: TrendingConfig,
    #[serde(default)]
    pub graph: GraphConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Per-command deadline. Past it the store counts as unavailable.
    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanoutConfig {
    /// Follower count at which an author is handled as a celebrity
    /// (inclusive: exactly this many followers already qualifies).
    #[serde(default = "default_celebrity_threshold")]
    pub celebrity_threshold: u64,
    /// Most recent entries kept per home timeline.
    #[serde(default = "default_timeline_cap")]
    pub timeline_cap: u64,
    /// Most recent entries kept per celebrity outbox. At most `timeline_cap`.
    #[serde(default = "default_outbox_cap")]
    pub outbox_cap: u64,
    /// Follower deliveries per pipelined batch.
    #[serde(default = "default_fanout_chunk_size")]
    pub chunk_size: usize,
    /// Optional whole-key expiry for timelines and outboxes of idle users.
    #[serde(default)]
    pub timeline_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendingConfig {
    /// Entries published to the trending feed per refresh.
    #[serde(default = "default_trending_size")]
    pub trending_size: u64,
    /// Entries published to the guest feed per refresh. At most `trending_size`.
    #[serde(default = "default_guest_size")]
    pub guest_size: u64,
    /// Expiry on published feeds. A missed refresh leaves no immortal data.
    #[serde(default = "default_trending_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Random spread added per cycle so replicas do not refresh in lockstep.
    #[serde(default = "default_refresh_jitter_secs")]
    pub refresh_jitter_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Logical freshness window for cached follower/followee sets.
    #[serde(default = "default_graph_ttl_secs")]
    pub ttl_secs: u64,
    /// How long stale graph data stays servable while the source is down.
    #[serde(default = "default_graph_stale_grace_secs")]
    pub stale_grace_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config = Config {
            redis: RedisConfig {
                url: std::env::var("REDIS_URL").unwrap_or_else(|_| default_redis_url()),
                op_timeout_ms: env_or("STORE_OP_TIMEOUT_MS", default_op_timeout_ms),
            },
            fanout: FanoutConfig {
                celebrity_threshold: env_or("CELEBRITY_THRESHOLD", default_celebrity_threshold),
                timeline_cap: env_or("TIMELINE_CAP", default_timeline_cap),
                outbox_cap: env_or("OUTBOX_CAP", default_outbox_cap),
                chunk_size: env_or("FANOUT_CHUNK_SIZE", default_fanout_chunk_size),
                timeline_ttl_secs: std::env::var("TIMELINE_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok()),
            },
            trending: TrendingConfig {
                trending_size: env_or("TRENDING_SIZE", default_trending_size),
                guest_size: env_or("GUEST_FEED_SIZE", default_guest_size),
                ttl_secs: env_or("TRENDING_TTL_SECS", default_trending_ttl_secs),
                refresh_interval_secs: env_or(
                    "TRENDING_REFRESH_INTERVAL_SECS",
                    default_refresh_interval_secs,
                ),
                refresh_jitter_secs: env_or(
                    "TRENDING_REFRESH_JITTER_SECS",
                    default_refresh_jitter_secs,
                ),
            },
            graph: GraphConfig {
                ttl_secs: env_or("GRAPH_TTL_SECS", default_graph_ttl_secs),
                stale_grace_secs: env_or("GRAPH_STALE_GRACE_SECS", default_graph_stale_grace_secs),
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fanout.timeline_cap == 0 {
            return Err(FeedError::Config("timeline_cap must be at least 1".into()));
        }
        if self.fanout.outbox_cap == 0 || self.fanout.outbox_cap > self.fanout.timeline_cap {
            return Err(FeedError::Config(
                "outbox_cap must be between 1 and timeline_cap".into(),
            ));
        }
        if self.fanout.chunk_size == 0 {
            return Err(FeedError::Config("fanout chunk_size must be nonzero".into()));
        }
        if self.trending.trending_size == 0 {
            return Err(FeedError::Config("trending_size must be at least 1".into()));
        }
        if self.trending.guest_size > self.trending.trending_size {
            return Err(FeedError::Config(
                "guest_size cannot exceed trending_size".into(),
            ));
        }
        if self.graph.stale_grace_secs < self.graph.ttl_secs {
            return Err(FeedError::Config(
                "graph stale_grace_secs must cover ttl_secs".into(),
            ));
        }
        Ok(())
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: fn() -> T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(default)
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            op_timeout_ms: default_op_timeout_ms(),
        }
    }
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            celebrity_threshold: default_celebrity_threshold(),
            timeline_cap: default_timeline_cap(),
            outbox_cap: default_outbox_cap(),
            chunk_size: default_fanout_chunk_size(),
            timeline_ttl_secs: None,
        }
    }
}

impl Default for TrendingConfig {
    fn default() -> Self {
        Self {
            trending_size: default_trending_size(),
            guest_size: default_guest_size(),
            ttl_secs: default_trending_ttl_secs(),
            refresh_interval_secs: default_refresh_interval_secs(),
            refresh_jitter_secs: default_refresh_jitter_secs(),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_graph_ttl_secs(),
            stale_grace_secs: default_graph_stale_grace_secs(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_op_timeout_ms() -> u64 {
    2000
}

fn default_celebrity_threshold() -> u64 {
    500
}

fn default_timeline_cap() -> u64 {
    800
}

fn default_outbox_cap() -> u64 {
    200
}

fn default_fanout_chunk_size() -> usize {
    1000
}

fn default_trending_size() -> u64 {
    200
}

fn default_guest_size() -> u64 {
    100
}

fn default_trending_ttl_secs() -> u64 {
    300
}

fn default_refresh_interval_secs() -> u64 {
    300
}

fn default_refresh_jitter_secs() -> u64 {
    15
}

fn default_graph_ttl_secs() -> u64 {
    300
}

fn default_graph_stale_grace_secs() -> u64 {
    1800
}
