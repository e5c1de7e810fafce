//! Trending and guest feed ranking.
//!
//! Candidates come from an external engagement source (behind [`PostSource`]);
//! each is scored by engagement over squared age decay and the top slice is
//! published to two sorted sets: the full trending feed and the smaller guest
//! feed served to logged-out readers. Both sets are rebuilt whole on every
//! refresh (delete then repopulate in one pipeline) and expire after a short
//! TTL so a stalled refresher degrades to an empty feed instead of a stale
//! one. An empty or unavailable candidate set is a no-op: a live feed is never
//! cleared by a failed fetch.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use ordered_store::{OrderedStore, StoreBatch};

use crate::config::TrendingConfig;
use crate::keys;
use crate::metrics;
use crate::models::Post;

/// Supplier of trending candidates, owned by the external engagement flow.
/// Which posts count as "recent enough" is the source's call; the ranker
/// ranks whatever it is handed.
#[async_trait::async_trait]
pub trait PostSource: Send + Sync {
    async fn trending_candidates(&self) -> anyhow::Result<Vec<Post>>;
}

/// Engagement over squared age decay.
///
/// `(likes + 2*comments) / (hours + 1)^2`, with fractional hours. The `+1`
/// keeps brand-new posts finite and the square makes decay fast enough that
/// day-old posts need outsized engagement to stay ranked.
pub fn trending_score(post: &Post, now: DateTime<Utc>) -> f64 {
    let engagement = (post.like_count + 2 * post.comment_count) as f64;
    let age_hours = (now - post.created_at).num_milliseconds().max(0) as f64 / 3_600_000.0;
    engagement / (age_hours + 1.0).powi(2)
}

/// Score and order candidates, best first, cut to `cap`. Score ties go to
/// the fresher post.
fn rank_candidates(posts: &[Post], now: DateTime<Utc>, cap: usize) -> Vec<(f64, &Post)> {
    let mut ranked: Vec<(f64, &Post)> = posts
        .iter()
        .map(|post| (trending_score(post, now), post))
        .collect();
    ranked.sort_by(|a, b| {
        b.0.total_cmp(&a.0)
            .then_with(|| b.1.created_at.cmp(&a.1.created_at))
            .then_with(|| b.1.id.cmp(&a.1.id))
    });
    ranked.truncate(cap);
    ranked
}

/// What one refresh pass did.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TrendingRefresh {
    /// Candidates scored.
    pub ranked: usize,
    /// Entries published to the trending feed.
    pub published: usize,
    /// False when the feeds were left as they were.
    pub refreshed: bool,
}

impl TrendingRefresh {
    fn unchanged() -> Self {
        Self {
            ranked: 0,
            published: 0,
            refreshed: false,
        }
    }
}

pub struct TrendingRanker {
    store: Arc<dyn OrderedStore>,
    source: Arc<dyn PostSource>,
    config: TrendingConfig,
}

impl TrendingRanker {
    pub fn new(
        store: Arc<dyn OrderedStore>,
        source: Arc<dyn PostSource>,
        config: TrendingConfig,
    ) -> Self {
        Self {
            store,
            source,
            config,
        }
    }

    /// Pull candidates from the source and refresh. An unavailable source is
    /// reported and skipped; whatever is currently published stays until it
    /// expires.
    pub async fn refresh_from_source(&self) -> TrendingRefresh {
        match self.source.trending_candidates().await {
            Ok(posts) => self.refresh_trending(&posts).await,
            Err(e) => {
                metrics::record_trending_refresh("error");
                warn!(error = %e, "trending candidates unavailable, keeping current feeds");
                TrendingRefresh::unchanged()
            }
        }
    }

    /// Score `posts`, publish the top slice to the trending feed and its
    /// prefix to the guest feed, replacing both outright.
    pub async fn refresh_trending(&self, posts: &[Post]) -> TrendingRefresh {
        if posts.is_empty() {
            metrics::record_trending_refresh("empty");
            debug!("no trending candidates, keeping current feeds");
            return TrendingRefresh::unchanged();
        }

        let ranked = rank_candidates(posts, Utc::now(), self.config.trending_size as usize);

        let mut batch = StoreBatch::new();
        batch.delete(keys::trending_key());
        batch.delete(keys::guest_feed_key());
        for (score, post) in &ranked {
            batch.add_scored(keys::trending_key(), post.id.to_string(), *score);
        }
        for (score, post) in ranked.iter().take(self.config.guest_size as usize) {
            batch.add_scored(keys::guest_feed_key(), post.id.to_string(), *score);
        }
        batch.expire(keys::trending_key(), self.config.ttl_secs);
        batch.expire(keys::guest_feed_key(), self.config.ttl_secs);

        match self.store.execute(batch).await {
            Ok(()) => {
                metrics::record_trending_refresh("refreshed");
                metrics::set_trending_published(ranked.len() as i64);
                info!(
                    candidates = posts.len(),
                    published = ranked.len(),
                    "trending feeds refreshed"
                );
                TrendingRefresh {
                    ranked: posts.len(),
                    published: ranked.len(),
                    refreshed: true,
                }
            }
            Err(e) => {
                metrics::record_trending_refresh("error");
                warn!(error = %e, "trending publish failed, feeds unchanged");
                TrendingRefresh {
                    ranked: posts.len(),
                    published: 0,
                    refreshed: false,
                }
            }
        }
    }
}
