//! Fan-out mode classification.
//!
//! An author with at least `threshold` followers (inclusive) is handled as a
//! celebrity: their posts go to a pull-model outbox instead of being pushed
//! into every follower timeline. The decision is recomputed on every call, so
//! crossing the threshold takes effect on the author's next post. History is
//! never migrated in either direction: posts already pushed stay in follower
//! timelines, and posts already parked in an outbox stay there.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::graph::SocialGraphCache;
use crate::models::FanoutMode;

#[derive(Clone)]
pub struct CelebrityClassifier {
    graph: Arc<SocialGraphCache>,
    threshold: u64,
}

impl CelebrityClassifier {
    pub fn new(graph: Arc<SocialGraphCache>, threshold: u64) -> Self {
        Self { graph, threshold }
    }

    /// Decide the delivery mode for one post by this author.
    ///
    /// Runs on the cached follower count. If the graph is stale or unknown the
    /// count degrades toward zero and the author is handled as a regular user;
    /// fan-out is best-effort, so that is a delivery-quality issue rather than
    /// an error.
    pub async fn classify(&self, author_id: Uuid) -> FanoutMode {
        let followers = self.graph.follower_count(author_id).await;
        let mode = if followers.count >= self.threshold {
            FanoutMode::PullFromOutbox
        } else {
            FanoutMode::PushAll
        };
        debug!(
            author_id = %author_id,
            followers = followers.count,
            stale = followers.stale,
            threshold = self.threshold,
            mode = mode.label(),
            "classified fan-out mode"
        );
        mode
    }
}
