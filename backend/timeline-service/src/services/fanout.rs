//! Fan-out engine for new posts.
//!
//! Every post lands in its author's own timeline first. What happens next
//! depends on the classifier: regular authors are pushed into each follower's
//! timeline in chunked pipelines (fan-out-on-write), celebrities get a single
//! write into their bounded outbox that follower reads pull from
//! (fan-out-on-read). All (key, member, score) writes are idempotent, so
//! redelivering the same post is harmless.
//!
//! Delivery is best-effort by contract: the post record is already durable
//! when this runs, so a stale follower cache or an unavailable store must
//! never surface as a post-creation failure. Dropped batches are logged,
//! counted, and reflected in the returned [`FanoutReceipt`].

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};
use uuid::Uuid;

use ordered_store::{OrderedStore, StoreBatch};

use crate::config::FanoutConfig;
use crate::error::Result;
use crate::graph::SocialGraphCache;
use crate::keys;
use crate::metrics;
use crate::models::{FanoutMode, FanoutReceipt, Post};
use crate::services::classifier::CelebrityClassifier;

pub struct TimelineWriter {
    store: Arc<dyn OrderedStore>,
    graph: Arc<SocialGraphCache>,
    classifier: CelebrityClassifier,
    config: FanoutConfig,
}

impl TimelineWriter {
    pub fn new(
        store: Arc<dyn OrderedStore>,
        graph: Arc<SocialGraphCache>,
        classifier: CelebrityClassifier,
        config: FanoutConfig,
    ) -> Self {
        Self {
            store,
            graph,
            classifier,
            config,
        }
    }

    /// Distribute a freshly persisted post.
    ///
    /// The only error this returns is [`InvalidPost`](crate::FeedError::InvalidPost),
    /// raised before any store mutation. Everything downstream is best-effort:
    /// the receipt says what was attempted and whether every batch committed.
    pub async fn on_post_created(&self, post: &Post) -> Result<FanoutReceipt> {
        if let Err(e) = post.validate() {
            metrics::record_fanout_post("none", "skipped");
            return Err(e);
        }
        let started = Instant::now();

        let mode = self.classifier.classify(post.author_id).await;
        let own_delivered = self.write_author_timeline(post).await;
        let (targets, delivery_complete) = match mode {
            FanoutMode::PushAll => self.push_to_followers(post).await,
            FanoutMode::PullFromOutbox => (1, self.write_outbox(post).await),
        };

        let complete = own_delivered && delivery_complete;
        let outcome = if complete { "complete" } else { "partial" };
        metrics::record_fanout_post(mode.label(), outcome);
        metrics::record_fanout_duration(mode.label(), started.elapsed());
        info!(
            post_id = %post.id,
            author_id = %post.author_id,
            mode = mode.label(),
            targets,
            complete,
            "fan-out finished"
        );

        Ok(FanoutReceipt {
            post_id: post.id,
            mode,
            targets,
            complete,
        })
    }

    /// Step one, regardless of mode: the author sees their own post.
    async fn write_author_timeline(&self, post: &Post) -> bool {
        let key = keys::timeline_key(post.author_id);
        let mut batch = StoreBatch::new();
        self.timeline_insert(&mut batch, &key, post);
        match self.store.execute(batch).await {
            Ok(()) => {
                metrics::record_fanout_deliveries("delivered", 1);
                true
            }
            Err(e) => {
                metrics::record_fanout_deliveries("dropped", 1);
                warn!(
                    post_id = %post.id,
                    author_id = %post.author_id,
                    error = %e,
                    "author timeline write dropped"
                );
                false
            }
        }
    }

    /// Fan-out-on-write: deliver into every follower timeline, a chunk of
    /// followers per pipeline. A dropped chunk is logged and counted, then
    /// the remaining chunks still run.
    async fn push_to_followers(&self, post: &Post) -> (usize, bool) {
        let audience = self.graph.followers_of(post.author_id).await;
        let followers: Vec<Uuid> = audience
            .ids
            .into_iter()
            .filter(|id| *id != post.author_id)
            .collect();
        if followers.is_empty() {
            return (0, true);
        }

        let mut complete = true;
        for chunk in followers.chunks(self.config.chunk_size) {
            let mut batch = StoreBatch::new();
            for follower in chunk {
                self.timeline_insert(&mut batch, &keys::timeline_key(*follower), post);
            }
            match self.store.execute(batch).await {
                Ok(()) => {
                    metrics::record_fanout_deliveries("delivered", chunk.len() as u64);
                    debug!(
                        post_id = %post.id,
                        chunk = chunk.len(),
                        "delivered fan-out chunk"
                    );
                }
                Err(e) => {
                    complete = false;
                    metrics::record_fanout_deliveries("dropped", chunk.len() as u64);
                    warn!(
                        post_id = %post.id,
                        chunk = chunk.len(),
                        error = %e,
                        "fan-out chunk dropped"
                    );
                }
            }
        }
        (followers.len(), complete)
    }

    /// Fan-out-on-read: one write into the author's outbox plus registry
    /// membership so readers know this followee has an outbox to merge.
    async fn write_outbox(&self, post: &Post) -> bool {
        let key = keys::outbox_key(post.author_id);
        let mut batch = StoreBatch::new();
        batch.add_scored(&key, post.id.to_string(), post.timeline_score());
        batch.trim_to_most_recent(&key, self.config.outbox_cap);
        if let Some(ttl) = self.config.timeline_ttl_secs {
            batch.expire(&key, ttl);
        }
        batch.set_add(
            keys::outbox_authors_key(),
            vec![post.author_id.to_string()],
        );
        match self.store.execute(batch).await {
            Ok(()) => {
                metrics::record_fanout_deliveries("delivered", 1);
                true
            }
            Err(e) => {
                metrics::record_fanout_deliveries("dropped", 1);
                warn!(
                    post_id = %post.id,
                    author_id = %post.author_id,
                    error = %e,
                    "outbox write dropped"
                );
                false
            }
        }
    }

    fn timeline_insert(&self, batch: &mut StoreBatch, key: &str, post: &Post) {
        batch.add_scored(key, post.id.to_string(), post.timeline_score());
        batch.trim_to_most_recent(key, self.config.timeline_cap);
        if let Some(ttl) = self.config.timeline_ttl_secs {
            batch.expire(key, ttl);
        }
    }
}
