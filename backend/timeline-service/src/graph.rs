//! Social graph cache over the ordered store.
//!
//! Follower and followee ID sets are materialized from the authoritative
//! follow relation (behind [`FollowSource`]) into plain sets, so the hot
//! fan-out and read paths never touch the relational store.
//!
//! Each cached set is written twice: the data set under a long grace expiry,
//! and a `:fresh` marker under the logical TTL (reference 300 s). A present
//! marker means the data is current, and also distinguishes a cached empty
//! set from a missing one. Once the marker lapses the next lookup refreshes
//! from the source; if the source cannot answer, the grace copy is served
//! stale, with a warning and a counter, rather than failing the caller.

use std::sync::Arc;

use uuid::Uuid;

use ordered_store::{OrderedStore, StoreBatch};
use tracing::{debug, warn};

use crate::config::GraphConfig;
use crate::error::Result;
use crate::keys;
use crate::metrics;

/// Authoritative follow relation, owned by an external system.
#[async_trait::async_trait]
pub trait FollowSource: Send + Sync {
    /// IDs of users following `user_id`.
    async fn followers_of(&self, user_id: Uuid) -> anyhow::Result<Vec<Uuid>>;

    /// IDs of users `user_id` follows.
    async fn following_of(&self, user_id: Uuid) -> anyhow::Result<Vec<Uuid>>;
}

/// Result of a graph lookup. `stale` marks data served past its freshness
/// window because the source could not answer; purely an observability
/// signal, the IDs are still used.
#[derive(Debug, Clone)]
pub struct GraphView {
    pub ids: Vec<Uuid>,
    pub stale: bool,
}

/// Follower count for classification, with the same staleness signal.
#[derive(Debug, Clone, Copy)]
pub struct GraphCount {
    pub count: u64,
    pub stale: bool,
}

#[derive(Clone, Copy)]
enum Direction {
    Followers,
    Following,
}

impl Direction {
    fn data_key(&self, user_id: Uuid) -> String {
        match self {
            Direction::Followers => keys::followers_key(user_id),
            Direction::Following => keys::following_key(user_id),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Direction::Followers => "followers",
            Direction::Following => "following",
        }
    }
}

pub struct SocialGraphCache {
    store: Arc<dyn OrderedStore>,
    source: Arc<dyn FollowSource>,
    config: GraphConfig,
}

impl SocialGraphCache {
    pub fn new(
        store: Arc<dyn OrderedStore>,
        source: Arc<dyn FollowSource>,
        config: GraphConfig,
    ) -> Self {
        Self {
            store,
            source,
            config,
        }
    }

    pub async fn followers_of(&self, user_id: Uuid) -> GraphView {
        self.lookup(user_id, Direction::Followers).await
    }

    pub async fn following_of(&self, user_id: Uuid) -> GraphView {
        self.lookup(user_id, Direction::Following).await
    }

    /// Follower count for the celebrity decision. Served from set length so
    /// large audiences are never enumerated just to be counted.
    pub async fn follower_count(&self, user_id: Uuid) -> GraphCount {
        let data_key = keys::followers_key(user_id);
        let fresh_key = keys::graph_fresh_key(&data_key);

        if let Ok(true) = self.store.exists(&fresh_key).await {
            if let Ok(count) = self.store.set_len(&data_key).await {
                metrics::record_graph_lookup("hit");
                return GraphCount {
                    count,
                    stale: false,
                };
            }
        }

        let view = self.refresh(user_id, Direction::Followers).await;
        GraphCount {
            count: view.ids.len() as u64,
            stale: view.stale,
        }
    }

    /// Targeted invalidation for a follow/unfollow between two users: the
    /// follower's followee set and the followee's follower set both change.
    pub async fn on_follow_changed(&self, follower_id: Uuid, followee_id: Uuid) -> Result<()> {
        let following = keys::following_key(follower_id);
        let followers = keys::followers_key(followee_id);
        let mut batch = StoreBatch::new();
        batch
            .delete(keys::graph_fresh_key(&following))
            .delete(following)
            .delete(keys::graph_fresh_key(&followers))
            .delete(followers);
        self.store.execute(batch).await?;
        Ok(())
    }

    /// Drop everything cached for one user, both directions.
    pub async fn invalidate_user(&self, user_id: Uuid) -> Result<()> {
        let followers = keys::followers_key(user_id);
        let following = keys::following_key(user_id);
        let mut batch = StoreBatch::new();
        batch
            .delete(keys::graph_fresh_key(&followers))
            .delete(followers)
            .delete(keys::graph_fresh_key(&following))
            .delete(following);
        self.store.execute(batch).await?;
        Ok(())
    }

    async fn lookup(&self, user_id: Uuid, direction: Direction) -> GraphView {
        let data_key = direction.data_key(user_id);
        let fresh_key = keys::graph_fresh_key(&data_key);

        match self.store.exists(&fresh_key).await {
            Ok(true) => match self.store.set_members(&data_key).await {
                Ok(members) => {
                    metrics::record_graph_lookup("hit");
                    debug!(user_id = %user_id, direction = direction.label(), "graph cache hit");
                    return GraphView {
                        ids: parse_ids(members),
                        stale: false,
                    };
                }
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "graph cache read failed, refreshing");
                }
            },
            Ok(false) => {}
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "graph cache unreachable, falling back to source");
            }
        }

        self.refresh(user_id, direction).await
    }

    async fn refresh(&self, user_id: Uuid, direction: Direction) -> GraphView {
        let fetched = match direction {
            Direction::Followers => self.source.followers_of(user_id).await,
            Direction::Following => self.source.following_of(user_id).await,
        };

        match fetched {
            Ok(ids) => {
                if let Err(e) = self.write_back(user_id, direction, &ids).await {
                    warn!(user_id = %user_id, error = %e, "graph cache write-back failed");
                }
                metrics::record_graph_lookup("refresh");
                GraphView { ids, stale: false }
            }
            Err(e) => self.serve_stale(user_id, direction, e).await,
        }
    }

    /// Source is down. Whatever survives under the grace expiry is better
    /// than nothing, but it must be flagged: fan-out computed from it may
    /// miss recent follows.
    async fn serve_stale(
        &self,
        user_id: Uuid,
        direction: Direction,
        source_err: anyhow::Error,
    ) -> GraphView {
        let data_key = direction.data_key(user_id);
        match self.store.set_members(&data_key).await {
            Ok(members) if !members.is_empty() => {
                metrics::record_graph_lookup("stale");
                warn!(
                    user_id = %user_id,
                    direction = direction.label(),
                    error = %source_err,
                    "serving stale graph data, follow source unavailable"
                );
                GraphView {
                    ids: parse_ids(members),
                    stale: true,
                }
            }
            _ => {
                metrics::record_graph_lookup("empty");
                warn!(
                    user_id = %user_id,
                    direction = direction.label(),
                    error = %source_err,
                    "no cached graph data and follow source unavailable"
                );
                GraphView {
                    ids: Vec::new(),
                    stale: true,
                }
            }
        }
    }

    async fn write_back(
        &self,
        user_id: Uuid,
        direction: Direction,
        ids: &[Uuid],
    ) -> Result<()> {
        let data_key = direction.data_key(user_id);
        let fresh_key = keys::graph_fresh_key(&data_key);
        let members: Vec<String> = ids.iter().map(|id| id.to_string()).collect();

        // Replace, never merge: a shrunk follower set must not resurrect.
        let mut batch = StoreBatch::new();
        batch.delete(&data_key);
        if !members.is_empty() {
            batch.set_add(&data_key, members);
            batch.expire(&data_key, self.config.stale_grace_secs);
        }
        batch.set_add(&fresh_key, vec!["1".to_string()]);
        batch.expire(&fresh_key, self.config.ttl_secs);
        self.store.execute(batch).await?;
        debug!(user_id = %user_id, direction = direction.label(), cached = ids.len(), "graph cache refreshed");
        Ok(())
    }
}

fn parse_ids(members: Vec<String>) -> Vec<Uuid> {
    members
        .into_iter()
        .filter_map(|m| Uuid::parse_str(&m).ok())
        .collect()
}
