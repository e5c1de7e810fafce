//! Shared fixtures for distribution engine integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use uuid::Uuid;

use ordered_store::{
    MemoryOrderedStore, OrderedStore, ScoreBound, ScoredMember, StoreBatch, StoreError,
};
use timeline_service::config::Config;
use timeline_service::graph::{FollowSource, SocialGraphCache};
use timeline_service::models::Post;
use timeline_service::services::{CelebrityClassifier, TimelineReader, TimelineWriter};

/// In-memory follow relation with a kill switch, standing in for the
/// authoritative graph system.
#[derive(Default)]
pub struct StubGraph {
    followers: Mutex<HashMap<Uuid, Vec<Uuid>>>,
    following: Mutex<HashMap<Uuid, Vec<Uuid>>>,
    down: AtomicBool,
}

impl StubGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `follower` following `followee`, both directions.
    pub fn follow(&self, follower: Uuid, followee: Uuid) {
        self.followers
            .lock()
            .unwrap()
            .entry(followee)
            .or_default()
            .push(follower);
        self.following
            .lock()
            .unwrap()
            .entry(follower)
            .or_default()
            .push(followee);
    }

    /// Replace `user`'s follower list wholesale (the audience side only).
    pub fn set_followers(&self, user: Uuid, followers: Vec<Uuid>) {
        self.followers.lock().unwrap().insert(user, followers);
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check_up(&self) -> anyhow::Result<()> {
        if self.down.load(Ordering::SeqCst) {
            anyhow::bail!("follow source down");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl FollowSource for StubGraph {
    async fn followers_of(&self, user_id: Uuid) -> anyhow::Result<Vec<Uuid>> {
        self.check_up()?;
        Ok(self
            .followers
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn following_of(&self, user_id: Uuid) -> anyhow::Result<Vec<Uuid>> {
        self.check_up()?;
        Ok(self
            .following
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// A store that never answers, for exercising degraded paths.
pub struct UnavailableStore;

#[async_trait::async_trait]
impl OrderedStore for UnavailableStore {
    async fn add_scored(&self, _key: &str, _member: &str, _score: f64) -> Result<(), StoreError> {
        Err(StoreError::unavailable("zadd", "store down"))
    }

    async fn trim_to_most_recent(&self, _key: &str, _keep: u64) -> Result<(), StoreError> {
        Err(StoreError::unavailable("zremrangebyrank", "store down"))
    }

    async fn range_desc(
        &self,
        _key: &str,
        _max: ScoreBound,
        _limit: u64,
    ) -> Result<Vec<ScoredMember>, StoreError> {
        Err(StoreError::unavailable("zrevrangebyscore", "store down"))
    }

    async fn set_add(&self, _key: &str, _members: &[String]) -> Result<(), StoreError> {
        Err(StoreError::unavailable("sadd", "store down"))
    }

    async fn set_members(&self, _key: &str) -> Result<Vec<String>, StoreError> {
        Err(StoreError::unavailable("smembers", "store down"))
    }

    async fn set_contains(&self, _key: &str, _member: &str) -> Result<bool, StoreError> {
        Err(StoreError::unavailable("sismember", "store down"))
    }

    async fn set_union(&self, _keys: &[String]) -> Result<Vec<String>, StoreError> {
        Err(StoreError::unavailable("sunion", "store down"))
    }

    async fn set_len(&self, _key: &str) -> Result<u64, StoreError> {
        Err(StoreError::unavailable("scard", "store down"))
    }

    async fn expire(&self, _key: &str, _ttl_secs: u64) -> Result<(), StoreError> {
        Err(StoreError::unavailable("expire", "store down"))
    }

    async fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::unavailable("del", "store down"))
    }

    async fn exists(&self, _key: &str) -> Result<bool, StoreError> {
        Err(StoreError::unavailable("exists", "store down"))
    }

    async fn execute(&self, _batch: StoreBatch) -> Result<(), StoreError> {
        Err(StoreError::unavailable("pipeline", "store down"))
    }
}

/// A wired-up engine over the in-memory store and a stub follow source.
pub struct Harness {
    pub store: Arc<MemoryOrderedStore>,
    pub social: Arc<StubGraph>,
    pub graph: Arc<SocialGraphCache>,
    pub writer: TimelineWriter,
    pub reader: TimelineReader,
    pub config: Config,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryOrderedStore::new());
        let social = Arc::new(StubGraph::new());
        let graph = Arc::new(SocialGraphCache::new(
            store.clone(),
            social.clone(),
            config.graph.clone(),
        ));
        let classifier =
            CelebrityClassifier::new(graph.clone(), config.fanout.celebrity_threshold);
        let writer = TimelineWriter::new(
            store.clone(),
            graph.clone(),
            classifier,
            config.fanout.clone(),
        );
        let reader = TimelineReader::new(store.clone(), graph.clone());
        Self {
            store,
            social,
            graph,
            writer,
            reader,
            config,
        }
    }

    /// Members of one score-ordered key, highest score first.
    pub async fn members_desc(&self, key: &str) -> Vec<String> {
        self.store
            .range_desc(key, ScoreBound::Inf, 10_000)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.member)
            .collect()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// A post by `author` created at a fixed base time plus `minute`.
pub fn post_at_minute(author: Uuid, minute: u32) -> Post {
    Post {
        id: Uuid::new_v4(),
        author_id: author,
        created_at: Utc
            .with_ymd_and_hms(2024, 3, 1, 12 + minute / 60, minute % 60, 0)
            .unwrap(),
        like_count: 0,
        comment_count: 0,
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
