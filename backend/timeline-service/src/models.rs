//! Records moved through the distribution engine.
//!
//! Canonical post/user/follow storage lives elsewhere; only the fields that
//! fan-out, ranking and reads need travel through here.

use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FeedError, Result};

/// A post as seen by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub comment_count: u64,
}

impl Post {
    /// Checked before any delivery is attempted; a rejected post must leave
    /// no trace in the store.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_nil() {
            return Err(FeedError::InvalidPost("post id is nil".to_string()));
        }
        if self.author_id.is_nil() {
            return Err(FeedError::InvalidPost("author id is nil".to_string()));
        }
        Ok(())
    }

    /// Sorted-set score for timeline and outbox placement.
    pub fn timeline_score(&self) -> f64 {
        self.created_at.timestamp_millis() as f64
    }
}

/// How a new post reaches its audience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanoutMode {
    /// Deliver to every follower timeline at write time.
    PushAll,
    /// Park in the author's outbox; follower reads pull it in.
    PullFromOutbox,
}

impl FanoutMode {
    /// Label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            FanoutMode::PushAll => "push",
            FanoutMode::PullFromOutbox => "pull",
        }
    }
}

/// What a fan-out attempt actually did. Delivery is best-effort, so failures
/// show up here (and in logs and counters), never as a write-path error.
#[derive(Debug, Clone, Serialize)]
pub struct FanoutReceipt {
    pub post_id: Uuid,
    pub mode: FanoutMode,
    /// Follower timelines targeted (push) or outbox writes attempted (pull).
    pub targets: usize,
    /// False when any delivery batch was dropped on store failure.
    pub complete: bool,
}

/// One feed entry: a post ID and the score that positioned it.
/// Home timelines score by post timestamp millis; the guest feed scores by
/// trending value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedEntry {
    pub post_id: Uuid,
    pub score: f64,
}

/// One page of a feed read.
#[derive(Debug, Clone, Serialize)]
pub struct FeedPage {
    pub entries: Vec<FeedEntry>,
    /// Opaque resume token. `None` means the feed is exhausted.
    pub next_cursor: Option<String>,
}

/// Pagination position: (score, post id) of the last entry already returned.
///
/// Encoded as base64 of `"{score}:{post_id}"`. The f64 `Display` form parses
/// back to the identical bits, so a cursor round-trips exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedCursor {
    pub score: f64,
    pub post_id: Uuid,
}

impl FeedCursor {
    pub fn from_entry(entry: &FeedEntry) -> Self {
        Self {
            score: entry.score,
            post_id: entry.post_id,
        }
    }

    pub fn encode(&self) -> String {
        general_purpose::STANDARD.encode(format!("{}:{}", self.score, self.post_id))
    }

    pub fn decode(cursor: &str) -> Result<Self> {
        let decoded = general_purpose::STANDARD
            .decode(cursor)
            .map_err(|_| FeedError::InvalidCursor)?;
        let cursor_str = String::from_utf8(decoded).map_err(|_| FeedError::InvalidCursor)?;
        let (score_str, id_str) = cursor_str
            .split_once(':')
            .ok_or(FeedError::InvalidCursor)?;
        let score = score_str
            .parse::<f64>()
            .map_err(|_| FeedError::InvalidCursor)?;
        let post_id = Uuid::parse_str(id_str).map_err(|_| FeedError::InvalidCursor)?;
        Ok(Self { score, post_id })
    }
}
