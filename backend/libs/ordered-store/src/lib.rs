//! Ordered-store client for timeline and feed distribution workloads.
//!
//! Wraps the two structures the distribution engine lives on: score-ordered
//! sets keyed by timestamp (per-user timelines, celebrity outboxes, trending
//! feeds) and plain ID sets (follower caches, author registries). Writes that
//! belong together (deliver an entry, then trim the key back to its cap) are
//! submitted as one pipelined [`StoreBatch`] instead of sequential round trips.
//!
//! Two implementations are provided:
//!
//! - [`RedisOrderedStore`]: production backend over a multiplexed connection
//!   manager. Every command runs under a deadline, so a stalled store surfaces
//!   as [`StoreError::Unavailable`] instead of hanging the caller. Unavailable
//!   is a distinct outcome from an empty result.
//! - [`MemoryOrderedStore`]: in-process backend with the same trim, range,
//!   tie-ordering and expiry semantics, for unit tests and local development.
//!
//! # Example
//!
//! ```no_run
//! use ordered_store::{OrderedStore, RedisOrderedStore, ScoreBound, StoreBatch};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store =
//!         RedisOrderedStore::connect("redis://localhost:6379", Duration::from_secs(2)).await?;
//!
//!     // Deliver one timeline entry and re-apply the cap in a single round trip.
//!     let mut batch = StoreBatch::new();
//!     batch
//!         .add_scored("timeline:v1:42", "post-1", 1_700_000_000_000.0)
//!         .trim_to_most_recent("timeline:v1:42", 800);
//!     store.execute(batch).await?;
//!
//!     let newest = store
//!         .range_desc("timeline:v1:42", ScoreBound::Inf, 20)
//!         .await?;
//!     println!("{} entries", newest.len());
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;

mod error;
mod memory;
mod redis;

pub use error::{Result, StoreError};
pub use memory::MemoryOrderedStore;
pub use self::redis::RedisOrderedStore;

/// Upper score bound for descending range queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreBound {
    /// No upper bound (`+inf`): start from the highest-scored member.
    Inf,
    /// Include members scoring exactly this value.
    Incl(f64),
    /// Start strictly below this value.
    Excl(f64),
}

impl ScoreBound {
    /// Wire form understood by `ZREVRANGEBYSCORE`.
    pub fn query_arg(&self) -> String {
        match self {
            ScoreBound::Inf => "+inf".to_string(),
            ScoreBound::Incl(s) => s.to_string(),
            ScoreBound::Excl(s) => format!("({}", s),
        }
    }

    /// Whether a member with this score falls under the bound.
    pub fn admits(&self, score: f64) -> bool {
        match self {
            ScoreBound::Inf => true,
            ScoreBound::Incl(max) => score <= *max,
            ScoreBound::Excl(max) => score < *max,
        }
    }
}

/// One member of a score-ordered key, with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMember {
    pub member: String,
    pub score: f64,
}

/// A single operation inside a [`StoreBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    AddScored {
        key: String,
        member: String,
        score: f64,
    },
    TrimToMostRecent {
        key: String,
        keep: u64,
    },
    SetAdd {
        key: String,
        members: Vec<String>,
    },
    Expire {
        key: String,
        ttl_secs: u64,
    },
    Delete {
        key: String,
    },
}

/// Write operations submitted as one pipeline.
///
/// No cross-operation ordering is guaranteed beyond per-key command order,
/// which is all the delivery paths rely on (add before trim on the same key).
#[derive(Debug, Clone, Default)]
pub struct StoreBatch {
    ops: Vec<StoreOp>,
}

impl StoreBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_scored(&mut self, key: impl Into<String>, member: impl Into<String>, score: f64) -> &mut Self {
        self.ops.push(StoreOp::AddScored {
            key: key.into(),
            member: member.into(),
            score,
        });
        self
    }

    /// Keep only the `keep` highest-scored members of `key`.
    pub fn trim_to_most_recent(&mut self, key: impl Into<String>, keep: u64) -> &mut Self {
        self.ops.push(StoreOp::TrimToMostRecent {
            key: key.into(),
            keep,
        });
        self
    }

    pub fn set_add(&mut self, key: impl Into<String>, members: Vec<String>) -> &mut Self {
        self.ops.push(StoreOp::SetAdd {
            key: key.into(),
            members,
        });
        self
    }

    pub fn expire(&mut self, key: impl Into<String>, ttl_secs: u64) -> &mut Self {
        self.ops.push(StoreOp::Expire {
            key: key.into(),
            ttl_secs,
        });
        self
    }

    pub fn delete(&mut self, key: impl Into<String>) -> &mut Self {
        self.ops.push(StoreOp::Delete { key: key.into() });
        self
    }

    pub fn ops(&self) -> &[StoreOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<StoreOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Storage seam for the distribution engine.
///
/// Implementations must keep three semantics aligned:
/// - `trim_to_most_recent` evicts by rank from the low-score end, so the
///   `keep` highest-scored members survive;
/// - `range_desc` returns members ordered by score descending, and members
///   sharing a score in descending lexicographic member order;
/// - [`StoreError::Unavailable`] (timeout, refused or dropped connection)
///   is distinct from an empty result.
#[async_trait]
pub trait OrderedStore: Send + Sync {
    /// Insert or re-score one member of a score-ordered key. Re-adding an
    /// existing member with the same score is a no-op.
    async fn add_scored(&self, key: &str, member: &str, score: f64) -> Result<()>;

    /// Evict everything but the `keep` highest-scored members.
    async fn trim_to_most_recent(&self, key: &str, keep: u64) -> Result<()>;

    /// Up to `limit` members at or below `max`, highest score first.
    async fn range_desc(&self, key: &str, max: ScoreBound, limit: u64)
        -> Result<Vec<ScoredMember>>;

    async fn set_add(&self, key: &str, members: &[String]) -> Result<()>;

    async fn set_members(&self, key: &str) -> Result<Vec<String>>;

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool>;

    /// Distinct members across all `keys`. Missing keys contribute nothing.
    async fn set_union(&self, keys: &[String]) -> Result<Vec<String>>;

    async fn set_len(&self, key: &str) -> Result<u64>;

    /// Drop the whole key after `ttl_secs`. No-op when the key is missing.
    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Submit every operation in `batch` as one pipeline.
    async fn execute(&self, batch: StoreBatch) -> Result<()>;
}
