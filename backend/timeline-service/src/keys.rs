//! Key layout for the distribution engine.
//!
//! Keys: timeline:v1:{user_id}, outbox:v1:{author_id}, outbox:v1:authors,
//! graph:v1:{user_id}:followers, graph:v1:{user_id}:following (each with a
//! `:fresh` marker), trending:v1:posts, trending:v1:guest.
//!
//! The `v1` segment exists so a layout change can roll out under a new
//! version instead of rewriting live keys in place.

use uuid::Uuid;

/// Per-user home timeline (sorted set, score = post timestamp millis).
pub fn timeline_key(user_id: Uuid) -> String {
    format!("timeline:v1:{}", user_id)
}

/// Per-author celebrity outbox (sorted set, score = post timestamp millis).
pub fn outbox_key(author_id: Uuid) -> String {
    format!("outbox:v1:{}", author_id)
}

/// Registry of every author that ever received an outbox write.
pub fn outbox_authors_key() -> &'static str {
    "outbox:v1:authors"
}

/// Cached follower ID set for a user.
pub fn followers_key(user_id: Uuid) -> String {
    format!("graph:v1:{}:followers", user_id)
}

/// Cached followee ID set for a user.
pub fn following_key(user_id: Uuid) -> String {
    format!("graph:v1:{}:following", user_id)
}

/// Freshness marker for a cached graph set. The marker carries the logical
/// TTL; the data set itself lives longer so it can still serve stale reads.
pub fn graph_fresh_key(data_key: &str) -> String {
    format!("{}:fresh", data_key)
}

/// Global trending feed (sorted set, score = trending score).
pub fn trending_key() -> &'static str {
    "trending:v1:posts"
}

/// Guest feed for logged-out consumers (sorted set, score = trending score).
pub fn guest_feed_key() -> &'static str {
    "trending:v1:guest"
}
