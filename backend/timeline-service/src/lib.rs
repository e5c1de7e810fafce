//! Timeline fan-out and trending feed distribution engine.
//!
//! Decides per post between fan-out-on-write (push to every follower
//! timeline) and fan-out-on-read (celebrity outbox that reads merge in),
//! keeps every feed structure bounded, and maintains the decayed-engagement
//! trending and guest feeds.

pub mod config;
pub mod error;
pub mod graph;
pub mod jobs;
pub mod keys;
pub mod metrics;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{FeedError, Result};

// Re-export the distribution engine surface
pub use graph::{FollowSource, SocialGraphCache};
pub use models::{FanoutMode, FanoutReceipt, FeedEntry, FeedPage, Post};
pub use services::{
    CelebrityClassifier, PostSource, TimelineReader, TimelineWriter, TrendingRanker,
    TrendingRefresh,
};
