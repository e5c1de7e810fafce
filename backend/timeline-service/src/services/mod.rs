//! Distribution services: classification, fan-out, trending, reads.

pub mod classifier;
pub mod fanout;
pub mod reader;
pub mod trending;

pub use classifier::CelebrityClassifier;
pub use fanout::TimelineWriter;
pub use reader::TimelineReader;
pub use trending::{trending_score, PostSource, TrendingRanker, TrendingRefresh};
