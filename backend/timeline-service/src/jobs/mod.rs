//! Background jobs.

pub mod trending_refresher;

pub use trending_refresher::start_trending_refresher;
