//! Error taxonomy for the distribution engine.
//!
//! Only two failures are ever surfaced to callers of the write path:
//! a rejected post (`InvalidPost`) and a malformed pagination cursor
//! (`InvalidCursor`). Store trouble is represented by `Store` but the
//! delivery paths swallow it by policy: post creation must not fail because
//! fan-out did, and a read degrades to a partial page instead of erroring.

use ordered_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    /// The post failed validation before any delivery was attempted.
    #[error("invalid post: {0}")]
    InvalidPost(String),

    /// The pagination cursor could not be decoded.
    #[error("invalid feed cursor")]
    InvalidCursor,

    /// The ordered store failed or did not answer.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Rejected engine configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, FeedError>;
