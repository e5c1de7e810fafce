//! Error types for ordered-store operations

use thiserror::Error;

/// Ordered-store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store did not answer: timed out, refused, or dropped the connection.
    /// Callers must treat this as "unknown state", never as an empty result.
    #[error("store unavailable during {op}: {reason}")]
    Unavailable { op: &'static str, reason: String },

    /// The store answered with a command-level failure (bad type, OOM, etc.)
    #[error("store command failed: {0}")]
    Redis(#[from] redis::RedisError),
}

impl StoreError {
    pub fn unavailable(op: &'static str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            op,
            reason: reason.into(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_display_names_the_operation() {
        let err = StoreError::unavailable("zadd", "no reply within 2s");
        assert_eq!(
            err.to_string(),
            "store unavailable during zadd: no reply within 2s"
        );
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_command_failure_is_not_unavailable() {
        let redis_err = redis::RedisError::from((redis::ErrorKind::TypeError, "WRONGTYPE"));
        let err: StoreError = redis_err.into();
        assert!(!err.is_unavailable());
    }
}
