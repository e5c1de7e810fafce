//! Redis-backed ordered store over a multiplexed connection manager.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tokio::time::timeout;

use crate::error::{Result, StoreError};
use crate::{OrderedStore, ScoreBound, ScoredMember, StoreBatch, StoreOp};

/// Redis implementation of [`OrderedStore`].
///
/// The connection manager re-establishes dropped connections on its own and
/// is cheap to clone, so one store handle can be shared across tasks. Every
/// command runs under `op_timeout`; a missed deadline or a refused/dropped
/// connection comes back as [`StoreError::Unavailable`].
#[derive(Clone)]
pub struct RedisOrderedStore {
    conn: ConnectionManager,
    op_timeout: Duration,
}

impl RedisOrderedStore {
    pub async fn connect(redis_url: &str, op_timeout: Duration) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let conn = match timeout(op_timeout, ConnectionManager::new(client)).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) if is_unreachable(&e) => {
                return Err(StoreError::unavailable("connect", e.to_string()))
            }
            Ok(Err(e)) => return Err(StoreError::Redis(e)),
            Err(_) => {
                return Err(StoreError::unavailable(
                    "connect",
                    format!("no reply within {:?}", op_timeout),
                ))
            }
        };
        Ok(Self { conn, op_timeout })
    }

    /// Wrap an already-established manager (shared with other components).
    pub fn from_manager(conn: ConnectionManager, op_timeout: Duration) -> Self {
        Self { conn, op_timeout }
    }

    async fn run<T, F>(&self, op: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = redis::RedisResult<T>> + Send,
    {
        match timeout(self.op_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) if is_unreachable(&e) => Err(StoreError::unavailable(op, e.to_string())),
            Ok(Err(e)) => Err(StoreError::Redis(e)),
            Err(_) => Err(StoreError::unavailable(
                op,
                format!("no reply within {:?}", self.op_timeout),
            )),
        }
    }
}

fn is_unreachable(err: &redis::RedisError) -> bool {
    err.is_io_error()
        || err.is_timeout()
        || err.is_connection_dropped()
        || err.is_connection_refusal()
}

#[async_trait]
impl OrderedStore for RedisOrderedStore {
    async fn add_scored(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let mut conn = self.conn.clone();
        let (key, member) = (key.to_owned(), member.to_owned());
        self.run("zadd", async move {
            conn.zadd::<_, _, _, ()>(key, member, score).await
        })
        .await
    }

    async fn trim_to_most_recent(&self, key: &str, keep: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        let key = key.to_owned();
        // Ranks count from the low-score end; everything up to -(keep+1) goes.
        let stop = -(keep as isize) - 1;
        self.run("zremrangebyrank", async move {
            conn.zremrangebyrank::<_, ()>(key, 0, stop).await
        })
        .await
    }

    async fn range_desc(
        &self,
        key: &str,
        max: ScoreBound,
        limit: u64,
    ) -> Result<Vec<ScoredMember>> {
        let mut conn = self.conn.clone();
        let key = key.to_owned();
        let max_arg = max.query_arg();
        let rows: Vec<(String, f64)> = self
            .run("zrevrangebyscore", async move {
                conn.zrevrangebyscore_limit_withscores(key, max_arg, "-inf", 0, limit as isize)
                    .await
            })
            .await?;
        Ok(rows
            .into_iter()
            .map(|(member, score)| ScoredMember { member, score })
            .collect())
    }

    async fn set_add(&self, key: &str, members: &[String]) -> Result<()> {
        if members.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let key = key.to_owned();
        let members = members.to_vec();
        self.run("sadd", async move {
            conn.sadd::<_, _, ()>(key, members).await
        })
        .await
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let key = key.to_owned();
        self.run("smembers", async move { conn.smembers(key).await })
            .await
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let (key, member) = (key.to_owned(), member.to_owned());
        self.run("sismember", async move {
            conn.sismember::<_, _, bool>(key, member).await
        })
        .await
    }

    async fn set_union(&self, keys: &[String]) -> Result<Vec<String>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let keys = keys.to_vec();
        self.run("sunion", async move { conn.sunion(keys).await })
            .await
    }

    async fn set_len(&self, key: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        let key = key.to_owned();
        self.run("scard", async move { conn.scard::<_, u64>(key).await })
            .await
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        let key = key.to_owned();
        self.run("expire", async move {
            conn.expire::<_, ()>(key, ttl_secs as i64).await
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let key = key.to_owned();
        self.run("del", async move { conn.del::<_, ()>(key).await })
            .await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let key = key.to_owned();
        self.run("exists", async move {
            conn.exists::<_, bool>(key).await
        })
        .await
    }

    async fn execute(&self, batch: StoreBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        for op in batch.into_ops() {
            match op {
                StoreOp::AddScored { key, member, score } => {
                    pipe.zadd(key, member, score).ignore();
                }
                StoreOp::TrimToMostRecent { key, keep } => {
                    pipe.zremrangebyrank(key, 0, -(keep as isize) - 1).ignore();
                }
                StoreOp::SetAdd { key, members } => {
                    if !members.is_empty() {
                        pipe.sadd(key, members).ignore();
                    }
                }
                StoreOp::Expire { key, ttl_secs } => {
                    pipe.expire(key, ttl_secs as i64).ignore();
                }
                StoreOp::Delete { key } => {
                    pipe.del(key).ignore();
                }
            }
        }
        self.run("pipeline", async move {
            pipe.query_async::<_, ()>(&mut conn).await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errors_classify_as_unreachable() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = redis::RedisError::from(io);
        assert!(is_unreachable(&err));

        let wrongtype = redis::RedisError::from((redis::ErrorKind::TypeError, "WRONGTYPE"));
        assert!(!is_unreachable(&wrongtype));
    }
}
