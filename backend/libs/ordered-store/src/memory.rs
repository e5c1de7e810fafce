//! In-process ordered store for tests and local development.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

use crate::error::Result;
use crate::{OrderedStore, ScoreBound, ScoredMember, StoreBatch, StoreOp};

#[derive(Default)]
struct Tables {
    sorted: HashMap<String, HashMap<String, f64>>,
    sets: HashMap<String, HashSet<String>>,
    deadlines: HashMap<String, Instant>,
}

impl Tables {
    /// Expiry is applied lazily, on the next touch of the key.
    fn purge(&mut self, key: &str) {
        if let Some(deadline) = self.deadlines.get(key) {
            if *deadline <= Instant::now() {
                self.deadlines.remove(key);
                self.sorted.remove(key);
                self.sets.remove(key);
            }
        }
    }

    fn add_scored(&mut self, key: &str, member: &str, score: f64) {
        self.purge(key);
        self.sorted
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
    }

    fn trim_to_most_recent(&mut self, key: &str, keep: u64) {
        self.purge(key);
        let Some(entries) = self.sorted.get_mut(key) else {
            return;
        };
        if entries.len() <= keep as usize {
            return;
        }
        // Evict from the low-score end, lowest member first on ties.
        let mut ranked: Vec<(String, f64)> =
            entries.iter().map(|(m, s)| (m.clone(), *s)).collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        let excess = ranked.len() - keep as usize;
        for (member, _) in ranked.into_iter().take(excess) {
            entries.remove(&member);
        }
    }

    fn set_add(&mut self, key: &str, members: &[String]) {
        if members.is_empty() {
            return;
        }
        self.purge(key);
        self.sets
            .entry(key.to_string())
            .or_default()
            .extend(members.iter().cloned());
    }

    fn expire(&mut self, key: &str, ttl_secs: u64) {
        self.purge(key);
        if self.sorted.contains_key(key) || self.sets.contains_key(key) {
            self.deadlines
                .insert(key.to_string(), Instant::now() + Duration::from_secs(ttl_secs));
        }
    }

    fn delete(&mut self, key: &str) {
        self.sorted.remove(key);
        self.sets.remove(key);
        self.deadlines.remove(key);
    }
}

/// In-memory [`OrderedStore`] with the Redis implementation's semantics:
/// rank-based trimming from the low-score end, descending range queries with
/// descending member order on score ties, and lazy whole-key expiry.
///
/// Expiry runs on [`tokio::time::Instant`], so tests can drive it with
/// `tokio::time::pause` and `advance` instead of sleeping.
#[derive(Default)]
pub struct MemoryOrderedStore {
    tables: Mutex<Tables>,
}

impl MemoryOrderedStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderedStore for MemoryOrderedStore {
    async fn add_scored(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.add_scored(key, member, score);
        Ok(())
    }

    async fn trim_to_most_recent(&self, key: &str, keep: u64) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.trim_to_most_recent(key, keep);
        Ok(())
    }

    async fn range_desc(
        &self,
        key: &str,
        max: ScoreBound,
        limit: u64,
    ) -> Result<Vec<ScoredMember>> {
        let mut tables = self.tables.lock().await;
        tables.purge(key);
        let Some(entries) = tables.sorted.get(key) else {
            return Ok(Vec::new());
        };
        let mut ranked: Vec<ScoredMember> = entries
            .iter()
            .filter(|(_, score)| max.admits(**score))
            .map(|(member, score)| ScoredMember {
                member: member.clone(),
                score: *score,
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.member.cmp(&a.member))
        });
        ranked.truncate(limit as usize);
        Ok(ranked)
    }

    async fn set_add(&self, key: &str, members: &[String]) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.set_add(key, members);
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let mut tables = self.tables.lock().await;
        tables.purge(key);
        Ok(tables
            .sets
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        tables.purge(key);
        Ok(tables
            .sets
            .get(key)
            .map(|s| s.contains(member))
            .unwrap_or(false))
    }

    async fn set_union(&self, keys: &[String]) -> Result<Vec<String>> {
        let mut tables = self.tables.lock().await;
        let mut union = HashSet::new();
        for key in keys {
            tables.purge(key);
            if let Some(members) = tables.sets.get(key.as_str()) {
                union.extend(members.iter().cloned());
            }
        }
        Ok(union.into_iter().collect())
    }

    async fn set_len(&self, key: &str) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        tables.purge(key);
        Ok(tables.sets.get(key).map(|s| s.len() as u64).unwrap_or(0))
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.expire(key, ttl_secs);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.delete(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        tables.purge(key);
        Ok(tables.sorted.contains_key(key) || tables.sets.contains_key(key))
    }

    async fn execute(&self, batch: StoreBatch) -> Result<()> {
        let mut tables = self.tables.lock().await;
        for op in batch.into_ops() {
            match op {
                StoreOp::AddScored { key, member, score } => {
                    tables.add_scored(&key, &member, score)
                }
                StoreOp::TrimToMostRecent { key, keep } => {
                    tables.trim_to_most_recent(&key, keep)
                }
                StoreOp::SetAdd { key, members } => tables.set_add(&key, &members),
                StoreOp::Expire { key, ttl_secs } => tables.expire(&key, ttl_secs),
                StoreOp::Delete { key } => tables.delete(&key),
            }
        }
        Ok(())
    }
}
