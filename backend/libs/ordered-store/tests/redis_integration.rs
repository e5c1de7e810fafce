//! Integration tests against a real Redis instance.
//!
//! Run with `REDIS_URL` pointing at a disposable Redis:
//! `REDIS_URL=redis://127.0.0.1:6379 cargo test -p ordered-store -- --ignored`

use std::time::Duration;

use ordered_store::{OrderedStore, RedisOrderedStore, ScoreBound, StoreBatch, StoreError};
use uuid::Uuid;

async fn connect_store() -> RedisOrderedStore {
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    RedisOrderedStore::connect(&redis_url, Duration::from_secs(2))
        .await
        .expect("test Redis must be reachable")
}

fn unique_key(kind: &str) -> String {
    format!("ordered-store-test:{}:{}", kind, Uuid::new_v4())
}

#[tokio::test]
#[ignore = "Requires Redis (set REDIS_URL)"]
async fn test_add_range_and_trim_roundtrip() {
    let store = connect_store().await;
    let key = unique_key("timeline");

    for i in 0..10 {
        store
            .add_scored(&key, &format!("post-{}", i), 1_000.0 + i as f64)
            .await
            .unwrap();
    }

    let top = store.range_desc(&key, ScoreBound::Inf, 3).await.unwrap();
    assert_eq!(top.len(), 3);
    assert_eq!(top[0].member, "post-9");
    assert_eq!(top[0].score, 1_009.0);

    store.trim_to_most_recent(&key, 4).await.unwrap();
    let rest = store.range_desc(&key, ScoreBound::Inf, 100).await.unwrap();
    let members: Vec<&str> = rest.iter().map(|r| r.member.as_str()).collect();
    assert_eq!(members, vec!["post-9", "post-8", "post-7", "post-6"]);

    store.delete(&key).await.unwrap();
}

#[tokio::test]
#[ignore = "Requires Redis (set REDIS_URL)"]
async fn test_exclusive_bound_and_tie_order_match_memory_semantics() {
    let store = connect_store().await;
    let key = unique_key("ties");

    store.add_scored(&key, "post-a", 100.0).await.unwrap();
    store.add_scored(&key, "post-b", 200.0).await.unwrap();
    store.add_scored(&key, "post-c", 200.0).await.unwrap();

    let below = store
        .range_desc(&key, ScoreBound::Excl(200.0), 10)
        .await
        .unwrap();
    assert_eq!(below.len(), 1);
    assert_eq!(below[0].member, "post-a");

    // Equal scores come back in descending member order.
    let all = store.range_desc(&key, ScoreBound::Inf, 10).await.unwrap();
    let members: Vec<&str> = all.iter().map(|r| r.member.as_str()).collect();
    assert_eq!(members, vec!["post-c", "post-b", "post-a"]);

    store.delete(&key).await.unwrap();
}

#[tokio::test]
#[ignore = "Requires Redis (set REDIS_URL)"]
async fn test_pipelined_batch_and_sets() {
    let store = connect_store().await;
    let timeline = unique_key("batch-timeline");
    let registry = unique_key("batch-registry");

    let mut batch = StoreBatch::new();
    for i in 0..6 {
        batch.add_scored(&timeline, format!("post-{}", i), i as f64);
    }
    batch.trim_to_most_recent(&timeline, 2);
    batch.set_add(&registry, vec!["author-1".to_string(), "author-2".to_string()]);
    store.execute(batch).await.unwrap();

    let rows = store.range_desc(&timeline, ScoreBound::Inf, 10).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].member, "post-5");

    assert!(store.set_contains(&registry, "author-1").await.unwrap());
    assert_eq!(store.set_len(&registry).await.unwrap(), 2);

    let other = unique_key("batch-other");
    store
        .set_add(&other, &["author-2".to_string(), "author-3".to_string()])
        .await
        .unwrap();
    let mut union = store
        .set_union(&[registry.clone(), other.clone()])
        .await
        .unwrap();
    union.sort();
    assert_eq!(union, vec!["author-1", "author-2", "author-3"]);

    store.delete(&timeline).await.unwrap();
    store.delete(&registry).await.unwrap();
    store.delete(&other).await.unwrap();
}

#[tokio::test]
#[ignore = "Requires Redis (set REDIS_URL)"]
async fn test_expire_drops_key() {
    let store = connect_store().await;
    let key = unique_key("expiring");

    store.add_scored(&key, "post-a", 1.0).await.unwrap();
    store.expire(&key, 1).await.unwrap();
    assert!(store.exists(&key).await.unwrap());

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert!(!store.exists(&key).await.unwrap());
}

#[tokio::test]
#[ignore = "Requires Redis (set REDIS_URL)"]
async fn test_unreachable_store_reports_unavailable() {
    // Nothing listens on this port.
    let result = RedisOrderedStore::connect("redis://127.0.0.1:1", Duration::from_millis(300)).await;
    match result {
        Err(StoreError::Unavailable { .. }) => {}
        other => panic!("expected Unavailable, got {:?}", other.map(|_| ())),
    }
}
