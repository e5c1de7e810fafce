//! Integration Tests: Fan-out Flow
//!
//! Exercises post distribution end to end over the in-memory store:
//!
//! Coverage:
//! - Regular authors push into every follower timeline plus their own
//! - Celebrity authors write their outbox only, and register as outbox authors
//! - Redelivering a post changes nothing (idempotent writes)
//! - Timeline and outbox caps hold under sustained posting
//! - Crossing the celebrity threshold switches mode for new posts only
//! - Follow source outage degrades delivery, never the write call
//! - Store outage yields an Ok receipt marked incomplete

mod common;

use std::sync::Arc;

use common::{post_at_minute, Harness, StubGraph, UnavailableStore};
use ordered_store::OrderedStore;
use timeline_service::config::{Config, FanoutConfig, GraphConfig};
use timeline_service::graph::SocialGraphCache;
use timeline_service::keys;
use timeline_service::models::FanoutMode;
use timeline_service::services::{CelebrityClassifier, TimelineWriter};
use uuid::Uuid;

#[tokio::test]
async fn test_regular_post_reaches_every_follower_timeline() {
    let h = Harness::new();
    let author = Uuid::new_v4();
    let fans: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
    for fan in &fans {
        h.social.follow(*fan, author);
    }

    let post = post_at_minute(author, 0);
    let receipt = h.writer.on_post_created(&post).await.unwrap();
    assert_eq!(receipt.mode, FanoutMode::PushAll);
    assert_eq!(receipt.targets, 4);
    assert!(receipt.complete);

    let id = post.id.to_string();
    assert_eq!(h.members_desc(&keys::timeline_key(author)).await, vec![id.clone()]);
    for fan in &fans {
        assert_eq!(h.members_desc(&keys::timeline_key(*fan)).await, vec![id.clone()]);
    }
    assert!(h.members_desc(&keys::outbox_key(author)).await.is_empty());
    assert!(!h
        .store
        .set_contains(keys::outbox_authors_key(), &author.to_string())
        .await
        .unwrap());
}

#[tokio::test]
async fn test_celebrity_post_lands_in_outbox_only() {
    let mut config = Config::default();
    config.fanout.celebrity_threshold = 3;
    let h = Harness::with_config(config);

    let author = Uuid::new_v4();
    let fans: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
    for fan in &fans {
        h.social.follow(*fan, author);
    }

    let post = post_at_minute(author, 0);
    let receipt = h.writer.on_post_created(&post).await.unwrap();
    assert_eq!(receipt.mode, FanoutMode::PullFromOutbox);
    assert!(receipt.complete);

    let id = post.id.to_string();
    assert_eq!(h.members_desc(&keys::outbox_key(author)).await, vec![id.clone()]);
    assert_eq!(h.members_desc(&keys::timeline_key(author)).await, vec![id]);
    for fan in &fans {
        assert!(
            h.members_desc(&keys::timeline_key(*fan)).await.is_empty(),
            "celebrity posts must not be pushed"
        );
    }
    assert!(h
        .store
        .set_contains(keys::outbox_authors_key(), &author.to_string())
        .await
        .unwrap());
}

#[tokio::test]
async fn test_redelivery_is_idempotent() {
    let h = Harness::new();
    let author = Uuid::new_v4();
    let fan = Uuid::new_v4();
    h.social.follow(fan, author);

    let post = post_at_minute(author, 0);
    h.writer.on_post_created(&post).await.unwrap();
    h.writer.on_post_created(&post).await.unwrap();

    assert_eq!(h.members_desc(&keys::timeline_key(fan)).await.len(), 1);
    assert_eq!(h.members_desc(&keys::timeline_key(author)).await.len(), 1);
}

#[tokio::test]
async fn test_timeline_and_outbox_caps_hold_under_load() {
    let mut config = Config::default();
    config.fanout.celebrity_threshold = 100;
    config.fanout.timeline_cap = 5;
    config.fanout.outbox_cap = 3;
    let h = Harness::with_config(config);

    let regular = Uuid::new_v4();
    let fan = Uuid::new_v4();
    h.social.follow(fan, regular);

    let celebrity = Uuid::new_v4();
    h.social
        .set_followers(celebrity, (0..100).map(|_| Uuid::new_v4()).collect());

    let mut regular_posts = Vec::new();
    for minute in 0..8 {
        let post = post_at_minute(regular, minute);
        h.writer.on_post_created(&post).await.unwrap();
        regular_posts.push(post);
        h.writer
            .on_post_created(&post_at_minute(celebrity, minute))
            .await
            .unwrap();
    }

    let fan_timeline = h.members_desc(&keys::timeline_key(fan)).await;
    assert_eq!(fan_timeline.len(), 5, "timeline cap must hold");
    // The survivors are the newest five, newest first.
    let expected: Vec<String> = regular_posts[3..]
        .iter()
        .rev()
        .map(|p| p.id.to_string())
        .collect();
    assert_eq!(fan_timeline, expected);

    assert_eq!(
        h.members_desc(&keys::outbox_key(celebrity)).await.len(),
        3,
        "outbox cap must hold"
    );
}

#[tokio::test]
async fn test_threshold_crossing_switches_mode_without_retraction() {
    common::init_tracing();

    let mut config = Config::default();
    config.fanout.celebrity_threshold = 3;
    let h = Harness::with_config(config);

    let author = Uuid::new_v4();
    let early_fans: Vec<Uuid> = (0..2).map(|_| Uuid::new_v4()).collect();
    for fan in &early_fans {
        h.social.follow(*fan, author);
    }

    // Two followers: plain push.
    let pushed = post_at_minute(author, 0);
    let receipt = h.writer.on_post_created(&pushed).await.unwrap();
    assert_eq!(receipt.mode, FanoutMode::PushAll);

    // A third follow tips the author over the threshold. The graph cache is
    // invalidated the way the follow flow would.
    let late_fan = Uuid::new_v4();
    h.social.follow(late_fan, author);
    h.graph.on_follow_changed(late_fan, author).await.unwrap();

    let parked = post_at_minute(author, 1);
    let receipt = h.writer.on_post_created(&parked).await.unwrap();
    assert_eq!(receipt.mode, FanoutMode::PullFromOutbox);

    // The new post is pulled, not pushed.
    assert_eq!(
        h.members_desc(&keys::outbox_key(author)).await,
        vec![parked.id.to_string()]
    );
    for fan in &early_fans {
        assert_eq!(
            h.members_desc(&keys::timeline_key(*fan)).await,
            vec![pushed.id.to_string()],
            "already delivered entries stay where they are"
        );
    }

    // Early fans read both posts: the old one pushed, the new one merged in.
    let page = h
        .reader
        .home_page(early_fans[0], None, 10)
        .await
        .unwrap();
    let read: Vec<Uuid> = page.entries.iter().map(|e| e.post_id).collect();
    assert_eq!(read, vec![parked.id, pushed.id]);

    // The late fan never received a push but still sees the outbox.
    let page = h.reader.home_page(late_fan, None, 10).await.unwrap();
    let read: Vec<Uuid> = page.entries.iter().map(|e| e.post_id).collect();
    assert_eq!(read, vec![parked.id]);
}

#[tokio::test]
async fn test_follow_source_outage_degrades_but_never_fails_the_write() {
    let h = Harness::new();
    let author = Uuid::new_v4();
    h.social.follow(Uuid::new_v4(), author);
    h.social.set_down(true);

    // Nothing cached and no source: the audience degrades to empty, the
    // author's own timeline is still written, and the call succeeds.
    let post = post_at_minute(author, 0);
    let receipt = h.writer.on_post_created(&post).await.unwrap();
    assert_eq!(receipt.mode, FanoutMode::PushAll);
    assert_eq!(receipt.targets, 0);
    assert!(receipt.complete);
    assert_eq!(
        h.members_desc(&keys::timeline_key(author)).await,
        vec![post.id.to_string()]
    );
}

#[tokio::test]
async fn test_store_outage_yields_incomplete_receipt_not_error() {
    let store = Arc::new(UnavailableStore);
    let social = Arc::new(StubGraph::new());
    let author = Uuid::new_v4();
    let fans: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
    social.set_followers(author, fans);

    let graph = Arc::new(SocialGraphCache::new(
        store.clone(),
        social,
        GraphConfig::default(),
    ));
    let classifier = CelebrityClassifier::new(graph.clone(), 500);
    let writer = TimelineWriter::new(store, graph, classifier, FanoutConfig::default());

    // The follow source still answers, so delivery is attempted against a
    // dead store. Every batch drops; the caller still gets a receipt.
    let receipt = writer
        .on_post_created(&post_at_minute(author, 0))
        .await
        .unwrap();
    assert_eq!(receipt.mode, FanoutMode::PushAll);
    assert_eq!(receipt.targets, 3);
    assert!(!receipt.complete);
}
