//! Feed reads: the merged home timeline and the guest trending feed.
//!
//! A home page merges the user's own timeline with the outboxes of every
//! followed author found in the outbox registry, descending by score with
//! post ID as the tiebreak. Pagination is cursor-driven: the caller hands
//! back the opaque `"<score>:<post_id>"` cursor from the previous page and
//! gets everything strictly after that position, so runs of equal scores
//! neither repeat nor go missing across page boundaries.
//!
//! Reads are best-effort. A source that cannot answer is logged and skipped,
//! shrinking the page instead of failing it; only a malformed cursor is the
//! caller's error.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use ordered_store::{OrderedStore, ScoreBound};

use crate::error::Result;
use crate::graph::SocialGraphCache;
use crate::keys;
use crate::models::{FeedCursor, FeedEntry, FeedPage};

/// Hard ceiling on requested page size.
const MAX_PAGE_SIZE: u64 = 100;

/// Extra members fetched past the page size so an equal-score run straddling
/// the cursor is usually covered in one round trip.
const TIE_SCAN_EXTRA: u64 = 64;

pub struct TimelineReader {
    store: Arc<dyn OrderedStore>,
    graph: Arc<SocialGraphCache>,
}

impl TimelineReader {
    pub fn new(store: Arc<dyn OrderedStore>, graph: Arc<SocialGraphCache>) -> Self {
        Self { store, graph }
    }

    /// One page of `user_id`'s home feed: own timeline merged with the
    /// outboxes of followed authors that have one.
    pub async fn home_page(
        &self,
        user_id: Uuid,
        cursor: Option<&str>,
        limit: u64,
    ) -> Result<FeedPage> {
        let cursor = decode_cursor(cursor)?;
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        // limit + 1 per source is enough to decide whether more remain:
        // nothing past a source's first limit + 1 can land on this page.
        let take = limit + 1;

        let mut sources: Vec<Vec<FeedEntry>> = Vec::new();
        match self
            .window_after(&keys::timeline_key(user_id), cursor.as_ref(), take)
            .await
        {
            Ok(entries) => sources.push(entries),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "own timeline unavailable, serving partial feed");
            }
        }

        for author_id in self.followed_outbox_authors(user_id).await {
            match self
                .window_after(&keys::outbox_key(author_id), cursor.as_ref(), take)
                .await
            {
                Ok(entries) => sources.push(entries),
                Err(e) => {
                    warn!(
                        user_id = %user_id,
                        author_id = %author_id,
                        error = %e,
                        "outbox unavailable, serving partial feed"
                    );
                }
            }
        }

        Ok(assemble_page(sources, limit))
    }

    /// One page of the guest trending feed, same pagination contract.
    pub async fn guest_page(&self, cursor: Option<&str>, limit: u64) -> Result<FeedPage> {
        let cursor = decode_cursor(cursor)?;
        let limit = limit.clamp(1, MAX_PAGE_SIZE);

        let entries = match self
            .window_after(keys::guest_feed_key(), cursor.as_ref(), limit + 1)
            .await
        {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "guest feed unavailable, serving empty page");
                Vec::new()
            }
        };
        Ok(assemble_page(vec![entries], limit))
    }

    /// Followees that appear in the outbox author registry. Either lookup
    /// failing degrades to no outbox sources rather than an error.
    async fn followed_outbox_authors(&self, user_id: Uuid) -> Vec<Uuid> {
        let registry: HashSet<Uuid> = match self.store.set_members(keys::outbox_authors_key()).await
        {
            Ok(members) => members
                .iter()
                .filter_map(|m| Uuid::parse_str(m).ok())
                .collect(),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "outbox registry unavailable, merging own timeline only");
                return Vec::new();
            }
        };
        if registry.is_empty() {
            return Vec::new();
        }

        let following = self.graph.following_of(user_id).await;
        following
            .ids
            .into_iter()
            .filter(|id| registry.contains(id))
            .collect()
    }

    /// Up to `take` entries from one key strictly after `cursor`, best first.
    ///
    /// The fetch starts at the cursor score inclusively (the tie run may
    /// continue past the cursor member) and widens if an unusually long run
    /// of equal scores swallowed the whole window.
    async fn window_after(
        &self,
        key: &str,
        cursor: Option<&FeedCursor>,
        take: u64,
    ) -> ordered_store::Result<Vec<FeedEntry>> {
        let bound = match cursor {
            Some(c) => ScoreBound::Incl(c.score),
            None => ScoreBound::Inf,
        };
        let mut window = take + TIE_SCAN_EXTRA;
        loop {
            let raw = self.store.range_desc(key, bound, window).await?;
            let exhausted = (raw.len() as u64) < window;
            let mut entries: Vec<FeedEntry> = raw
                .into_iter()
                .filter_map(|m| {
                    Uuid::parse_str(&m.member).ok().map(|post_id| FeedEntry {
                        post_id,
                        score: m.score,
                    })
                })
                .filter(|e| match cursor {
                    Some(c) => after_cursor(e, c),
                    None => true,
                })
                .collect();
            if entries.len() as u64 >= take || exhausted {
                entries.truncate(take as usize);
                return Ok(entries);
            }
            window *= 2;
        }
    }
}

/// Strictly after `cursor` in descending (score, post id) order. Cursor
/// scores round-trip bit-exact through encoding, so direct equality on the
/// score is sound.
fn after_cursor(entry: &FeedEntry, cursor: &FeedCursor) -> bool {
    entry.score < cursor.score || (entry.score == cursor.score && entry.post_id < cursor.post_id)
}

fn decode_cursor(cursor: Option<&str>) -> Result<Option<FeedCursor>> {
    match cursor.filter(|c| !c.is_empty()) {
        Some(raw) => Ok(Some(FeedCursor::decode(raw)?)),
        None => Ok(None),
    }
}

/// Merge per-source windows into one page: descending (score, post id),
/// duplicates across sources dropped, cursor set when more remain.
fn assemble_page(sources: Vec<Vec<FeedEntry>>, limit: u64) -> FeedPage {
    let mut merged: Vec<FeedEntry> = sources.into_iter().flatten().collect();
    merged.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.post_id.cmp(&a.post_id))
    });

    let mut seen: HashSet<Uuid> = HashSet::with_capacity(merged.len());
    let mut entries: Vec<FeedEntry> = Vec::with_capacity(limit as usize + 1);
    for entry in merged {
        if seen.insert(entry.post_id) {
            entries.push(entry);
        }
        if entries.len() as u64 > limit {
            break;
        }
    }

    let has_more = entries.len() as u64 > limit;
    entries.truncate(limit as usize);
    let next_cursor = if has_more {
        entries.last().map(|e| FeedCursor::from_entry(e).encode())
    } else {
        None
    };
    FeedPage {
        entries,
        next_cursor,
    }
}
