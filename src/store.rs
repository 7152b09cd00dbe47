//! In-memory feed collection merged with persisted read/last-access state.
//!
//! The store is the single place refresh results land and the single place
//! the presentation layer reads from. Every mutation and read must go
//! through one owner (the engine holds it behind a lock); the fetch layer
//! returns plain data and never touches the store directly.

use crate::feed::FetchedFeed;
use crate::storage::KeyValue;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Storage key for the set of item guids the user has opened.
const ITEMS_READ_KEY: &str = "itemsRead";
/// Storage key for the per-feed last-view timestamps.
const LAST_ACCESS_KEY: &str = "lastAccess";

/// One feed as held by the store: the fetched snapshot plus derived and
/// cross-cycle state.
#[derive(Debug, Clone)]
pub struct FeedState {
    pub feed: FetchedFeed,
    /// Count of retained items not in the persisted read set. Zero for
    /// failed feeds.
    pub nb_unread: usize,
    /// When the user last viewed this feed; until a view is recorded it
    /// defaults to the time of the latest refresh.
    pub last_access: DateTime<Utc>,
    /// Max pub_date among retained items; `None` for empty or failed
    /// feeds.
    pub max_date: Option<DateTime<Utc>>,
}

pub struct FeedStore {
    feeds: Vec<FeedState>,
    items_read: HashSet<String>,
    last_access: HashMap<String, DateTime<Utc>>,
    kv: Arc<dyn KeyValue>,
}

impl FeedStore {
    /// Build a store, loading the persisted maps once. Unreadable or
    /// malformed persisted values start empty rather than failing init.
    pub fn load(kv: Arc<dyn KeyValue>) -> Self {
        let items_read: HashSet<String> = kv
            .get(ITEMS_READ_KEY)
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        let last_access: HashMap<String, DateTime<Utc>> = kv
            .get(LAST_ACCESS_KEY)
            .and_then(|v| serde_json::from_value::<HashMap<String, String>>(v).ok())
            .map(|raw| {
                raw.into_iter()
                    .filter_map(|(url, ts)| {
                        DateTime::parse_from_rfc3339(&ts)
                            .ok()
                            .map(|dt| (url, dt.with_timezone(&Utc)))
                    })
                    .collect()
            })
            .unwrap_or_default();

        tracing::debug!(
            read_markers = items_read.len(),
            access_records = last_access.len(),
            "Loaded persisted feed state"
        );

        Self {
            feeds: Vec::new(),
            items_read,
            last_access,
            kv,
        }
    }

    /// Replace the feed collection with the results of a refresh cycle.
    ///
    /// Per feed: truncate items to `items_limit` in source order, derive
    /// `read` from the persisted read set, count unread, resolve
    /// last-access (defaulting to now for never-viewed URLs), and compute
    /// the max pub date. Failed feeds keep their entry with neutral
    /// derived fields so they stay listable.
    pub fn apply_refresh(&mut self, fetched: Vec<FetchedFeed>, items_limit: usize) {
        let now = Utc::now();

        self.feeds = fetched
            .into_iter()
            .map(|mut feed| {
                // Default stays feed-local; the persisted map only ever
                // gains entries through mark_feed_accessed.
                let last_access = self.last_access.get(&feed.url).copied().unwrap_or(now);

                if feed.error.is_some() {
                    return FeedState {
                        feed,
                        nb_unread: 0,
                        last_access,
                        max_date: None,
                    };
                }

                feed.items.truncate(items_limit);

                let mut nb_unread = 0;
                for item in &mut feed.items {
                    item.read = self.items_read.contains(&item.guid);
                    if !item.read {
                        nb_unread += 1;
                    }
                }

                let max_date = feed.items.iter().map(|i| i.pub_date).max();

                FeedState {
                    feed,
                    nb_unread,
                    last_access,
                    max_date,
                }
            })
            .collect();
    }

    /// Mark one item as read and persist the read marker. Idempotent:
    /// repeating the call changes nothing in memory or on disk.
    pub fn mark_item_read(&mut self, feed_url: &str, guid: &str) {
        if !self.items_read.insert(guid.to_string()) {
            return;
        }

        if let Some(state) = self.feeds.iter_mut().find(|s| s.feed.url == feed_url) {
            if let Some(item) = state.feed.items.iter_mut().find(|i| i.guid == guid) {
                if !item.read {
                    item.read = true;
                    state.nb_unread = state.nb_unread.saturating_sub(1);
                }
            }
        }

        self.persist_items_read();
    }

    /// Record that the user viewed a feed, in memory and persisted.
    pub fn mark_feed_accessed(&mut self, feed_url: &str) {
        let now = Utc::now();
        self.last_access.insert(feed_url.to_string(), now);

        if let Some(state) = self.feeds.iter_mut().find(|s| s.feed.url == feed_url) {
            state.last_access = now;
        }

        self.persist_last_access();
    }

    pub fn feeds(&self) -> &[FeedState] {
        &self.feeds
    }

    pub fn feed(&self, url: &str) -> Option<&FeedState> {
        self.feeds.iter().find(|s| s.feed.url == url)
    }

    fn persist_items_read(&self) {
        // Sorted for a stable on-disk representation
        let mut guids: Vec<&String> = self.items_read.iter().collect();
        guids.sort();

        match serde_json::to_value(&guids) {
            Ok(value) => {
                if let Err(e) = self.kv.set(ITEMS_READ_KEY, value) {
                    tracing::warn!(error = %e, "Failed to persist read markers");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to encode read markers"),
        }
    }

    fn persist_last_access(&self) {
        let raw: HashMap<&String, String> = self
            .last_access
            .iter()
            .map(|(url, dt)| (url, dt.to_rfc3339()))
            .collect();

        match serde_json::to_value(&raw) {
            Ok(value) => {
                if let Err(e) = self.kv.set(LAST_ACCESS_KEY, value) {
                    tracing::warn!(error = %e, "Failed to persist access times");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Failed to encode access times"),
        }
    }
}
