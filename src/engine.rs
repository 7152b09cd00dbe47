//! The plugin engine: owns the store, the HTTP client, and the refresher
//! task, and exposes the narrow surface the host launcher drives.
//!
//! Concurrency contract: the store lives behind one async mutex and every
//! read and mutation goes through it, so a search can never observe a
//! half-applied refresh. Network fetches run outside the lock and hand
//! their results to the store as one batch.

use crate::config::Config;
use crate::feed::{build_client, fetch_all};
use crate::preview;
use crate::scheduler::{self, FetchFn, RefresherHandle};
use crate::storage::KeyValue;
use crate::store::FeedStore;
use crate::view::{self, DisplayRecord, OpenPayload};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// What the host should do after `execute`. Opening URLs is the host's
/// job; the engine only reports the intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    None,
    OpenUrl(String),
}

pub struct Engine {
    store: Arc<Mutex<FeedStore>>,
    config_tx: watch::Sender<Config>,
    refresher: RefresherHandle,
}

impl Engine {
    /// Build the engine and start the refresh lifecycle (an initial
    /// refresh runs immediately). Persisted read/last-access state is
    /// loaded from `kv` once, here.
    pub fn new(config: Config, kv: Arc<dyn KeyValue>) -> Result<Self, reqwest::Error> {
        let client = build_client()?;
        let store = Arc::new(Mutex::new(FeedStore::load(kv)));

        let fetch: FetchFn = Arc::new(move |urls| {
            let client = client.clone();
            Box::pin(async move { fetch_all(&client, &urls).await })
        });

        let (config_tx, config_rx) = watch::channel(config);
        let refresher = scheduler::spawn(Arc::clone(&store), fetch, config_rx);

        Ok(Self {
            store,
            config_tx,
            refresher,
        })
    }

    /// Answer one host query.
    ///
    /// Empty query: the feed list in the configured order. A query equal
    /// to a configured feed URL: that feed's items, also recording the
    /// view (the returned records still reflect the previous last-access,
    /// so "new" flags survive the render that consumes them). Anything
    /// else: no records.
    pub async fn search(&self, query: &str) -> Vec<DisplayRecord> {
        let query = query.trim();
        let config = self.config_tx.borrow().clone();

        if config.sources.is_empty() {
            return vec![DisplayRecord {
                id: "none",
                title: "No RSS feeds".to_string(),
                description: "Add RSS sources to the plugin preferences".to_string(),
                icon: "#fa fa-rss".to_string(),
                group: "RSS feeds".to_string(),
                redirect: Some("/preferences".to_string()),
                payload: None,
                fresh: false,
            }];
        }

        let mut store = self.store.lock().await;

        if query.is_empty() {
            return view::list_feeds(store.feeds(), config.feeds_order)
                .into_iter()
                .map(view::feed_record)
                .collect();
        }

        let Some(state) = store.feed(query) else {
            return Vec::new();
        };

        let records: Vec<DisplayRecord> = view::view_feed(state)
            .iter()
            .map(|item| view::item_record(state, item))
            .collect();

        let url = state.feed.url.clone();
        store.mark_feed_accessed(&url);

        records
    }

    /// Handle an activated record. `"open"` marks the item read and asks
    /// the host to open its link; unknown action ids are no-ops.
    pub async fn execute(&self, action_id: &str, payload: &OpenPayload) -> Effect {
        match action_id {
            "open" => {
                self.store
                    .lock()
                    .await
                    .mark_item_read(&payload.feed_url, &payload.guid);

                match &payload.link {
                    Some(link) => Effect::OpenUrl(link.clone()),
                    None => Effect::None,
                }
            }
            other => {
                tracing::debug!(action = other, "Ignoring unknown action");
                Effect::None
            }
        }
    }

    /// Detail-pane markup for an item, when previews are enabled and the
    /// item is still in the store.
    pub async fn render_preview(&self, payload: &OpenPayload) -> Option<String> {
        if !self.config_tx.borrow().enable_preview {
            return None;
        }

        let store = self.store.lock().await;
        let state = store.feed(&payload.feed_url)?;
        let item = state.feed.items.iter().find(|i| i.guid == payload.guid)?;
        Some(preview::render_preview(item))
    }

    /// Request a refresh now. Idempotent while one is already in flight.
    pub fn refresh_now(&self) {
        self.refresher.trigger();
    }

    /// Swap in a new configuration. Affects the next scheduling decision
    /// and the next refresh cycle; an in-flight batch is not cancelled.
    pub fn update_config(&self, config: Config) {
        let _ = self.config_tx.send(config);
    }

    /// Stop the refresh task. The store and its persisted state remain
    /// valid; this only ends the background lifecycle.
    pub async fn shutdown(self) {
        self.refresher.stop().await;
    }

    /// Direct store access for hosts that render outside `search`.
    pub fn store(&self) -> Arc<Mutex<FeedStore>> {
        Arc::clone(&self.store)
    }
}
