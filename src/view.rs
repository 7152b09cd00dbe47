//! Pure presentation over a store snapshot: ordering, selection, and
//! display-record formatting. No I/O and no store mutation happens here.

use crate::feed::FeedItem;
use crate::store::FeedState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Glyph names understood by the host launcher.
const RSS_ICON: &str = "#fa fa-rss";
const ERROR_ICON: &str = "#fa fa-exclamation";

/// Feed list ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedsOrder {
    /// Lexicographic by title.
    #[default]
    Name,
    /// Most recently published first.
    Date,
    /// Most unread items first.
    Unread,
}

/// Payload attached to an item record, handed back verbatim by the host
/// when the record is activated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenPayload {
    pub feed_url: String,
    pub guid: String,
    pub link: Option<String>,
}

/// One row for the host's list-with-detail UI.
#[derive(Debug, Clone)]
pub struct DisplayRecord {
    /// Action id the host echoes back on activation ("view", "open", ...).
    pub id: &'static str,
    pub title: String,
    pub description: String,
    pub icon: String,
    pub group: String,
    /// Query the host should jump to instead of executing an action.
    pub redirect: Option<String>,
    pub payload: Option<OpenPayload>,
    /// Feed rows: has unread items. Item rows: published after the feed
    /// was last viewed and not yet read.
    pub fresh: bool,
}

/// Sort the store's feeds for listing. Ties are stable, preserving the
/// store's iteration order (which is source order).
pub fn list_feeds(feeds: &[FeedState], order: FeedsOrder) -> Vec<&FeedState> {
    let mut sorted: Vec<&FeedState> = feeds.iter().collect();
    match order {
        FeedsOrder::Name => {
            sorted.sort_by(|a, b| display_title(a).cmp(&display_title(b)));
        }
        FeedsOrder::Date => {
            sorted.sort_by(|a, b| b.max_date.cmp(&a.max_date));
        }
        FeedsOrder::Unread => {
            sorted.sort_by(|a, b| b.nb_unread.cmp(&a.nb_unread));
        }
    }
    sorted
}

/// The feed's current item list, in stored (already truncated) order.
/// Failed feeds hold no items, so this is empty for them.
pub fn view_feed(state: &FeedState) -> &[FeedItem] {
    &state.feed.items
}

/// An item is "new" when it was published after the user last viewed the
/// feed and has not been read.
pub fn is_new(item: &FeedItem, last_access: DateTime<Utc>) -> bool {
    !item.read && last_access < item.pub_date
}

/// Title for display: feed title, falling back to the raw URL (failed
/// feeds have no metadata).
fn display_title(state: &FeedState) -> String {
    state
        .feed
        .title
        .clone()
        .unwrap_or_else(|| state.feed.url.clone())
}

/// Format one feed for the feed list.
pub fn feed_record(state: &FeedState) -> DisplayRecord {
    let mut title = display_title(state);
    if state.feed.error.is_some() {
        title.push_str(" [ERROR]");
    } else if state.nb_unread > 0 {
        title.push_str(&format!(" ({})", state.nb_unread));
    }

    let description = state
        .feed
        .error
        .clone()
        .or_else(|| state.feed.description.clone())
        .unwrap_or_default();

    let icon = if state.feed.error.is_some() {
        ERROR_ICON.to_string()
    } else {
        state.feed.image.clone().unwrap_or_else(|| RSS_ICON.to_string())
    };

    DisplayRecord {
        id: "view",
        title,
        description,
        icon,
        group: "RSS feeds".to_string(),
        redirect: Some(format!("/rss {}", state.feed.url)),
        payload: None,
        fresh: state.nb_unread > 0,
    }
}

/// Format one item for a feed's item list.
pub fn item_record(state: &FeedState, item: &FeedItem) -> DisplayRecord {
    let title = format!(
        "{} ({})",
        item.title.as_deref().unwrap_or("(untitled)"),
        item.pub_date.format("%d/%m/%y %H:%M:%S")
    );

    let mut description = item.link.clone().unwrap_or_default();
    if item.read {
        description.push_str(" ✓");
    }

    DisplayRecord {
        id: "open",
        title,
        description,
        icon: state.feed.image.clone().unwrap_or_else(|| RSS_ICON.to_string()),
        group: display_title(state),
        redirect: None,
        payload: Some(OpenPayload {
            feed_url: state.feed.url.clone(),
            guid: item.guid.clone(),
            link: item.link.clone(),
        }),
        fresh: is_new(item, state.last_access),
    }
}
