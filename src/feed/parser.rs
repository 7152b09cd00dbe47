use anyhow::Result;
use chrono::{DateTime, Utc};
use feed_rs::parser;
use sha2::{Digest, Sha256};

/// One normalized entry from a feed.
///
/// This is the fixed projection of whatever shape the parser emitted:
/// exactly these fields, everything else (categories, media, enclosures)
/// dropped at parse time. Text fields are carried verbatim from the
/// source, never re-encoded.
#[derive(Debug, Clone)]
pub struct FeedItem {
    /// Stable identifier used as the read-tracking key across refresh
    /// cycles. Source guid, falling back to the entry link, falling back
    /// to a hash of the remaining fields.
    pub guid: String,
    pub title: Option<String>,
    pub link: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    /// Missing or unparsable dates become the time of parsing, so the
    /// item sorts as "now" instead of failing ingestion.
    pub pub_date: DateTime<Utc>,
    /// Recomputed from the persisted read set at every merge; never part
    /// of the transient snapshot the fetcher produces.
    pub read: bool,
}

/// One fetched feed: either metadata plus items, or an error.
///
/// `url` is the canonical key shared by the fetcher, the store, and the
/// presentation layer. Exactly one of {metadata+items, error} is
/// populated, so a failed fetch never carries partial items.
#[derive(Debug, Clone)]
pub struct FetchedFeed {
    pub url: String,
    pub link: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Feed icon URL when the source declares one.
    pub image: Option<String>,
    /// Items in source order, before any display-limit truncation.
    pub items: Vec<FeedItem>,
    pub error: Option<String>,
}

impl FetchedFeed {
    /// Fallback entry for a URL whose fetch or parse failed. Consumers
    /// fall back to the raw URL where a title is needed.
    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            link: None,
            title: None,
            description: None,
            image: None,
            items: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Parse a feed body (RSS 2.0, Atom, or JSON Feed) and project it into
/// the fixed [`FetchedFeed`] shape.
pub fn parse_feed(url: &str, bytes: &[u8]) -> Result<FetchedFeed> {
    let feed = parser::parse(bytes)?;

    let image = feed
        .icon
        .map(|i| i.uri)
        .or_else(|| feed.logo.map(|l| l.uri));
    let link = feed.links.first().map(|l| l.href.clone());
    let title = feed.title.map(|t| t.content);
    let description = feed.description.map(|d| d.content);

    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry.links.first().map(|l| l.href.clone());
            let title = entry.title.map(|t| t.content);
            let author = entry.authors.first().map(|a| a.name.clone());
            let description = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body));
            let pub_date = entry.published.or(entry.updated).unwrap_or_else(Utc::now);

            let existing_id = if entry.id.is_empty() {
                None
            } else {
                Some(entry.id.as_str())
            };
            let guid = resolve_guid(existing_id, link.as_deref(), title.as_deref(), pub_date);

            FeedItem {
                guid,
                title,
                link,
                author,
                description,
                pub_date,
                read: false,
            }
        })
        .collect();

    Ok(FetchedFeed {
        url: url.to_string(),
        link,
        title,
        description,
        image,
        items,
        error: None,
    })
}

fn resolve_guid(
    existing: Option<&str>,
    link: Option<&str>,
    title: Option<&str>,
    pub_date: DateTime<Utc>,
) -> String {
    if let Some(guid) = existing {
        let trimmed = guid.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    if let Some(link) = link {
        let trimmed = link.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let input = format!("{}|{}", title.unwrap_or(""), pub_date.timestamp());
    let hash = Sha256::digest(input.as_bytes());
    format!("{:x}", hash)
}
