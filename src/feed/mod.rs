//! Feed fetching and normalization.
//!
//! - [`parser`] - feed-rs parsing and projection into the fixed
//!   [`FetchedFeed`]/[`FeedItem`] shape
//! - [`fetcher`] - HTTP retrieval with per-feed failure isolation and
//!   order-preserving batch fetches

mod fetcher;
mod parser;

pub use fetcher::{build_client, fetch_all, fetch_one, FetchError};
pub use parser::{parse_feed, FeedItem, FetchedFeed};
