use crate::feed::parser::{parse_feed, FetchedFeed};
use futures::stream::{self, StreamExt};
use std::time::Duration;
use thiserror::Error;

/// In-flight fetches per refresh cycle. One slow feed can never block the
/// rest of the batch, and output order still matches input order.
const MAX_CONCURRENT_FETCHES: usize = 8;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Browser-like headers: some feed servers content-sniff and refuse
/// obvious bot user agents.
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) feedrack/0.1";
const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Errors that can occur fetching a single feed.
///
/// All variants are per-feed: the batch layer converts them into an
/// error-tagged [`FetchedFeed`] and they never propagate further.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error {0}")]
    HttpStatus(u16),
    /// Request exceeded the 30-second timeout
    #[error("Request timed out")]
    Timeout,
    /// Body could not be parsed as RSS, Atom, or JSON Feed
    #[error("Parse error: {0}")]
    Parse(String),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
}

/// Build the shared HTTP client used for all feed fetches.
pub fn build_client() -> Result<reqwest::Client, reqwest::Error> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::ACCEPT,
        reqwest::header::HeaderValue::from_static(ACCEPT),
    );

    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .build()
}

/// Fetch and parse one feed URL.
///
/// # Errors
///
/// - [`FetchError::Timeout`] - request exceeded 30 seconds
/// - [`FetchError::Network`] - connection or TLS errors
/// - [`FetchError::HttpStatus`] - non-2xx HTTP response
/// - [`FetchError::ResponseTooLarge`] - body exceeded 10MB
/// - [`FetchError::Parse`] - body was not a valid feed
pub async fn fetch_one(client: &reqwest::Client, url: &str) -> Result<FetchedFeed, FetchError> {
    // One deadline for the whole exchange, headers through end of body.
    // A server that stalls mid-body must not wedge the refresh cycle.
    tokio::time::timeout(REQUEST_TIMEOUT, fetch_inner(client, url))
        .await
        .map_err(|_| FetchError::Timeout)?
}

async fn fetch_inner(client: &reqwest::Client, url: &str) -> Result<FetchedFeed, FetchError> {
    let response = client.get(url).send().await.map_err(FetchError::Network)?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    let bytes = read_limited_bytes(response, MAX_FEED_SIZE).await?;

    parse_feed(url, &bytes).map_err(|e| FetchError::Parse(e.to_string()))
}

/// Fetch every URL in `urls`, isolating per-URL failures.
///
/// Returns exactly one [`FetchedFeed`] per input URL, in input order,
/// once every fetch has resolved. A failed URL yields a fallback entry
/// with `error` set and no items; it never aborts or reorders the batch.
/// Empty input resolves immediately to an empty list.
pub async fn fetch_all(client: &reqwest::Client, urls: &[String]) -> Vec<FetchedFeed> {
    stream::iter(urls.iter().cloned())
        .map(|url| {
            let client = client.clone();
            async move {
                match fetch_one(&client, &url).await {
                    Ok(feed) => {
                        tracing::debug!(feed = %url, items = feed.items.len(), "Fetched feed");
                        feed
                    }
                    Err(e) => {
                        tracing::error!(feed = %url, error = %e, "Feed fetch failed");
                        FetchedFeed::failed(url, e.to_string())
                    }
                }
            }
        })
        .buffered(MAX_CONCURRENT_FETCHES)
        .collect()
        .await
}

/// Consume the response body incrementally, bounding memory for large
/// feeds and rejecting bodies over `limit`.
async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
