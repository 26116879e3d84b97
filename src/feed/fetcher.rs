use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use thiserror::Error;

/// Default cap on a feed body, in bytes (10MB)
pub const DEFAULT_MAX_FEED_SIZE: usize = 10 * 1024 * 1024;

/// Content types a feed endpoint may answer with, most specific first
const FEED_ACCEPT: &str =
    "application/rss+xml, application/atom+xml, application/xml, text/xml;q=0.9, */*;q=0.8";

/// Edge cache hint sent with every feed request (5 minutes)
const FEED_CACHE_CONTROL: &str = "max-age=300";

/// Errors that can occur while downloading a feed.
///
/// Any of these aborts processing for the feed being fetched only.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Response body exceeded the configured size limit
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    /// Response body was not valid UTF-8
    #[error("Invalid UTF-8 in response")]
    InvalidUtf8,
}

/// Downloads feeds over HTTP.
///
/// Holds a shared [`reqwest::Client`] configured with the service user
/// agent. There are no retries and no request timeout: a failed request
/// fails the feed, and the next scheduled run tries again.
#[derive(Clone)]
pub struct FeedFetcher {
    client: reqwest::Client,
    max_feed_size: usize,
}

impl FeedFetcher {
    pub fn new(user_agent: &str, max_feed_size: usize) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self::with_client(client, max_feed_size))
    }

    pub fn with_client(client: reqwest::Client, max_feed_size: usize) -> Self {
        Self {
            client,
            max_feed_size,
        }
    }

    /// Fetch the raw XML text of a feed.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Network`] - Connection, DNS or TLS failure
    /// - [`FetchError::HttpStatus`] - Non-2xx HTTP response
    /// - [`FetchError::ResponseTooLarge`] - Body exceeded the size limit
    /// - [`FetchError::InvalidUtf8`] - Body was not UTF-8 text
    pub async fn fetch_feed(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, FEED_ACCEPT)
            .header(CACHE_CONTROL, FEED_CACHE_CONTROL)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let bytes = read_limited_bytes(response, self.max_feed_size).await?;
        tracing::debug!(url = %url, bytes = bytes.len(), "Fetched feed");
        String::from_utf8(bytes).map_err(|_| FetchError::InvalidUtf8)
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
