use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;

use crate::settings::FeedConfig;
use crate::util::{validate_feed_url, UrlValidationError};

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Default response body cap.
pub const DEFAULT_MAX_FEED_BYTES: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while retrieving a single feed document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL did not parse or is not http/https; no request was made
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),
    /// Feed is switched off in its configuration
    #[error("Feed is disabled")]
    Disabled,
    /// Server answered successfully with no body
    #[error("Empty response")]
    EmptyResponse,
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Request timed out")]
    Timeout,
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Received fewer bytes than Content-Length announced
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// A [`FetchError`] attributed to the feed it happened on.
#[derive(Debug, Error)]
#[error("Fetching '{feed}' ({url}) failed: {kind}")]
pub struct FetchFailure {
    /// Display name of the feed.
    pub feed: String,
    pub url: String,
    #[source]
    pub kind: FetchError,
}

/// Limits applied to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub max_bytes: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_REQUEST_TIMEOUT,
            max_bytes: DEFAULT_MAX_FEED_BYTES,
        }
    }
}

/// Outcome of one fetch, carrying the configuration it was started with.
#[derive(Debug)]
pub struct FetchResult {
    pub feed: FeedConfig,
    pub result: Result<Vec<u8>, FetchFailure>,
}

/// Fetches the raw document of one feed.
///
/// Fails fast with [`FetchError::Disabled`] or [`FetchError::InvalidUrl`]
/// before any network traffic. Otherwise one GET is issued; there are no
/// retries, the next scheduled cycle is the retry.
///
/// # Errors
///
/// - [`FetchError::Timeout`] - Request exceeded `options.timeout`
/// - [`FetchError::Network`] - Connection or TLS errors
/// - [`FetchError::HttpStatus`] - Non-2xx HTTP response
/// - [`FetchError::ResponseTooLarge`] - Body exceeded `options.max_bytes`
/// - [`FetchError::IncompleteResponse`] - Body shorter than Content-Length
/// - [`FetchError::EmptyResponse`] - Zero-length body
pub async fn fetch_feed(
    client: &reqwest::Client,
    feed: &FeedConfig,
    options: &FetchOptions,
) -> Result<Vec<u8>, FetchFailure> {
    fetch_bytes(client, feed, options)
        .await
        .map_err(|kind| FetchFailure {
            feed: feed.name.clone(),
            url: feed.url.clone(),
            kind,
        })
}

async fn fetch_bytes(
    client: &reqwest::Client,
    feed: &FeedConfig,
    options: &FetchOptions,
) -> Result<Vec<u8>, FetchError> {
    if !feed.enabled {
        return Err(FetchError::Disabled);
    }
    let url = validate_feed_url(&feed.url)?;

    tracing::debug!(feed = %feed.name, url = %url, "Fetching feed");

    let response = tokio::time::timeout(options.timeout, client.get(url).send())
        .await
        .map_err(|_| FetchError::Timeout)?
        .map_err(FetchError::Network)?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    // The timeout covers the body as well as the headers
    let bytes = tokio::time::timeout(
        options.timeout,
        read_body(response, options.max_bytes),
    )
    .await
    .map_err(|_| FetchError::Timeout)??;

    if bytes.is_empty() {
        return Err(FetchError::EmptyResponse);
    }
    Ok(bytes)
}

/// Streams the body into memory, enforcing `limit` and the announced length.
async fn read_body(response: reqwest::Response, limit: usize) -> Result<Vec<u8>, FetchError> {
    let announced = response.content_length();
    if announced.is_some_and(|len| len > limit as u64) {
        return Err(FetchError::ResponseTooLarge);
    }

    let capacity = announced.map_or(0, |len| len as usize);
    let mut body = Vec::with_capacity(capacity);
    let mut chunks = response.bytes_stream();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        if body.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        body.extend_from_slice(&chunk);
    }

    match announced {
        Some(expected) if (body.len() as u64) < expected => Err(FetchError::IncompleteResponse {
            expected,
            received: body.len(),
        }),
        _ => Ok(body),
    }
}
