use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, Proxy, StatusCode};
use thiserror::Error;

use super::models::{FeedRequestOptions, NewItem};
use super::parser::parse_feed;
use crate::config::PullConfig;

const MAX_FEED_BYTES: usize = 5 * 1024 * 1024;
const MAX_RETRIES: u32 = 3;
const INITIAL_RETRY_DELAY_MS: u64 = 500;

pub(crate) const CLIENT_USER_AGENT: &str =
    concat!("Mozilla/5.0 (compatible; feedmill/", env!("CARGO_PKG_VERSION"), ")");

/// Why a feed could not be read. Recorded on the feed, never propagated past a pull.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("invalid feed URL: {0}")]
    InvalidUrl(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status code: {0}")]
    Status(u16),

    #[error("feed too large ({0} bytes)")]
    TooLarge(usize),

    #[error("failed to parse feed: {0}")]
    Parse(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Items found by one read of a feed
#[derive(Debug, Default)]
pub struct FetchItemsResult {
    pub items: Vec<NewItem>,
    pub last_build: Option<DateTime<Utc>>,
}

/// Reads a feed from its source and converts it to [`NewItem`]s.
///
/// Closures of the shape `Fn(String, FeedRequestOptions) -> impl Future` implement
/// this trait too, which is how tests inject canned results.
#[async_trait]
pub trait ReadFeedItems: Send + Sync {
    async fn read(
        &self,
        feed_url: &str,
        options: &FeedRequestOptions,
    ) -> Result<FetchItemsResult, ReadError>;
}

#[async_trait]
impl<F, Fut> ReadFeedItems for F
where
    F: Fn(String, FeedRequestOptions) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<FetchItemsResult, ReadError>> + Send + 'static,
{
    async fn read(
        &self,
        feed_url: &str,
        options: &FeedRequestOptions,
    ) -> Result<FetchItemsResult, ReadError> {
        (self)(feed_url.to_string(), options.clone()).await
    }
}

/// Default feed reader: HTTP via reqwest, parsing via feed-rs
pub struct HttpFeedReader {
    client: Client,
    timeout: Duration,
}

impl HttpFeedReader {
    pub fn new(config: &PullConfig) -> crate::Result<Self> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let client = Self::build_client(timeout, config.proxy_url.as_deref())?;

        Ok(Self { client, timeout })
    }

    /// Build HTTP client with optional proxy
    fn build_client(timeout: Duration, proxy_url: Option<&str>) -> crate::Result<Client> {
        let mut builder = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(10));

        if let Some(proxy) = proxy_url {
            let proxy = Proxy::all(proxy)
                .map_err(|e| crate::Error::Config(format!("Invalid proxy URL: {}", e)))?;
            builder = builder.proxy(proxy);
            tracing::info!("Using HTTP proxy for feed fetching");
        }

        Ok(builder.build()?)
    }

    /// Default headers merged with the feed's own
    fn build_headers(options: &FeedRequestOptions) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "application/rss+xml,application/atom+xml,application/feed+json,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

        for (name, value) in &options.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => tracing::warn!("Skipping invalid custom header: {}", name),
            }
        }
        headers
    }

    /// Client for this feed; feeds with their own proxy get a dedicated one
    fn client_for(&self, options: &FeedRequestOptions) -> Result<Client, ReadError> {
        match options.proxy.as_deref() {
            Some(proxy) => Self::build_client(self.timeout, Some(proxy))
                .map_err(|e| ReadError::InvalidUrl(e.to_string())),
            None => Ok(self.client.clone()),
        }
    }

    /// Fetch with retry and exponential backoff on 429/503 and transport errors
    async fn fetch_with_retry(
        &self,
        client: &Client,
        url: &str,
        headers: &HeaderMap,
    ) -> Result<(StatusCode, Bytes), ReadError> {
        let mut last_error = None;
        let mut delay_ms = INITIAL_RETRY_DELAY_MS;

        for attempt in 0..MAX_RETRIES {
            tracing::debug!("Fetch attempt {} for {}", attempt + 1, url);

            match client.get(url).headers(headers.clone()).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status == StatusCode::TOO_MANY_REQUESTS
                        || status == StatusCode::SERVICE_UNAVAILABLE
                    {
                        tracing::warn!(
                            "Received {} for {}, retrying after {}ms...",
                            status,
                            url,
                            delay_ms
                        );
                        last_error = Some(ReadError::Status(status.as_u16()));
                    } else {
                        if let Some(len) = response.content_length() {
                            ensure_content_size(len as usize)?;
                        }
                        match response.bytes().await {
                            Ok(bytes) => return Ok((status, bytes)),
                            Err(e) => {
                                tracing::warn!("Failed to read response body: {}", e);
                                last_error = Some(ReadError::Request(e));
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "Request failed for {} (attempt {}): {}",
                        url,
                        attempt + 1,
                        e
                    );
                    last_error = Some(ReadError::Request(e));
                }
            }

            if attempt < MAX_RETRIES - 1 {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                delay_ms *= 2;
            }
        }

        Err(last_error.unwrap_or(ReadError::Timeout(self.timeout)))
    }
}

fn ensure_content_size(size: usize) -> Result<(), ReadError> {
    if size > MAX_FEED_BYTES {
        return Err(ReadError::TooLarge(size));
    }
    Ok(())
}

#[async_trait]
impl ReadFeedItems for HttpFeedReader {
    async fn read(
        &self,
        feed_url: &str,
        options: &FeedRequestOptions,
    ) -> Result<FetchItemsResult, ReadError> {
        url::Url::parse(feed_url).map_err(|e| ReadError::InvalidUrl(e.to_string()))?;

        tracing::info!("Fetching feed from: {}", feed_url);

        let client = self.client_for(options)?;
        let headers = Self::build_headers(options);
        let (status, content) = self.fetch_with_retry(&client, feed_url, &headers).await?;

        if !status.is_success() {
            return Err(ReadError::Status(status.as_u16()));
        }
        ensure_content_size(content.len())?;

        let parsed = parse_feed(&content).map_err(|e| ReadError::Parse(e.to_string()))?;

        Ok(FetchItemsResult {
            items: parsed.items,
            last_build: parsed.last_build,
        })
    }
}
