use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use url::Url;

use super::extract::{extract_article, ExtractError};
use crate::feed::CLIENT_USER_AGENT;
use crate::observe::PullObserver;

/// Timeout applied when none is configured
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Pages larger than this are refused before extraction
pub const MAX_PAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to fetch URL: {0}")]
    Request(#[from] reqwest::Error),

    #[error("non-200 status code: {0}")]
    Status(u16),

    #[error("non-HTML content type: {0}")]
    ContentType(String),

    #[error("page too large ({0} bytes)")]
    TooLarge(u64),

    #[error("failed to parse content: {0}")]
    Extraction(#[from] ExtractError),
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Request(e) if e.is_timeout())
    }
}

/// Readable content of an article page
#[derive(Debug, Clone)]
pub struct FetchedContent {
    /// Cleaned article HTML
    pub content: String,
    pub title: String,
}

/// Fetches the full content behind an item link
#[async_trait]
pub trait FetchContent: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedContent, FetchError>;
}

/// Single-shot page fetcher with readability extraction. No retries, no caching.
#[derive(Clone)]
pub struct ContentFetcher {
    client: Client,
    timeout: Duration,
    observer: Arc<dyn PullObserver>,
}

impl ContentFetcher {
    /// `timeout` of zero selects [`DEFAULT_FETCH_TIMEOUT`]
    pub fn new(timeout: Duration, observer: Arc<dyn PullObserver>) -> crate::Result<Self> {
        let client = Client::builder()
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;

        let timeout = if timeout.is_zero() {
            DEFAULT_FETCH_TIMEOUT
        } else {
            timeout
        };

        Ok(Self {
            client,
            timeout,
            observer,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch `url` and extract its main content
    pub async fn fetch_with_timeout(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<FetchedContent, FetchError> {
        let mut response = self
            .client
            .get(url)
            .timeout(timeout)
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.5")
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.to_lowercase().contains("text/html") {
            return Err(FetchError::ContentType(content_type));
        }

        if let Some(len) = response.content_length() {
            ensure_page_size(len)?;
        }

        let base = Url::parse(url).unwrap_or_else(|_| response.url().clone());
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            bytes.extend_from_slice(&chunk);
            ensure_page_size(bytes.len() as u64)?;
        }
        let body = String::from_utf8_lossy(&bytes);

        let article = extract_article(&body, &base)?;

        Ok(FetchedContent {
            content: article.content,
            title: article.title,
        })
    }
}

fn ensure_page_size(size: u64) -> Result<(), FetchError> {
    if size > MAX_PAGE_BYTES as u64 {
        return Err(FetchError::TooLarge(size));
    }
    Ok(())
}

#[async_trait]
impl FetchContent for ContentFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedContent, FetchError> {
        let result = self.fetch_with_timeout(url, self.timeout).await;
        self.observer.content_fetched(url, result.as_ref());
        result
    }
}
