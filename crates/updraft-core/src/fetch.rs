use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Url;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use thiserror::Error;

const FEED_ACCEPT: &str =
    "application/rss+xml, application/xml, application/json;q=0.9, */*;q=0.8";
const BODY_SNIPPET_CHARS: usize = 160;

/// Raw feed bytes as returned by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDocument {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

impl FeedDocument {
    #[must_use]
    pub fn new(body: impl Into<Vec<u8>>, content_type: Option<&str>) -> Self {
        Self {
            body: body.into(),
            content_type: content_type.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("unsupported feed URL scheme '{scheme}'")]
    UnsupportedScheme { scheme: String },
    #[error("{}: {details}", network_label(.timed_out))]
    Network { details: String, timed_out: bool },
    #[error("update feed request failed with HTTP {status}{body_snippet}")]
    HttpStatus { status: u16, body_snippet: String },
}

impl FetchError {
    fn network(error: &reqwest::Error) -> Self {
        Self::Network {
            details: error.to_string(),
            timed_out: error.is_timeout(),
        }
    }
}

/// One network retrieval of a feed document.
///
/// Implementations issue exactly one request per call and neither retry
/// nor cache; retry policy belongs to the caller.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<FeedDocument, FetchError>;
}

/// [`FeedFetcher`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFeedFetcher {
    client: reqwest::Client,
}

impl HttpFeedFetcher {
    /// Build a fetcher whose requests give up after `timeout`.
    ///
    /// # Errors
    /// Returns the builder error when the TLS backend cannot be initialized.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Reuse an existing client, for applications that already share one.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &Url) -> Result<FeedDocument, FetchError> {
        ensure_http_scheme(url)?;
        debug!("Fetching update feed from {url}");

        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, FEED_ACCEPT)
            .send()
            .await
            .map_err(|error| FetchError::network(&error))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body_snippet = response
                .text()
                .await
                .ok()
                .map(|body| response_snippet(&body, BODY_SNIPPET_CHARS))
                .unwrap_or_default();
            return Err(FetchError::HttpStatus {
                status,
                body_snippet,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|error| FetchError::network(&error))?;

        debug!(
            "Fetched {} bytes of update feed ({})",
            body.len(),
            content_type.as_deref().unwrap_or("no content type")
        );
        Ok(FeedDocument {
            body: body.to_vec(),
            content_type,
        })
    }
}

/// Reject anything that is not an absolute `http`/`https` address.
///
/// # Errors
/// Returns [`FetchError::UnsupportedScheme`] for other schemes.
pub fn ensure_http_scheme(url: &Url) -> Result<(), FetchError> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(FetchError::UnsupportedScheme {
            scheme: other.to_string(),
        }),
    }
}

fn network_label(timed_out: &bool) -> &'static str {
    if *timed_out {
        "feed request timed out"
    } else {
        "failed to fetch update feed"
    }
}

fn response_snippet(body: &str, max_chars: usize) -> String {
    let snippet: String = body.trim().chars().take(max_chars).collect();
    if snippet.is_empty() {
        String::new()
    } else {
        format!(": {snippet}")
    }
}
