//! Plain HTTP page fetcher.

mod user_agent;

pub use user_agent::{resolve_user_agent, BROWSER_HEADERS, USER_AGENT};

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, REFERER};
use reqwest::Client;
use tracing::debug;

use super::{Document, FetchError, PageFetcher};

/// Fetches pages with a single GET, presenting browser-like headers.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a new HTTP fetcher.
    ///
    /// `user_agent` accepts the same values as [`resolve_user_agent`];
    /// `referer` is sent with every request when set.
    pub fn new(
        timeout: Duration,
        user_agent: &str,
        referer: Option<&str>,
    ) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        for &(name, value) in BROWSER_HEADERS {
            headers.insert(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }
        if let Some(referer) = referer.and_then(|r| HeaderValue::from_str(r).ok()) {
            headers.insert(REFERER, referer);
        }

        let client = Client::builder()
            .user_agent(resolve_user_agent(Some(user_agent)))
            .default_headers(headers)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self { client })
    }

    fn map_error(url: &str, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout(url.to_string())
        } else {
            FetchError::Http {
                url: url.to_string(),
                source: e,
            }
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, url: &str) -> Result<Document, FetchError> {
        let start = Instant::now();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Self::map_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let content = response
            .text()
            .await
            .map_err(|e| Self::map_error(url, e))?;

        debug!(
            "Fetched {} ({} bytes, {} ms)",
            url,
            content.len(),
            start.elapsed().as_millis()
        );

        Ok(Document::new(final_url, content))
    }
}
