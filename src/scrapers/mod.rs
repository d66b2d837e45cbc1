//! Page fetchers for wiki pages.
//!
//! The extraction engine only sees the [`PageFetcher`] trait. Two
//! implementations exist: a plain HTTP client and a headless browser for
//! pages that need JavaScript to render.

pub mod browser;
mod http_client;

pub use browser::{BrowserEngineConfig, BrowserFetcher};
pub use http_client::{HttpFetcher, BROWSER_HEADERS, USER_AGENT};

use std::sync::Arc;

use async_trait::async_trait;
use scraper::Html;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Settings;

/// Errors from fetching a page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error for {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
    #[error("Timed out fetching {0}")]
    Timeout(String),
    #[error("Browser error: {0}")]
    Browser(String),
}

/// A fetched page.
///
/// Holds the raw markup; call [`Document::html`] to get a parsed tree.
/// The parsed tree is not `Send`, so it is built on demand inside
/// synchronous extraction code rather than carried across awaits.
#[derive(Debug, Clone)]
pub struct Document {
    pub url: String,
    pub content: String,
}

impl Document {
    pub fn new(url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content: content.into(),
        }
    }

    /// Parse the markup.
    pub fn html(&self) -> Html {
        Html::parse_document(&self.content)
    }
}

/// Fetch a page by URL.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Short name for logging.
    fn name(&self) -> &str;

    /// Fetch and return the page at `url`.
    async fn fetch(&self, url: &str) -> Result<Document, FetchError>;
}

/// Fetcher implementation selected at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FetcherKind {
    /// Direct HTTP requests with browser-like headers.
    #[default]
    Http,
    /// Headless Chrome via the DevTools protocol.
    Browser,
}

impl FetcherKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Browser => "browser",
        }
    }
}

impl std::str::FromStr for FetcherKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "browser" => Ok(Self::Browser),
            _ => Err(format!("unknown fetcher '{}'", s)),
        }
    }
}

/// Build the configured fetcher.
pub fn create_fetcher(settings: &Settings) -> anyhow::Result<Arc<dyn PageFetcher>> {
    match settings.fetcher {
        FetcherKind::Http => Ok(Arc::new(HttpFetcher::new(
            settings.request_timeout(),
            &settings.user_agent,
            settings.referer.as_deref(),
        )?)),
        FetcherKind::Browser => {
            let mut config = settings.browser.clone();
            config.timeout = settings.request_timeout;
            Ok(Arc::new(BrowserFetcher::new(config)))
        }
    }
}
