//! Headless browser fetcher for pages that render with JavaScript.
//!
//! Uses chromiumoxide (CDP). Navigates, waits a fixed settle delay for page
//! scripts, then reads the rendered markup.

mod config;

pub use config::BrowserEngineConfig;

use async_trait::async_trait;

use super::{Document, FetchError, PageFetcher};

#[cfg(feature = "browser")]
use std::time::Duration;

#[cfg(feature = "browser")]
use anyhow::Context;
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tokio::sync::Mutex;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

/// Browser-based fetcher.
#[cfg(feature = "browser")]
pub struct BrowserFetcher {
    config: BrowserEngineConfig,
    browser: Mutex<Option<Browser>>,
}

#[cfg(feature = "browser")]
impl BrowserFetcher {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/opt/google/chrome/google-chrome",
    ];

    /// Create a new browser fetcher. The browser starts on first fetch.
    pub fn new(config: BrowserEngineConfig) -> Self {
        Self {
            config,
            browser: Mutex::new(None),
        }
    }

    fn find_chrome() -> anyhow::Result<std::path::PathBuf> {
        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        which::which("chromium")
            .or_else(|_| which::which("google-chrome"))
            .or_else(|_| which::which("chromium-browser"))
            .map_err(|_| {
                anyhow::anyhow!(
                    "Chrome/Chromium not found. Install chromium or set browser.remote_url"
                )
            })
    }

    async fn launch(&self) -> anyhow::Result<Browser> {
        if let Some(ref remote_url) = self.config.remote_url {
            info!("Connecting to remote browser at {}", remote_url);
            let handler_config = chromiumoxide::handler::HandlerConfig {
                request_timeout: Duration::from_secs(self.config.timeout),
                ..Default::default()
            };
            let (browser, mut handler) =
                Browser::connect_with_config(remote_url.clone(), handler_config)
                    .await
                    .context("Failed to connect to remote browser")?;
            tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            });
            return Ok(browser);
        }

        info!("Launching browser (headless={})", self.config.headless);
        let mut builder = BrowserConfig::builder().chrome_executable(Self::find_chrome()?);
        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(ref proxy) = self.config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }
        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-sandbox")
            .arg("--disable-gpu");
        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {}", e))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser")?;

        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(browser)
    }

    /// Render `url` in a fresh tab. The tab is closed whether loading
    /// succeeds, fails or times out.
    async fn render(&self, url: &str) -> Result<Document, FetchError> {
        let load_timeout = Duration::from_secs(self.config.timeout)
            + Duration::from_millis(self.config.settle_ms);

        let mut guard = self.browser.lock().await;
        if guard.is_none() {
            let browser = self
                .launch()
                .await
                .map_err(|e| FetchError::Browser(format!("{:#}", e)))?;
            *guard = Some(browser);
        }
        let Some(browser) = guard.as_ref() else {
            return Err(FetchError::Browser("Browser not available".to_string()));
        };

        let page = match tokio::time::timeout(load_timeout, browser.new_page("about:blank")).await
        {
            Ok(Ok(page)) => page,
            Ok(Err(e)) => return Err(FetchError::Browser(format!("{}: {}", url, e))),
            Err(_) => return Err(FetchError::Timeout(url.to_string())),
        };

        debug!("Navigating to {}", url);
        let loaded = tokio::time::timeout(load_timeout, self.load(&page, url)).await;

        if let Err(e) = page.close().await {
            warn!("Failed to close tab for {}: {}", url, e);
        }

        load_outcome(url, loaded)
    }

    async fn load(&self, page: &Page, url: &str) -> anyhow::Result<Document> {
        page.goto(url).await?;
        page.wait_for_navigation().await?;

        tokio::time::sleep(Duration::from_millis(self.config.settle_ms)).await;

        let final_url = page.url().await?.unwrap_or_else(|| url.to_string());
        let content = page.content().await?;
        Ok(Document::new(final_url, content))
    }
}

#[cfg(feature = "browser")]
fn load_outcome(
    url: &str,
    loaded: Result<anyhow::Result<Document>, tokio::time::error::Elapsed>,
) -> Result<Document, FetchError> {
    match loaded {
        Ok(Ok(doc)) => Ok(doc),
        Ok(Err(e)) => Err(FetchError::Browser(format!("{}: {:#}", url, e))),
        Err(_) => Err(FetchError::Timeout(url.to_string())),
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl PageFetcher for BrowserFetcher {
    fn name(&self) -> &str {
        "browser"
    }

    async fn fetch(&self, url: &str) -> Result<Document, FetchError> {
        self.render(url).await
    }
}

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
pub struct BrowserFetcher {
    #[allow(dead_code)]
    config: BrowserEngineConfig,
}

#[cfg(not(feature = "browser"))]
impl BrowserFetcher {
    pub fn new(config: BrowserEngineConfig) -> Self {
        Self { config }
    }
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl PageFetcher for BrowserFetcher {
    fn name(&self) -> &str {
        "browser"
    }

    async fn fetch(&self, _url: &str) -> Result<Document, FetchError> {
        Err(FetchError::Browser(
            "Browser support not compiled. Rebuild with: cargo build --features browser"
                .to_string(),
        ))
    }
}
