//! Configuration management using the prefer crate.
//!
//! [`Settings`] holds resolved runtime values. [`Config`] is the optional
//! config file, discovered with prefer (`rivalskins.{json,toml,yaml,...}`)
//! or passed with `--config`. Precedence, lowest first: defaults, config
//! file, environment, command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::TtlCache;
use crate::catalog::CatalogReader;
use crate::extract::Extractor;
use crate::refresh::RefreshOrchestrator;
use crate::scrapers::{create_fetcher, BrowserEngineConfig, FetcherKind, USER_AGENT};

/// Name used for config discovery.
pub const APP_NAME: &str = "rivalskins";

/// Default wiki root.
pub const DEFAULT_WIKI_BASE: &str = "https://marvelrivals.fandom.com/wiki";

/// Default Referer header.
pub const DEFAULT_REFERER: &str = "https://marvelrivals.fandom.com/";

/// Environment variable overriding the cache directory.
pub const CACHE_DIR_ENV: &str = "RIVALSKINS_CACHE_DIR";

/// Environment variable overriding the fetcher.
pub const FETCHER_ENV: &str = "RIVALSKINS_FETCHER";

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory holding cache records.
    pub cache_dir: PathBuf,
    /// Cache TTL in seconds.
    pub cache_ttl_secs: u64,
    /// Wiki root URL; the roster page is `<wiki_base>/Heroes`.
    pub wiki_base: String,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// User agent for HTTP requests ("impersonate" picks a random browser).
    pub user_agent: String,
    /// Referer sent with HTTP requests.
    pub referer: Option<String>,
    /// Which fetcher to use.
    pub fetcher: FetcherKind,
    /// Headless browser options.
    pub browser: BrowserEngineConfig,
    /// Hours between scheduled refreshes.
    pub refresh_interval_hours: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("cache"),
            cache_ttl_secs: crate::cache::DEFAULT_TTL.as_secs(),
            wiki_base: DEFAULT_WIKI_BASE.to_string(),
            request_timeout: 10,
            user_agent: USER_AGENT.to_string(),
            referer: Some(DEFAULT_REFERER.to_string()),
            fetcher: FetcherKind::default(),
            browser: BrowserEngineConfig::default(),
            refresh_interval_hours: 12,
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_hours * 60 * 60)
    }

    pub fn create_cache(&self) -> TtlCache {
        TtlCache::with_ttl(&self.cache_dir, self.cache_ttl())
    }

    pub fn create_catalog(&self) -> CatalogReader {
        CatalogReader::new(&self.cache_dir)
    }

    /// Build an extractor over the configured fetcher and cache.
    pub fn create_extractor(&self) -> anyhow::Result<Extractor> {
        let fetcher = create_fetcher(self)?;
        Ok(Extractor::new(fetcher, self.create_cache(), &self.wiki_base)?)
    }

    pub fn create_orchestrator(&self) -> anyhow::Result<RefreshOrchestrator> {
        Ok(RefreshOrchestrator::new(
            self.create_extractor()?,
            self.refresh_interval(),
        ))
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_ttl_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wiki_base: Option<String>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Referer header; an empty string disables it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetcher: Option<FetcherKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<BrowserEngineConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_interval_hours: Option<u64>,
    /// Path the config was loaded from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer for discovery.
    /// Falls back to defaults when no config file is found.
    pub async fn load() -> Self {
        match prefer::load(APP_NAME).await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!("{}", e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// The format follows the extension: TOML, YAML, otherwise JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Directory of the config file, if loaded from one.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// Absolute paths are kept; `~` is expanded.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref cache_dir) = self.cache_dir {
            settings.cache_dir = self.resolve_path(cache_dir, base_dir);
        }
        if let Some(ttl) = self.cache_ttl_secs {
            settings.cache_ttl_secs = ttl;
        }
        if let Some(ref wiki_base) = self.wiki_base {
            settings.wiki_base = wiki_base.trim_end_matches('/').to_string();
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = user_agent.clone();
        }
        if let Some(ref referer) = self.referer {
            settings.referer = Some(referer.clone()).filter(|r| !r.is_empty());
        }
        if let Some(fetcher) = self.fetcher {
            settings.fetcher = fetcher;
        }
        if let Some(ref browser) = self.browser {
            settings.browser = browser.clone();
        }
        if let Some(hours) = self.refresh_interval_hours {
            settings.refresh_interval_hours = hours;
        }
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides discovery).
    pub config_path: Option<PathBuf>,
    /// Cache directory from the command line.
    pub cache_dir: Option<PathBuf>,
}

fn env_override(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

/// Apply environment overrides on top of file configuration.
fn apply_env(settings: &mut Settings) {
    if let Some(dir) = env_override(CACHE_DIR_ENV) {
        tracing::debug!("Using {} from environment: {}", CACHE_DIR_ENV, dir);
        settings.cache_dir = PathBuf::from(shellexpand::tilde(&dir).as_ref());
    }

    if let Some(value) = env_override(FETCHER_ENV) {
        match value.parse::<FetcherKind>() {
            Ok(kind) => {
                tracing::debug!("Using {} from environment: {}", FETCHER_ENV, value);
                settings.fetcher = kind;
            }
            Err(e) => tracing::warn!("Ignoring {}: {}", FETCHER_ENV, e),
        }
    }
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
pub async fn load_settings_with_options(options: LoadOptions) -> (Settings, Config) {
    let config = match options.config_path {
        Some(ref path) => Config::load_from_path(path).await.unwrap_or_else(|e| {
            tracing::warn!("{}", e);
            Config::default()
        }),
        None => Config::load().await,
    };

    let base_dir = config
        .base_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings, &base_dir);
    apply_env(&mut settings);

    if let Some(dir) = options.cache_dir {
        settings.cache_dir = dir;
    }

    (settings, config)
}
