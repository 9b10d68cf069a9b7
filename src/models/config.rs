//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{SourceConfig, SourceSelectors};

/// Longest retention window accepted from configuration (ten years).
pub const MAX_WINDOW_HOURS: u32 = 24 * 365 * 10;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Outbound HTTP behavior
    #[serde(default)]
    pub http: HttpConfig,

    /// Window, caps and budgets for a run
    #[serde(default)]
    pub ingestion: IngestionConfig,

    /// Daily wake-up settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Where records are kept
    #[serde(default)]
    pub storage: StorageConfig,

    /// Source registry
    #[serde(default = "defaults::default_sources")]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply `KEY=value` overrides using the given lookup (normally the process environment).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("USER_AGENT") {
            self.http.user_agent = v;
        }
        if let Some(v) = get("REQUEST_TIMEOUT_SECONDS") {
            self.http.timeout_secs = parse_int("REQUEST_TIMEOUT_SECONDS", &v)?;
        }
        if let Some(v) = get("REQUEST_RETRIES") {
            self.http.retries = parse_int("REQUEST_RETRIES", &v)?;
        }
        if let Some(v) = get("INGESTION_WINDOW_HOURS") {
            self.ingestion.window_hours = parse_int("INGESTION_WINDOW_HOURS", &v)?;
        }
        if let Some(v) = get("MAX_ITEMS_PER_SOURCE") {
            self.ingestion.max_items_per_source = parse_int("MAX_ITEMS_PER_SOURCE", &v)?;
        }
        if let Some(v) = get("ARTICLE_META_FETCH_BUDGET") {
            self.ingestion.meta_fetch_budget = parse_int("ARTICLE_META_FETCH_BUDGET", &v)?;
        }
        if let Some(v) = lookup("SCHEDULER_ENABLED") {
            self.scheduler.enabled = parse_bool(&v);
        }
        if let Some(v) = get("SCHEDULE_HOUR_UTC") {
            self.scheduler.hour_utc = parse_int("SCHEDULE_HOUR_UTC", &v)?;
        }
        if let Some(v) = get("SCHEDULE_MINUTE_UTC") {
            self.scheduler.minute_utc = parse_int("SCHEDULE_MINUTE_UTC", &v)?;
        }
        if let Some(v) = get("STORAGE_DIR") {
            self.storage.dir = PathBuf::from(v);
        }
        Ok(())
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.ingestion.window_hours == 0 {
            return Err(AppError::validation("ingestion.window_hours must be > 0"));
        }
        if self.ingestion.window_hours > MAX_WINDOW_HOURS {
            return Err(AppError::validation(format!(
                "ingestion.window_hours must be <= {MAX_WINDOW_HOURS}"
            )));
        }
        if self.ingestion.max_items_per_source == 0 {
            return Err(AppError::validation(
                "ingestion.max_items_per_source must be > 0",
            ));
        }
        if self.ingestion.snippet_max_len < 4 {
            return Err(AppError::validation(
                "ingestion.snippet_max_len must be >= 4",
            ));
        }
        if self.scheduler.hour_utc > 23 {
            return Err(AppError::validation("scheduler.hour_utc must be 0-23"));
        }
        if self.scheduler.minute_utc > 59 {
            return Err(AppError::validation("scheduler.minute_utc must be 0-59"));
        }

        let mut ids = HashSet::new();
        for source in &self.sources {
            if source.id.trim().is_empty() {
                return Err(AppError::validation("source id is empty"));
            }
            if !ids.insert(source.id.as_str()) {
                return Err(AppError::validation(format!(
                    "duplicate source id '{}'",
                    source.id
                )));
            }
            if source.listing_url.trim().is_empty() {
                return Err(AppError::validation(format!(
                    "source '{}' has no listing_url",
                    source.id
                )));
            }
            for (field, selector) in source.selectors.all() {
                Selector::parse(selector).map_err(|e| {
                    AppError::selector(selector, format!("{}.{field}: {e:?}", source.id))
                })?;
            }
        }
        Ok(())
    }

    /// Sources that should get an adapter.
    pub fn active_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.active)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            ingestion: IngestionConfig::default(),
            scheduler: SchedulerConfig::default(),
            storage: StorageConfig::default(),
            sources: defaults::default_sources(),
        }
    }
}

fn parse_int<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::config(format!("{key} must be an integer, got '{value}'")))
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Extra attempts after the first for retryable failures
    #[serde(default = "defaults::retries")]
    pub retries: u32,

    /// Base delay between attempts, doubled per retry
    #[serde(default = "defaults::backoff_ms")]
    pub backoff_ms: u64,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            retries: defaults::retries(),
            backoff_ms: defaults::backoff_ms(),
        }
    }
}

/// Ingestion run settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Rolling window of "current" articles, in hours
    #[serde(default = "defaults::window_hours")]
    pub window_hours: u32,

    /// Cap on articles taken from one source per run
    #[serde(default = "defaults::max_items_per_source")]
    pub max_items_per_source: usize,

    /// Article page fetches allowed per listing scrape to fill missing fields
    #[serde(default = "defaults::meta_fetch_budget")]
    pub meta_fetch_budget: usize,

    /// Maximum snippet length in characters
    #[serde(default = "defaults::snippet_max_len")]
    pub snippet_max_len: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            window_hours: defaults::window_hours(),
            max_items_per_source: defaults::max_items_per_source(),
            meta_fetch_budget: defaults::meta_fetch_budget(),
            snippet_max_len: defaults::snippet_max_len(),
        }
    }
}

/// Daily scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "defaults::scheduler_enabled")]
    pub enabled: bool,

    #[serde(default = "defaults::hour_utc")]
    pub hour_utc: u32,

    #[serde(default = "defaults::minute_utc")]
    pub minute_utc: u32,

    /// How long `stop` waits for the loop to exit
    #[serde(default = "defaults::stop_grace_secs")]
    pub stop_grace_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::scheduler_enabled(),
            hour_utc: defaults::hour_utc(),
            minute_utc: defaults::minute_utc(),
            stop_grace_secs: defaults::stop_grace_secs(),
        }
    }
}

/// Storage location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "defaults::storage_dir")]
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: defaults::storage_dir(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use super::{SourceConfig, SourceSelectors};

    // HTTP defaults
    pub fn user_agent() -> String {
        "HarvesterBot/1.0 (+https://harvester.local)".into()
    }
    pub fn timeout() -> u64 {
        15
    }
    pub fn retries() -> u32 {
        2
    }
    pub fn backoff_ms() -> u64 {
        400
    }

    // Ingestion defaults
    pub fn window_hours() -> u32 {
        24
    }
    pub fn max_items_per_source() -> usize {
        50
    }
    pub fn meta_fetch_budget() -> usize {
        8
    }
    pub fn snippet_max_len() -> usize {
        280
    }

    // Scheduler defaults
    pub fn scheduler_enabled() -> bool {
        true
    }
    pub fn hour_utc() -> u32 {
        0
    }
    pub fn minute_utc() -> u32 {
        15
    }
    pub fn stop_grace_secs() -> u64 {
        2
    }

    pub fn storage_dir() -> PathBuf {
        PathBuf::from("data")
    }

    // Source registry defaults
    pub fn default_sources() -> Vec<SourceConfig> {
        vec![
            SourceConfig::new(
                "perfect_daily_grind",
                "Perfect Daily Grind",
                "https://perfectdailygrind.com",
                Some("https://perfectdailygrind.com/feed/"),
                "https://perfectdailygrind.com",
            ),
            SourceConfig::new(
                "daily_coffee_news",
                "Daily Coffee News",
                "https://dailycoffeenews.com",
                Some("https://dailycoffeenews.com/feed/"),
                "https://dailycoffeenews.com",
            ),
            SourceConfig::new(
                "sca",
                "Specialty Coffee Association",
                "https://sca.coffee",
                Some("https://sca.coffee/rss"),
                "https://sca.coffee/news",
            )
            .with_selectors(SourceSelectors::news_blocks()),
            SourceConfig::new(
                "barista_magazine",
                "Barista Magazine",
                "https://www.baristamagazine.com",
                Some("https://www.baristamagazine.com/feed/"),
                "https://www.baristamagazine.com",
            ),
            SourceConfig::new(
                "tea_coffee_trade_journal",
                "Tea & Coffee Trade Journal",
                "https://www.teaandcoffee.net",
                Some("https://www.teaandcoffee.net/feed/"),
                "https://www.teaandcoffee.net/news/",
            )
            .with_selectors(SourceSelectors::news_blocks()),
        ]
    }
}
