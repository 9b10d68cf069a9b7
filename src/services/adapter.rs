// src/services/adapter.rs

//! Source adapters.
//!
//! Every source shares one strategy: try the feed, fall back to scraping the
//! listing page. The differences between sources live entirely in their
//! [`SourceConfig`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::Result;
use crate::models::{Config, IngestionConfig, RawArticle, SourceConfig, SourceHealth};
use crate::services::feed::parse_feed;
use crate::services::listing::scrape_listing;
use crate::utils::http::PageFetcher;

/// Articles from one source plus the non-fatal problems met on the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOutcome {
    pub articles: Vec<RawArticle>,
    pub warnings: Vec<String>,
}

/// Capability of pulling articles from one source and probing its reachability.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// The source this adapter reads.
    fn source(&self) -> &SourceConfig;

    /// Retrieve the source's current articles.
    async fn fetch(&self) -> Result<FetchOutcome>;

    /// Probe the source's endpoints. Never fails; problems are reported in
    /// the returned status.
    async fn check_health(&self) -> SourceHealth;
}

/// Feed-first, listing-fallback adapter shared by all sources.
pub struct FallbackAdapter {
    source: SourceConfig,
    limits: IngestionConfig,
    fetcher: Arc<dyn PageFetcher>,
}

impl FallbackAdapter {
    pub fn new(source: SourceConfig, limits: IngestionConfig, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            source,
            limits,
            fetcher,
        }
    }

    async fn fetch_feed(&self, feed_url: &str) -> Result<Vec<RawArticle>> {
        let xml = self.fetcher.fetch_text(feed_url).await?;
        parse_feed(&xml, &self.source, &self.limits)
    }

    /// Probe one endpoint: `Ok(true)` when the body is non-blank.
    async fn probe(&self, url: &str) -> Result<bool> {
        let body = self.fetcher.fetch_text(url).await?;
        Ok(!body.trim().is_empty())
    }
}

#[async_trait]
impl SourceAdapter for FallbackAdapter {
    fn source(&self) -> &SourceConfig {
        &self.source
    }

    async fn fetch(&self) -> Result<FetchOutcome> {
        let mut outcome = FetchOutcome::default();

        if let Some(feed_url) = &self.source.feed_url {
            match self.fetch_feed(feed_url).await {
                Ok(articles) if !articles.is_empty() => {
                    log::debug!("{}: {} feed items", self.source.id, articles.len());
                    outcome.articles = articles;
                    return Ok(outcome);
                }
                Ok(_) => log::debug!("{}: feed returned no items", self.source.id),
                Err(e) => outcome.warnings.push(format!("feed_error: {e}")),
            }
        }

        if self.source.scraper_enabled {
            match scrape_listing(self.fetcher.as_ref(), &self.source, &self.limits).await {
                Ok(articles) => {
                    log::debug!("{}: {} listing cards", self.source.id, articles.len());
                    outcome.articles = articles;
                }
                Err(e) => outcome.warnings.push(format!("scrape_error: {e}")),
            }
        }

        Ok(outcome)
    }

    async fn check_health(&self) -> SourceHealth {
        let checked_at = Utc::now();

        let feed_error = match &self.source.feed_url {
            Some(feed_url) => match self.probe(feed_url).await {
                Ok(true) => return SourceHealth::ok(&self.source, checked_at, "feed reachable"),
                Ok(false) => "empty feed response".to_string(),
                Err(e) => e.to_string(),
            },
            None => "feed not configured".to_string(),
        };

        let listing_error = match self.probe(&self.source.listing_url).await {
            Ok(true) => {
                return SourceHealth::ok(&self.source, checked_at, "listing reachable (fallback)");
            }
            Ok(false) => "empty".to_string(),
            Err(e) => e.to_string(),
        };

        SourceHealth::error(
            &self.source,
            checked_at,
            format!("feed/listing unavailable: feed={feed_error}; listing={listing_error}"),
        )
    }
}

/// Keep one article per URL; the last occurrence wins but keeps the first
/// occurrence's position.
pub fn dedupe_by_url(articles: Vec<RawArticle>) -> Vec<RawArticle> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut deduped: Vec<RawArticle> = Vec::with_capacity(articles.len());

    for article in articles {
        match positions.get(&article.url) {
            Some(&index) => deduped[index] = article,
            None => {
                positions.insert(article.url.clone(), deduped.len());
                deduped.push(article);
            }
        }
    }
    deduped
}

/// Build one adapter per active source, all sharing `fetcher`.
pub fn build_adapters(config: &Config, fetcher: Arc<dyn PageFetcher>) -> Vec<Arc<dyn SourceAdapter>> {
    config
        .active_sources()
        .map(|source| {
            Arc::new(FallbackAdapter::new(
                source.clone(),
                config.ingestion.clone(),
                Arc::clone(&fetcher),
            )) as Arc<dyn SourceAdapter>
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HealthStatus;
    use crate::utils::http::stub::StubFetcher;

    const FEED: &str = "https://example.com/feed";
    const LISTING: &str = "https://example.com/news";

    const RSS: &str = r#"<rss><channel>
        <item><title>From feed</title><link>https://example.com/a</link></item>
    </channel></rss>"#;
    const EMPTY_RSS: &str = "<rss><channel></channel></rss>";
    const HTML: &str = r#"<article><h2><a href="/b">From listing</a></h2></article>"#;

    fn source(feed: bool) -> SourceConfig {
        SourceConfig::new(
            "ex",
            "Example",
            "https://example.com",
            feed.then_some(FEED),
            LISTING,
        )
    }

    fn make_adapter(source: SourceConfig, fetcher: StubFetcher) -> (FallbackAdapter, Arc<StubFetcher>) {
        let fetcher = Arc::new(fetcher);
        let limits = IngestionConfig {
            meta_fetch_budget: 0,
            ..IngestionConfig::default()
        };
        (
            FallbackAdapter::new(source, limits, fetcher.clone()),
            fetcher,
        )
    }

    fn raw(url: &str, title: &str) -> RawArticle {
        RawArticle {
            source_id: "ex".into(),
            title: title.into(),
            url: url.into(),
            published_at: None,
            snippet: String::new(),
            image_url: None,
        }
    }

    #[tokio::test]
    async fn test_feed_items_skip_scrape() {
        let (adapter, fetcher) = make_adapter(
            source(true),
            StubFetcher::new().with_page(FEED, RSS).with_page(LISTING, HTML),
        );
        let outcome = adapter.fetch().await.unwrap();
        assert_eq!(outcome.articles.len(), 1);
        assert_eq!(outcome.articles[0].title, "From feed");
        assert!(outcome.warnings.is_empty());
        assert_eq!(fetcher.calls(), vec![FEED.to_string()]);
    }

    #[tokio::test]
    async fn test_feed_error_falls_back_with_warning() {
        let (adapter, _) = make_adapter(
            source(true),
            StubFetcher::new().with_status(FEED, 502).with_page(LISTING, HTML),
        );
        let outcome = adapter.fetch().await.unwrap();
        assert_eq!(outcome.articles.len(), 1);
        assert_eq!(outcome.articles[0].url, "https://example.com/b");
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].starts_with("feed_error: "));
    }

    #[tokio::test]
    async fn test_empty_feed_falls_back_silently() {
        let (adapter, _) = make_adapter(
            source(true),
            StubFetcher::new().with_page(FEED, EMPTY_RSS).with_page(LISTING, HTML),
        );
        let outcome = adapter.fetch().await.unwrap();
        assert_eq!(outcome.articles.len(), 1);
        assert!(outcome.warnings.is_empty());
    }

    #[tokio::test]
    async fn test_total_failure_is_empty_with_warnings() {
        let (adapter, _) = make_adapter(
            source(true),
            StubFetcher::new().with_status(FEED, 500).with_status(LISTING, 500),
        );
        let outcome = adapter.fetch().await.unwrap();
        assert!(outcome.articles.is_empty());
        assert_eq!(outcome.warnings.len(), 2);
        assert!(outcome.warnings[1].starts_with("scrape_error: "));
    }

    #[tokio::test]
    async fn test_scraper_disabled_skips_listing() {
        let mut src = source(true);
        src.scraper_enabled = false;
        let (adapter, fetcher) = make_adapter(src, StubFetcher::new().with_status(FEED, 500));
        let outcome = adapter.fetch().await.unwrap();
        assert!(outcome.articles.is_empty());
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(fetcher.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_health_prefers_feed() {
        let (adapter, _) = make_adapter(source(true), StubFetcher::new().with_page(FEED, RSS));
        let health = adapter.check_health().await;
        assert_eq!(health.status, HealthStatus::Ok);
        assert_eq!(health.detail, "feed reachable");
        assert_eq!(health.source_name, "Example");
    }

    #[tokio::test]
    async fn test_health_listing_fallback() {
        let (adapter, _) = make_adapter(source(false), StubFetcher::new().with_page(LISTING, HTML));
        let health = adapter.check_health().await;
        assert!(health.is_ok());
        assert_eq!(health.detail, "listing reachable (fallback)");
    }

    #[tokio::test]
    async fn test_health_error_names_both_reasons() {
        let (adapter, _) = make_adapter(
            source(true),
            StubFetcher::new().with_page(FEED, "   ").with_page(LISTING, ""),
        );
        let health = adapter.check_health().await;
        assert_eq!(health.status, HealthStatus::Error);
        assert_eq!(
            health.detail,
            "feed/listing unavailable: feed=empty feed response; listing=empty"
        );

        let (adapter, _) = make_adapter(source(false), StubFetcher::new().with_status(LISTING, 503));
        let health = adapter.check_health().await;
        assert!(health.detail.starts_with("feed/listing unavailable: feed=feed not configured; listing=HTTP 503"));
    }

    #[test]
    fn test_dedupe_last_occurrence_wins() {
        let deduped = dedupe_by_url(vec![
            raw("https://example.com/a", "first"),
            raw("https://example.com/b", "other"),
            raw("https://example.com/a", "second"),
        ]);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].title, "second");
        assert_eq!(deduped[1].title, "other");
    }

    #[test]
    fn test_build_adapters_skips_inactive() {
        let mut config = Config::default();
        let total = config.sources.len();
        config.sources[0].active = false;
        let adapters = build_adapters(&config, Arc::new(StubFetcher::new()));
        assert_eq!(adapters.len(), total - 1);
        assert!(adapters.iter().all(|a| a.source().id != config.sources[0].id));
    }
}
