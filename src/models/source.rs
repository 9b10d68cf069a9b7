//! Content source descriptors.

use serde::{Deserialize, Serialize};

use crate::models::SourceSelectors;

/// Immutable descriptor of one external content source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Stable, human-assigned identifier (e.g. "daily_coffee_news")
    pub id: String,

    /// Display name
    pub name: String,

    /// Origin used to resolve relative links
    pub base_url: String,

    /// RSS/Atom endpoint, tried before scraping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_url: Option<String>,

    /// Listing page scraped when the feed yields nothing
    pub listing_url: String,

    /// Whether listing scraping may be used as a fallback
    #[serde(default = "default_true")]
    pub scraper_enabled: bool,

    /// Inactive sources are skipped when building adapters
    #[serde(default = "default_true")]
    pub active: bool,

    /// Listing page selectors
    #[serde(default)]
    pub selectors: SourceSelectors,
}

fn default_true() -> bool {
    true
}

impl SourceConfig {
    /// Create a source with a feed, a listing page and default selectors.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        base_url: impl Into<String>,
        feed_url: Option<&str>,
        listing_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            base_url: base_url.into(),
            feed_url: feed_url.map(str::to_string),
            listing_url: listing_url.into(),
            scraper_enabled: true,
            active: true,
            selectors: SourceSelectors::default(),
        }
    }

    /// Replace the listing selectors.
    pub fn with_selectors(mut self, selectors: SourceSelectors) -> Self {
        self.selectors = selectors;
        self
    }
}
