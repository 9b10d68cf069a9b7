// src/models/selectors.rs

//! CSS selectors for scraping a source's listing page.

use serde::{Deserialize, Serialize};

/// CSS selectors for scraping article cards from a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSelectors {
    /// Selector for each article card on the listing page
    #[serde(default = "defaults::article")]
    pub article_selector: String,

    /// Selector for the link element within a card (its text is the title)
    #[serde(default = "defaults::link")]
    pub link_selector: String,

    /// Selector for the timestamp element within a card
    #[serde(default = "defaults::time")]
    pub time_selector: String,

    /// Selector for the snippet element within a card
    #[serde(default = "defaults::snippet")]
    pub snippet_selector: String,

    /// Selector for the image element within a card
    #[serde(default = "defaults::image")]
    pub image_selector: String,
}

impl Default for SourceSelectors {
    fn default() -> Self {
        Self {
            article_selector: defaults::article(),
            link_selector: defaults::link(),
            time_selector: defaults::time(),
            snippet_selector: defaults::snippet(),
            image_selector: defaults::image(),
        }
    }
}

impl SourceSelectors {
    /// Selectors for sites that render news as `.news-item`/`.post` blocks
    /// and dates in a `.date` element.
    pub fn news_blocks() -> Self {
        Self {
            article_selector: "article, .news-item, .post".to_string(),
            time_selector: "time, .date".to_string(),
            ..Self::default()
        }
    }

    /// All selectors with their field names, for validation and logging.
    pub fn all(&self) -> [(&'static str, &str); 5] {
        [
            ("article_selector", &self.article_selector),
            ("link_selector", &self.link_selector),
            ("time_selector", &self.time_selector),
            ("snippet_selector", &self.snippet_selector),
            ("image_selector", &self.image_selector),
        ]
    }
}

mod defaults {
    pub fn article() -> String {
        "article".into()
    }
    pub fn link() -> String {
        "h2 a, h3 a, a[href]".into()
    }
    pub fn time() -> String {
        "time".into()
    }
    pub fn snippet() -> String {
        "p".into()
    }
    pub fn image() -> String {
        "img".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn news_blocks_keeps_default_link_selector() {
        let selectors = SourceSelectors::news_blocks();
        assert_eq!(selectors.link_selector, SourceSelectors::default().link_selector);
        assert_eq!(selectors.time_selector, "time, .date");
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let selectors: SourceSelectors = toml::from_str("time_selector = \".stamp\"").unwrap();
        assert_eq!(selectors.time_selector, ".stamp");
        assert_eq!(selectors.article_selector, "article");
    }
}
