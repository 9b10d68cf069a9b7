//! Service layer for the harvester.
//!
//! This module contains the business logic for:
//! - Source adapters with feed-first, listing-fallback retrieval (`SourceAdapter`)
//! - RSS/Atom parsing (`parse_feed`)
//! - Listing scraping with metadata enrichment (`scrape_listing`)
//! - Article browsing and overrides (`ArticleCatalog`)

pub mod adapter;
pub mod articles;
pub mod feed;
pub mod listing;

pub use adapter::{FallbackAdapter, FetchOutcome, SourceAdapter, build_adapters};
pub use articles::{ArticleCatalog, ListParams};
pub use feed::parse_feed;
pub use listing::{parse_article_meta, parse_listing, scrape_listing};
