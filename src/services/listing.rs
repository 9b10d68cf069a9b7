// src/services/listing.rs

//! Listing-page scraper with article-page metadata enrichment.

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{IngestionConfig, RawArticle, SourceConfig};
use crate::services::adapter::dedupe_by_url;
use crate::utils::http::PageFetcher;
use crate::utils::text::{parse_timestamp, strip_html};
use crate::utils::url::canonicalize;

/// Selectors tried in order for an article's publication time.
const PUBLISHED_META: [&str; 4] = [
    "meta[property='article:published_time']",
    "meta[name='pubdate']",
    "meta[name='publish-date']",
    "time[datetime]",
];

/// Card fields read from the listing page.
///
/// Built synchronously so the parsed document never lives across an await.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardDraft {
    pub title: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub snippet: String,
    pub image_url: Option<String>,
}

impl CardDraft {
    fn needs_meta(&self) -> bool {
        self.published_at.is_none() || self.snippet.is_empty() || self.image_url.is_none()
    }

    fn fill_from(&mut self, meta: ArticleMeta) {
        if self.published_at.is_none() {
            self.published_at = meta.published_at;
        }
        if self.snippet.is_empty() {
            self.snippet = meta.snippet;
        }
        if self.image_url.is_none() {
            self.image_url = meta.image_url;
        }
    }
}

/// Gap-filling metadata read from an article page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleMeta {
    pub published_at: Option<DateTime<Utc>>,
    pub snippet: String,
    pub image_url: Option<String>,
}

/// Parse a CSS selector, mapping failures to [`AppError::Selector`].
pub fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Text fragments of an element, each trimmed, joined by single spaces.
fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_empty_attr(element: &ElementRef<'_>, name: &str) -> Option<String> {
    element
        .value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Extract article cards from a listing page.
///
/// At most `max_items` cards are looked at; cards without a linked title are
/// skipped.
pub fn parse_listing(html: &str, source: &SourceConfig, max_items: usize) -> Result<Vec<CardDraft>> {
    let selectors = &source.selectors;
    let card_sel = parse_selector(&selectors.article_selector)?;
    let link_sel = parse_selector(&selectors.link_selector)?;
    let time_sel = parse_selector(&selectors.time_selector)?;
    let snippet_sel = parse_selector(&selectors.snippet_selector)?;
    let image_sel = parse_selector(&selectors.image_selector)?;

    let document = Html::parse_document(html);
    let mut drafts = Vec::new();

    for card in document.select(&card_sel).take(max_items) {
        let Some(link) = card.select(&link_sel).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href").filter(|h| !h.is_empty()) else {
            continue;
        };
        let title = element_text(&link);
        if title.is_empty() {
            continue;
        }

        let published_at = card.select(&time_sel).next().and_then(|node| {
            match node.value().attr("datetime") {
                Some(machine) => parse_timestamp(machine),
                None => parse_timestamp(&element_text(&node)),
            }
        });
        let snippet = card
            .select(&snippet_sel)
            .next()
            .map(|node| element_text(&node))
            .unwrap_or_default();
        let image_url = card
            .select(&image_sel)
            .next()
            .and_then(|node| node.value().attr("src"))
            .filter(|src| !src.is_empty())
            .map(str::to_string);

        drafts.push(CardDraft {
            title,
            url: canonicalize(href, Some(&source.base_url)),
            published_at,
            snippet,
            image_url,
        });
    }

    Ok(drafts)
}

/// Read publication time, description and lead image from an article page.
pub fn parse_article_meta(html: &str, snippet_max_len: usize) -> ArticleMeta {
    let document = Html::parse_document(html);

    let published_raw = PUBLISHED_META.iter().find_map(|selector| {
        let selector = Selector::parse(selector).ok()?;
        let node = document.select(&selector).next()?;
        if node.value().name() == "time" {
            non_empty_attr(&node, "datetime").or_else(|| {
                let text = element_text(&node);
                (!text.is_empty()).then_some(text)
            })
        } else {
            non_empty_attr(&node, "content")
        }
    });

    let description = Selector::parse("meta[name='description']")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .and_then(|node| non_empty_attr(&node, "content"));
    let snippet = description.unwrap_or_else(|| {
        Selector::parse("p")
            .ok()
            .and_then(|sel| document.select(&sel).next())
            .map(|node| element_text(&node))
            .unwrap_or_default()
    });

    let image_url = Selector::parse("meta[property='og:image']")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .and_then(|node| non_empty_attr(&node, "content"));

    ArticleMeta {
        published_at: published_raw.as_deref().and_then(parse_timestamp),
        snippet: strip_html(&snippet, snippet_max_len),
        image_url,
    }
}

/// Fetch an article page for metadata. Fetch failures yield empty metadata.
async fn fetch_article_meta(
    fetcher: &dyn PageFetcher,
    url: &str,
    snippet_max_len: usize,
) -> ArticleMeta {
    match fetcher.fetch_text(url).await {
        Ok(html) => parse_article_meta(&html, snippet_max_len),
        Err(e) => {
            log::debug!("Article meta fetch failed for {}: {}", url, e);
            ArticleMeta::default()
        }
    }
}

/// Scrape a source's listing page into raw articles.
///
/// Cards missing a timestamp, snippet or image spend one unit of the
/// per-call meta-fetch budget to fill the gaps from the article page.
pub async fn scrape_listing(
    fetcher: &dyn PageFetcher,
    source: &SourceConfig,
    limits: &IngestionConfig,
) -> Result<Vec<RawArticle>> {
    let html = fetcher.fetch_text(&source.listing_url).await?;
    let drafts = parse_listing(&html, source, limits.max_items_per_source)?;

    let mut budget = limits.meta_fetch_budget;
    let mut articles = Vec::with_capacity(drafts.len());

    for mut draft in drafts {
        if draft.needs_meta() && budget > 0 {
            budget -= 1;
            let meta = fetch_article_meta(fetcher, &draft.url, limits.snippet_max_len).await;
            draft.fill_from(meta);
        }

        articles.push(RawArticle {
            source_id: source.id.clone(),
            title: draft.title,
            url: draft.url,
            published_at: draft.published_at,
            snippet: strip_html(&draft.snippet, limits.snippet_max_len),
            image_url: draft
                .image_url
                .map(|u| canonicalize(&u, Some(&source.base_url))),
        });
    }

    Ok(dedupe_by_url(articles))
}
