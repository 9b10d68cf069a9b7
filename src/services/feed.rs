// src/services/feed.rs

//! RSS/Atom feed parsing.
//!
//! Feeds are read into a small namespace-agnostic element tree so RSS 2.0,
//! Atom and the usual extension elements (`dc:date`, `media:thumbnail`,
//! `content:encoded`) can be matched by local name alone.

use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use scraper::{Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{IngestionConfig, RawArticle, SourceConfig};
use crate::services::adapter::dedupe_by_url;
use crate::utils::text::{parse_timestamp, strip_html};
use crate::utils::url::canonicalize;

const TITLE_FIELDS: &[&str] = &["title"];
const LINK_FIELDS: &[&str] = &["link"];
const GUID_FIELDS: &[&str] = &["guid"];
const PUBLISHED_FIELDS: &[&str] = &["pubdate", "published", "updated", "date"];
const SNIPPET_FIELDS: &[&str] = &["description", "summary", "content", "encoded"];
const IMAGE_ELEMENTS: &[&str] = &["content", "thumbnail", "enclosure"];

/// One XML element: lower-cased local name, attributes keyed by local name,
/// and the text that precedes its first child.
#[derive(Debug, Default)]
struct Node {
    name: String,
    attrs: Vec<(String, String)>,
    text: String,
    children: Vec<Node>,
}

impl Node {
    fn from_start(start: &BytesStart<'_>) -> Self {
        let name = lossy(start.local_name().as_ref()).to_lowercase();
        let attrs = start
            .attributes()
            .flatten()
            .map(|attr| {
                let key = lossy(attr.key.local_name().as_ref()).to_lowercase();
                let value = decode_text(&attr.value);
                (key, value)
            })
            .collect();
        Self {
            name,
            attrs,
            ..Self::default()
        }
    }

    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Pre-order walk including `self`.
    fn descendants(&self) -> Box<dyn Iterator<Item = &Node> + '_> {
        Box::new(std::iter::once(self).chain(self.children.iter().flat_map(Node::descendants)))
    }

    fn trimmed_text(&self) -> Option<&str> {
        let text = self.text.trim();
        (!text.is_empty()).then_some(text)
    }

    /// First non-empty text among direct children named in `names`, else
    /// among all descendants.
    fn direct_text(&self, names: &[&str]) -> Option<String> {
        let matches = |node: &&Node| names.contains(&node.name.as_str());
        self.children
            .iter()
            .filter(matches)
            .find_map(Node::trimmed_text)
            .or_else(|| self.descendants().filter(matches).find_map(Node::trimmed_text))
            .map(str::to_string)
    }
}

fn lossy(bytes: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

fn decode_text(bytes: &[u8]) -> String {
    html_escape::decode_html_entities(&lossy(bytes)).into_owned()
}

/// Build the element tree for the document's root element.
fn parse_tree(xml: &str) -> Result<Node> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Node> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(Node::from_start(&start)),
            Event::Empty(start) => {
                let node = Node::from_start(&start);
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => return Ok(node),
                }
            }
            Event::End(_) => {
                let Some(node) = stack.pop() else {
                    return Err(AppError::feed("xml", "unbalanced end tag"));
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => return Ok(node),
                }
            }
            Event::Text(text) => push_text(&mut stack, &decode_text(&text)),
            Event::CData(data) => push_text(&mut stack, &lossy(&data)),
            Event::Eof => break,
            _ => {}
        }
    }

    Err(AppError::feed("xml", "document has no root element"))
}

fn push_text(stack: &mut [Node], text: &str) {
    if let Some(node) = stack.last_mut() {
        if node.children.is_empty() {
            node.text.push_str(text);
        }
    }
}

/// RSS items under `channel`, otherwise every `entry` element.
fn feed_items(root: &Node) -> Vec<&Node> {
    match root.children.iter().find(|c| c.name == "channel") {
        Some(channel) => channel.children.iter().filter(|c| c.name == "item").collect(),
        None => root.descendants().filter(|n| n.name == "entry").collect(),
    }
}

fn item_link(item: &Node) -> Option<String> {
    if let Some(link) = item.direct_text(LINK_FIELDS) {
        return Some(link);
    }

    let alternate = item.children.iter().find_map(|child| {
        if child.name != "link" {
            return None;
        }
        let rel = child.attr("rel").unwrap_or("alternate");
        let href = child.attr("href").filter(|h| !h.is_empty())?;
        matches!(rel, "alternate" | "").then(|| href.to_string())
    });
    if alternate.is_some() {
        return alternate;
    }

    item.direct_text(GUID_FIELDS)
        .filter(|guid| guid.starts_with("http"))
}

fn item_image(item: &Node, snippet_html: Option<&str>) -> Option<String> {
    let from_media = item.descendants().find_map(|node| {
        if !IMAGE_ELEMENTS.contains(&node.name.as_str()) {
            return None;
        }
        [node.attr("url"), node.attr("href")]
            .into_iter()
            .flatten()
            .find(|v| !v.trim().is_empty())
            .map(str::to_string)
    });
    if from_media.is_some() {
        return from_media;
    }

    let html = snippet_html?;
    let fragment = Html::parse_fragment(html);
    let img = Selector::parse("img").ok()?;
    fragment
        .select(&img)
        .next()
        .and_then(|el| el.value().attr("src"))
        .filter(|src| !src.trim().is_empty())
        .map(str::to_string)
}

/// Parse an RSS or Atom document into raw articles for `source`.
///
/// At most `max_items_per_source` items are considered; items missing a
/// title or link are dropped and duplicates by URL keep the last occurrence.
pub fn parse_feed(
    xml: &str,
    source: &SourceConfig,
    limits: &IngestionConfig,
) -> Result<Vec<RawArticle>> {
    let root = parse_tree(xml).map_err(|e| match e {
        AppError::Feed { message, .. } => AppError::feed(&source.id, message),
        other => AppError::feed(&source.id, other),
    })?;

    let mut articles = Vec::new();
    for item in feed_items(&root)
        .into_iter()
        .take(limits.max_items_per_source)
    {
        let (Some(title), Some(link)) = (item.direct_text(TITLE_FIELDS), item_link(item)) else {
            continue;
        };

        let snippet_html = item.direct_text(SNIPPET_FIELDS);
        let image_url = item_image(item, snippet_html.as_deref());

        articles.push(RawArticle {
            source_id: source.id.clone(),
            title,
            url: canonicalize(&link, Some(&source.base_url)),
            published_at: item
                .direct_text(PUBLISHED_FIELDS)
                .as_deref()
                .and_then(parse_timestamp),
            snippet: strip_html(snippet_html.as_deref().unwrap_or(""), limits.snippet_max_len),
            image_url: image_url.map(|u| canonicalize(&u, Some(&source.base_url))),
        });
    }

    Ok(dedupe_by_url(articles))
}
