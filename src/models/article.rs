//! Article data structures at each stage of ingestion.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// An article as produced by a source adapter. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawArticle {
    pub source_id: String,
    pub title: String,
    /// Absolute or source-relative URL
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub snippet: String,
    pub image_url: Option<String>,
}

/// Canonical form of an article, ready for upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedArticle {
    /// Fingerprint of `canonical_url`
    pub id: String,
    pub source_id: String,
    pub title: String,
    pub url: String,
    /// Dedup key, globally unique
    pub canonical_url: String,
    pub published_at: DateTime<Utc>,
    pub snippet: String,
    pub image_url: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// An article row as held by storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredArticle {
    pub id: String,
    pub canonical_url: String,
    pub title: String,
    pub url: String,
    pub source_id: String,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_saved: bool,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredArticle {
    /// Build a fresh row from a first observation.
    pub fn inserted(article: &NormalizedArticle, now: DateTime<Utc>) -> Self {
        Self {
            id: article.id.clone(),
            canonical_url: article.canonical_url.clone(),
            title: article.title.clone(),
            url: article.url.clone(),
            source_id: article.source_id.clone(),
            published_at: article.published_at,
            snippet: article.snippet.clone(),
            image_url: article.image_url.clone(),
            is_saved: false,
            first_seen_at: article.first_seen_at,
            last_seen_at: article.last_seen_at,
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrite the mutable fields from a repeat observation.
    ///
    /// `is_saved`, `first_seen_at` and `created_at` are left untouched.
    pub fn refresh(&mut self, article: &NormalizedArticle, now: DateTime<Utc>) {
        self.title = article.title.clone();
        self.url = article.url.clone();
        self.source_id = article.source_id.clone();
        self.published_at = article.published_at;
        self.snippet = article.snippet.clone();
        self.image_url = article.image_url.clone();
        self.last_seen_at = article.last_seen_at;
        self.updated_at = now;
    }
}

/// Result of an upsert keyed by canonical URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Saved-flag filter for article listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SavedFilter {
    /// Saved items regardless of age plus unsaved items within the cutoff
    #[default]
    All,
    /// Only saved items; the cutoff is ignored
    #[serde(rename = "true")]
    Saved,
    /// Only unsaved items within the cutoff
    #[serde(rename = "false")]
    Unsaved,
}

impl SavedFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            SavedFilter::All => "all",
            SavedFilter::Saved => "true",
            SavedFilter::Unsaved => "false",
        }
    }
}

impl FromStr for SavedFilter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(SavedFilter::All),
            "true" => Ok(SavedFilter::Saved),
            "false" => Ok(SavedFilter::Unsaved),
            other => Err(AppError::validation(format!(
                "saved filter must be one of all|true|false, got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for SavedFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage-level listing query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleQuery {
    pub cutoff: Option<DateTime<Utc>>,
    pub saved: SavedFilter,
    pub source_id: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

impl Default for ArticleQuery {
    fn default() -> Self {
        Self {
            cutoff: None,
            saved: SavedFilter::All,
            source_id: None,
            limit: 50,
            offset: 0,
        }
    }
}

impl ArticleQuery {
    /// Whether a stored row passes the saved/source/cutoff filters.
    pub fn matches(&self, article: &StoredArticle) -> bool {
        if let Some(source_id) = &self.source_id {
            if &article.source_id != source_id {
                return false;
            }
        }

        let in_window = self
            .cutoff
            .is_none_or(|cutoff| article.published_at >= cutoff);

        match self.saved {
            SavedFilter::Saved => article.is_saved,
            SavedFilter::Unsaved => !article.is_saved && in_window,
            SavedFilter::All => article.is_saved || in_window,
        }
    }
}

/// A stored article joined with its source's display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleView {
    #[serde(flatten)]
    pub article: StoredArticle,
    pub source_name: String,
}

/// One page of a listing plus the total number of matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArticlePage {
    pub total: usize,
    pub items: Vec<ArticleView>,
}
