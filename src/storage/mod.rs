//! Storage abstractions for article and run persistence.
//!
//! ## Directory Structure
//!
//! ```text
//! {storage.dir}/
//! ├── sources.json      # Registered sources
//! ├── articles.json     # Articles keyed by canonical URL
//! └── runs.json         # Ingestion run history
//! ```

pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{
    ArticlePage, ArticleQuery, IngestionRun, NormalizedArticle, RunCounts, RunNotes, RunStatus,
    SourceConfig, UpsertOutcome,
};

// Re-export for convenience
pub use local::LocalStorage;

/// A registered source as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: String,
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub feed_url: Option<String>,
    pub listing_url: String,
    pub scraper_enabled: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SourceRecord {
    pub fn new(source: &SourceConfig, now: DateTime<Utc>) -> Self {
        Self {
            id: source.id.clone(),
            name: source.name.clone(),
            base_url: source.base_url.clone(),
            feed_url: source.feed_url.clone(),
            listing_url: source.listing_url.clone(),
            scraper_enabled: source.scraper_enabled,
            active: source.active,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Trait for article storage backends.
///
/// Every method commits on its own; there is no cross-call transaction.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Insert or refresh source rows, keeping their creation time.
    async fn register_sources(&self, sources: &[SourceConfig], now: DateTime<Utc>) -> Result<()>;

    /// Insert or update an article keyed by canonical URL.
    ///
    /// Updates keep the saved flag and first-seen time.
    async fn upsert_article(
        &self,
        article: &NormalizedArticle,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome>;

    /// Persist a new `running` run record.
    async fn create_run(&self, id: &str, started_at: DateTime<Utc>, notes: &RunNotes) -> Result<()>;

    /// Write a run's terminal state.
    async fn complete_run(
        &self,
        id: &str,
        completed_at: DateTime<Utc>,
        status: RunStatus,
        counts: RunCounts,
        notes: &RunNotes,
    ) -> Result<()>;

    async fn get_run(&self, id: &str) -> Result<Option<IngestionRun>>;

    /// The most recently started run.
    async fn latest_run(&self) -> Result<Option<IngestionRun>>;

    /// Delete unsaved articles published strictly before `cutoff`.
    async fn delete_unsaved_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize>;

    /// Filtered page ordered by publication time then last-seen time, newest first.
    async fn list_articles(&self, query: &ArticleQuery) -> Result<ArticlePage>;

    /// Set the saved flag. Returns whether the article exists.
    async fn set_saved(&self, id: &str, saved: bool) -> Result<bool>;

    /// Remove an article. Returns whether it existed.
    async fn delete_article(&self, id: &str) -> Result<bool>;
}
