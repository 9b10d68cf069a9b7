//! Local filesystem storage implementation.
//!
//! Each collection is one pretty-printed JSON file rewritten atomically
//! (write to temp, then rename). A shared async mutex serializes every
//! read-modify-write so concurrent callers never lose updates.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{
    ArticlePage, ArticleQuery, ArticleView, IngestionRun, NormalizedArticle, RunCounts, RunNotes,
    RunStatus, SourceConfig, StoredArticle, UpsertOutcome,
};
use crate::storage::{ArticleStore, SourceRecord};

const SOURCES: &str = "sources.json";
const ARTICLES: &str = "articles.json";
const RUNS: &str = "runs.json";

/// Local filesystem storage backend.
#[derive(Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read a JSON collection; a missing file is an empty collection.
    async fn read_json<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        match tokio::fs::read(self.path(key)).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                AppError::storage(format!("{} is corrupt: {}", key, e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn load_articles(&self) -> Result<Vec<StoredArticle>> {
        self.read_json(ARTICLES).await
    }

    async fn load_runs(&self) -> Result<Vec<IngestionRun>> {
        self.read_json(RUNS).await
    }

    /// Registered sources.
    pub async fn sources(&self) -> Result<Vec<SourceRecord>> {
        self.read_json(SOURCES).await
    }
}

#[async_trait]
impl ArticleStore for LocalStorage {
    async fn register_sources(&self, sources: &[SourceConfig], now: DateTime<Utc>) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut records: Vec<SourceRecord> = self.read_json(SOURCES).await?;

        for source in sources {
            let fresh = SourceRecord::new(source, now);
            match records.iter_mut().find(|r| r.id == source.id) {
                Some(existing) => {
                    *existing = SourceRecord {
                        created_at: existing.created_at,
                        ..fresh
                    };
                }
                None => records.push(fresh),
            }
        }

        self.write_json(SOURCES, &records).await?;
        log::debug!("Registered {} sources", sources.len());
        Ok(())
    }

    async fn upsert_article(
        &self,
        article: &NormalizedArticle,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome> {
        let _guard = self.lock.lock().await;
        let mut articles = self.load_articles().await?;

        let outcome = match articles
            .iter_mut()
            .find(|row| row.canonical_url == article.canonical_url)
        {
            Some(row) => {
                row.refresh(article, now);
                UpsertOutcome::Updated
            }
            None => {
                articles.push(StoredArticle::inserted(article, now));
                UpsertOutcome::Inserted
            }
        };

        self.write_json(ARTICLES, &articles).await?;
        Ok(outcome)
    }

    async fn create_run(&self, id: &str, started_at: DateTime<Utc>, notes: &RunNotes) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut runs = self.load_runs().await?;
        if runs.iter().any(|r| r.id == id) {
            return Err(AppError::storage(format!("run {} already exists", id)));
        }
        runs.push(IngestionRun::started(id, started_at, notes.clone()));
        self.write_json(RUNS, &runs).await
    }

    async fn complete_run(
        &self,
        id: &str,
        completed_at: DateTime<Utc>,
        status: RunStatus,
        counts: RunCounts,
        notes: &RunNotes,
    ) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut runs = self.load_runs().await?;
        let run = runs
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| AppError::run_not_found(id))?;

        run.completed_at = Some(completed_at);
        run.status = status;
        run.counts = counts;
        run.notes = notes.clone();

        self.write_json(RUNS, &runs).await
    }

    async fn get_run(&self, id: &str) -> Result<Option<IngestionRun>> {
        let _guard = self.lock.lock().await;
        Ok(self.load_runs().await?.into_iter().find(|r| r.id == id))
    }

    async fn latest_run(&self) -> Result<Option<IngestionRun>> {
        let _guard = self.lock.lock().await;
        // Ties on start time go to the later insert.
        Ok(self
            .load_runs()
            .await?
            .into_iter()
            .max_by_key(|r| r.started_at))
    }

    async fn delete_unsaved_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let _guard = self.lock.lock().await;
        let mut articles = self.load_articles().await?;

        let before = articles.len();
        articles.retain(|a| a.is_saved || a.published_at >= cutoff);
        let removed = before - articles.len();

        if removed > 0 {
            self.write_json(ARTICLES, &articles).await?;
        }
        Ok(removed)
    }

    async fn list_articles(&self, query: &ArticleQuery) -> Result<ArticlePage> {
        let _guard = self.lock.lock().await;
        let names: HashMap<String, String> = self
            .sources()
            .await?
            .into_iter()
            .map(|s| (s.id, s.name))
            .collect();

        let mut matched: Vec<StoredArticle> = self
            .load_articles()
            .await?
            .into_iter()
            .filter(|a| query.matches(a))
            .collect();
        matched.sort_by_key(|a| (Reverse(a.published_at), Reverse(a.last_seen_at)));

        let total = matched.len();
        let items = matched
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .map(|article| {
                let source_name = names
                    .get(&article.source_id)
                    .cloned()
                    .unwrap_or_else(|| article.source_id.clone());
                ArticleView {
                    article,
                    source_name,
                }
            })
            .collect();

        Ok(ArticlePage { total, items })
    }

    async fn set_saved(&self, id: &str, saved: bool) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut articles = self.load_articles().await?;
        let Some(row) = articles.iter_mut().find(|a| a.id == id) else {
            return Ok(false);
        };
        row.is_saved = saved;
        row.updated_at = Utc::now();
        self.write_json(ARTICLES, &articles).await?;
        Ok(true)
    }

    async fn delete_article(&self, id: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut articles = self.load_articles().await?;
        let before = articles.len();
        articles.retain(|a| a.id != id);
        if articles.len() == before {
            return Ok(false);
        }
        self.write_json(ARTICLES, &articles).await?;
        Ok(true)
    }
}
