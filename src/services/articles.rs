// src/services/articles.rs

//! Article browsing and user overrides (save, unsave, delete).

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{ArticlePage, ArticleQuery, SavedFilter};
use crate::storage::ArticleStore;

pub const MAX_WINDOW_HOURS: u32 = 168;
pub const MAX_LIMIT: usize = 200;

/// Caller-supplied listing parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_window_hours")]
    pub window_hours: u32,
    #[serde(default)]
    pub saved: SavedFilter,
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_window_hours() -> u32 {
    24
}

fn default_limit() -> usize {
    50
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            window_hours: default_window_hours(),
            saved: SavedFilter::All,
            source_id: None,
            limit: default_limit(),
            offset: 0,
        }
    }
}

impl ListParams {
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_WINDOW_HOURS).contains(&self.window_hours) {
            return Err(AppError::validation(format!(
                "window_hours must be between 1 and {MAX_WINDOW_HOURS}, got {}",
                self.window_hours
            )));
        }
        if !(1..=MAX_LIMIT).contains(&self.limit) {
            return Err(AppError::validation(format!(
                "limit must be between 1 and {MAX_LIMIT}, got {}",
                self.limit
            )));
        }
        Ok(())
    }

    /// Storage query with the window anchored at `now`.
    pub fn to_query(&self, now: DateTime<Utc>) -> ArticleQuery {
        ArticleQuery {
            cutoff: Some(now - Duration::hours(i64::from(self.window_hours))),
            saved: self.saved,
            source_id: self.source_id.clone().filter(|s| !s.is_empty()),
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// Read/override access to stored articles.
#[derive(Clone)]
pub struct ArticleCatalog {
    store: Arc<dyn ArticleStore>,
}

impl ArticleCatalog {
    pub fn new(store: Arc<dyn ArticleStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self, params: &ListParams) -> Result<ArticlePage> {
        params.validate()?;
        self.store.list_articles(&params.to_query(Utc::now())).await
    }

    /// Mark an article as saved, exempting it from retention.
    pub async fn save(&self, id: &str) -> Result<()> {
        self.set_saved(id, true).await
    }

    pub async fn unsave(&self, id: &str) -> Result<()> {
        self.set_saved(id, false).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        if self.store.delete_article(id).await? {
            log::info!("Deleted article {}", id);
            Ok(())
        } else {
            Err(AppError::article_not_found(id))
        }
    }

    async fn set_saved(&self, id: &str, saved: bool) -> Result<()> {
        if self.store.set_saved(id, saved).await? {
            Ok(())
        } else {
            Err(AppError::article_not_found(id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NormalizedArticle;
    use crate::storage::LocalStorage;
    use crate::utils::url::derive_id;
    use tempfile::TempDir;

    fn catalog(temp: &TempDir) -> (ArticleCatalog, Arc<LocalStorage>) {
        let store = Arc::new(LocalStorage::new(temp.path()));
        (ArticleCatalog::new(store.clone()), store)
    }

    async fn seed(store: &LocalStorage, url: &str, age_hours: i64) -> String {
        let now = Utc::now();
        let published_at = now - Duration::hours(age_hours);
        let article = NormalizedArticle {
            id: derive_id(url),
            source_id: "dcn".into(),
            title: url.into(),
            url: url.into(),
            canonical_url: url.into(),
            published_at,
            snippet: String::new(),
            image_url: None,
            first_seen_at: now,
            last_seen_at: now,
        };
        store.upsert_article(&article, now).await.unwrap();
        article.id
    }

    #[test]
    fn test_params_validation() {
        assert!(ListParams::default().validate().is_ok());

        let bad_window = ListParams {
            window_hours: 0,
            ..ListParams::default()
        };
        assert!(matches!(bad_window.validate(), Err(AppError::Validation(_))));

        let wide_window = ListParams {
            window_hours: 169,
            ..ListParams::default()
        };
        assert!(wide_window.validate().is_err());

        let bad_limit = ListParams {
            limit: 201,
            ..ListParams::default()
        };
        assert!(bad_limit.validate().is_err());
    }

    #[tokio::test]
    async fn test_list_uses_window() {
        let temp = TempDir::new().unwrap();
        let (catalog, store) = catalog(&temp);
        seed(&store, "https://example.com/new", 2).await;
        seed(&store, "https://example.com/old", 48).await;

        let page = catalog.list(&ListParams::default()).await.unwrap();
        assert_eq!(page.total, 1);

        let wide = ListParams {
            window_hours: 72,
            ..ListParams::default()
        };
        assert_eq!(catalog.list(&wide).await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn test_save_unsave_delete() {
        let temp = TempDir::new().unwrap();
        let (catalog, store) = catalog(&temp);
        let id = seed(&store, "https://example.com/old", 48).await;

        catalog.save(&id).await.unwrap();
        let saved = ListParams {
            saved: SavedFilter::Saved,
            ..ListParams::default()
        };
        assert_eq!(catalog.list(&saved).await.unwrap().total, 1);

        catalog.unsave(&id).await.unwrap();
        assert_eq!(catalog.list(&saved).await.unwrap().total, 0);

        catalog.delete(&id).await.unwrap();
        assert!(catalog.delete(&id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let temp = TempDir::new().unwrap();
        let (catalog, _) = catalog(&temp);
        assert!(catalog.save("nope").await.unwrap_err().is_not_found());
        assert!(catalog.unsave("nope").await.unwrap_err().is_not_found());
    }
}
