// src/models/mod.rs

//! Domain models for the harvester.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod article;
mod config;
mod health;
mod run;
mod selectors;
mod source;

// Re-export all public types
pub use article::{
    ArticlePage, ArticleQuery, ArticleView, NormalizedArticle, RawArticle, SavedFilter,
    StoredArticle, UpsertOutcome,
};
pub use config::{Config, HttpConfig, IngestionConfig, SchedulerConfig, StorageConfig};
pub use health::{HealthStatus, SourceHealth};
pub use run::{
    IngestionRun, RunCounts, RunNotes, RunSnapshot, RunStatus, StatusSnapshot, Trigger,
    TriggerOutcome,
};
pub use selectors::SourceSelectors;
pub use source::SourceConfig;
