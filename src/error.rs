// src/error.rs

//! Unified error handling for the harvester.

use std::fmt;

use thiserror::Error;

/// Result type alias for harvester operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status after retries were exhausted
    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// XML tokenizing failed
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Feed retrieval or parsing error
    #[error("Feed error for {context}: {message}")]
    Feed { context: String, message: String },

    /// Listing scrape error
    #[error("Scrape error for {context}: {message}")]
    Scrape { context: String, message: String },

    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Requested record does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Background scheduler error
    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a feed error with context.
    pub fn feed(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Feed {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a scrape error with context.
    pub fn scrape(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Scrape {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a storage error.
    pub fn storage(message: impl fmt::Display) -> Self {
        Self::Storage(message.to_string())
    }

    /// Create a not-found error for an article id.
    pub fn article_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "article",
            id: id.into(),
        }
    }

    /// Create a not-found error for a run id.
    pub fn run_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "ingestion run",
            id: id.into(),
        }
    }

    /// Whether this error is the "not found" condition rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_distinct() {
        let err = AppError::article_not_found("abc");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "article not found: abc");
        assert!(!AppError::storage("disk gone").is_not_found());
    }

    #[test]
    fn feed_error_message_carries_context() {
        let err = AppError::feed("https://example.com/feed", "empty document");
        assert_eq!(
            err.to_string(),
            "Feed error for https://example.com/feed: empty document"
        );
    }
}
