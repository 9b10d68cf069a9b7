//! Source reachability reports.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::SourceConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Error,
}

/// Result of probing a source's endpoints. Computed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceHealth {
    pub source_id: String,
    pub source_name: String,
    pub status: HealthStatus,
    pub checked_at: DateTime<Utc>,
    pub detail: String,
}

impl SourceHealth {
    pub fn ok(source: &SourceConfig, checked_at: DateTime<Utc>, detail: impl Into<String>) -> Self {
        Self::new(source, HealthStatus::Ok, checked_at, detail)
    }

    pub fn error(
        source: &SourceConfig,
        checked_at: DateTime<Utc>,
        detail: impl Into<String>,
    ) -> Self {
        Self::new(source, HealthStatus::Error, checked_at, detail)
    }

    fn new(
        source: &SourceConfig,
        status: HealthStatus,
        checked_at: DateTime<Utc>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source.id.clone(),
            source_name: source.name.clone(),
            status,
            checked_at,
            detail: detail.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == HealthStatus::Ok
    }
}
