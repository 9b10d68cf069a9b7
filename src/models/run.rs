//! Ingestion run bookkeeping.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::text::to_iso_utc;

/// What started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Manual,
    Scheduler,
    Cli,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Manual => "manual",
            Trigger::Scheduler => "scheduler",
            Trigger::Cli => "cli",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a run. Every state but `Running` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Success,
    PartialFailure,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::PartialFailure => "partial_failure",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }

    /// Classify a finished run from its per-source error tally.
    ///
    /// A run with no sources at all counts as failed.
    pub fn classify(error_count: usize, source_count: usize) -> Self {
        if error_count >= source_count {
            RunStatus::Failed
        } else if error_count > 0 {
            RunStatus::PartialFailure
        } else {
            RunStatus::Success
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-run article dispositions and source errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub new_count: usize,
    pub updated_count: usize,
    pub skipped_count: usize,
    pub error_count: usize,
}

/// Free-form run notes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunNotes {
    pub trigger: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records_in: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records_out: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removed_count: Option<usize>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl RunNotes {
    /// Notes written when a run is opened.
    pub fn started(trigger: Trigger) -> Self {
        Self {
            trigger: trigger.to_string(),
            ..Self::default()
        }
    }
}

/// One orchestration attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionRun {
    pub id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    #[serde(flatten)]
    pub counts: RunCounts,
    #[serde(default)]
    pub notes: RunNotes,
}

impl IngestionRun {
    /// A freshly opened run record.
    pub fn started(id: impl Into<String>, started_at: DateTime<Utc>, notes: RunNotes) -> Self {
        Self {
            id: id.into(),
            started_at,
            completed_at: None,
            status: RunStatus::Running,
            counts: RunCounts::default(),
            notes,
        }
    }
}

/// Caller-facing view of a run record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSnapshot {
    pub id: String,
    pub started_at_utc: String,
    pub completed_at_utc: Option<String>,
    pub status: RunStatus,
    pub new_count: usize,
    pub updated_count: usize,
    pub skipped_count: usize,
    pub error_count: usize,
    pub notes: RunNotes,
}

impl From<&IngestionRun> for RunSnapshot {
    fn from(run: &IngestionRun) -> Self {
        Self {
            id: run.id.clone(),
            started_at_utc: to_iso_utc(run.started_at),
            completed_at_utc: run.completed_at.map(to_iso_utc),
            status: run.status,
            new_count: run.counts.new_count,
            updated_count: run.counts.updated_count,
            skipped_count: run.counts.skipped_count,
            error_count: run.counts.error_count,
            notes: run.notes.clone(),
        }
    }
}

/// Result of asking for a new run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerOutcome {
    pub accepted: bool,
    pub run: Option<RunSnapshot>,
    pub message: String,
}

/// Whether a run is active plus the most recently started run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub running: bool,
    pub last_run: Option<RunSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_follows_error_share() {
        assert_eq!(RunStatus::classify(0, 3), RunStatus::Success);
        assert_eq!(RunStatus::classify(1, 3), RunStatus::PartialFailure);
        assert_eq!(RunStatus::classify(3, 3), RunStatus::Failed);
        assert_eq!(RunStatus::classify(0, 0), RunStatus::Failed);
    }

    #[test]
    fn run_round_trips_through_json_with_flat_counts() {
        let run = IngestionRun::started("r1", Utc::now(), RunNotes::started(Trigger::Manual));
        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["status"], "running");
        assert_eq!(json["new_count"], 0);
        assert_eq!(json["notes"]["trigger"], "manual");
        assert!(json["notes"].get("removed_count").is_none());

        let back: IngestionRun = serde_json::from_value(json).unwrap();
        assert_eq!(back, run);
    }
}
