//! Pipeline entry points for ingestion.
//!
//! - `IngestionService`: single-flight orchestration of one run
//! - `apply_retention`: rolling-window eviction
//! - `DailyScheduler`: once-a-day background trigger

pub mod ingest;
pub mod retention;
pub mod scheduler;

pub use ingest::{ALREADY_RUNNING, IngestionService, normalize};
pub use retention::{apply_retention, retention_cutoff};
pub use scheduler::{DailyScheduler, RunTrigger, SchedulerHandle, next_fire_after};
