// src/pipeline/ingest.rs

//! Ingestion orchestrator.
//!
//! One run walks every adapter, upserts the articles inside the window,
//! applies retention and records the outcome. Only one run may be active at
//! a time; a concurrent request is turned away instead of queued.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    IngestionConfig, IngestionRun, NormalizedArticle, RawArticle, RunCounts, RunNotes,
    RunSnapshot, RunStatus, SourceHealth, StatusSnapshot, Trigger, TriggerOutcome, UpsertOutcome,
};
use crate::pipeline::retention::{apply_retention, retention_cutoff};
use crate::services::SourceAdapter;
use crate::storage::ArticleStore;
use crate::utils::text::{truncate_graphemes, truncate_secs};
use crate::utils::url::{canonicalize, derive_id};

pub const ALREADY_RUNNING: &str = "ingestion already running";

/// Clears the single-flight flag when the run ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Running totals for one run.
#[derive(Debug, Default)]
struct RunTally {
    counts: RunCounts,
    records_in: usize,
    records_out: usize,
    warnings: Vec<String>,
}

/// Turn a raw article into its stored form.
///
/// Relative links resolve against `base_url`. Returns `None` (skipped) when
/// the article has no timestamp or was published before `cutoff`.
pub fn normalize(
    raw: &RawArticle,
    base_url: Option<&str>,
    now: DateTime<Utc>,
    cutoff: DateTime<Utc>,
    snippet_max_len: usize,
) -> Option<NormalizedArticle> {
    let published_at = raw.published_at.filter(|p| *p >= cutoff)?;
    let canonical_url = canonicalize(&raw.url, base_url);

    Some(NormalizedArticle {
        id: derive_id(&canonical_url),
        source_id: raw.source_id.clone(),
        title: raw.title.trim().to_string(),
        url: canonical_url.clone(),
        canonical_url,
        published_at: truncate_secs(published_at),
        snippet: truncate_graphemes(raw.snippet.trim(), snippet_max_len),
        image_url: raw.image_url.as_deref().map(|u| canonicalize(u, base_url)),
        first_seen_at: now,
        last_seen_at: now,
    })
}

/// Coordinates runs over a fixed set of adapters and one store.
pub struct IngestionService {
    config: IngestionConfig,
    adapters: Vec<Arc<dyn SourceAdapter>>,
    store: Arc<dyn ArticleStore>,
    running: AtomicBool,
}

impl IngestionService {
    pub fn new(
        config: IngestionConfig,
        adapters: Vec<Arc<dyn SourceAdapter>>,
        store: Arc<dyn ArticleStore>,
    ) -> Self {
        Self {
            config,
            adapters,
            store,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn try_acquire(&self) -> Option<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(&self.running))
    }

    /// Start a run unless one is already active.
    ///
    /// A rejected request writes nothing. An accepted one always leaves a
    /// terminal run record behind unless the store itself is unusable.
    pub async fn trigger_run(&self, trigger: Trigger) -> Result<TriggerOutcome> {
        let Some(_guard) = self.try_acquire() else {
            log::info!("Ingestion request from {} rejected: already running", trigger);
            return Ok(TriggerOutcome {
                accepted: false,
                run: None,
                message: ALREADY_RUNNING.to_string(),
            });
        };

        let run_id = Uuid::new_v4().to_string();
        let started_at = truncate_secs(Utc::now());
        self.store
            .create_run(&run_id, started_at, &RunNotes::started(trigger))
            .await?;
        log::info!(
            "Ingestion run {} started (trigger={}, sources={})",
            run_id,
            trigger,
            self.adapters.len()
        );

        let run = self.execute_run(&run_id, trigger).await?;
        log::info!(
            "Ingestion run {} finished: {} (new={}, updated={}, skipped={}, errors={})",
            run.id,
            run.status,
            run.counts.new_count,
            run.counts.updated_count,
            run.counts.skipped_count,
            run.counts.error_count
        );

        Ok(TriggerOutcome {
            accepted: true,
            run: Some(RunSnapshot::from(&run)),
            message: "ok".to_string(),
        })
    }

    /// Whether a run is active plus the most recently started run.
    pub async fn status_snapshot(&self) -> Result<StatusSnapshot> {
        let last_run = self.store.latest_run().await?;
        Ok(StatusSnapshot {
            running: self.is_running(),
            last_run: last_run.as_ref().map(RunSnapshot::from),
        })
    }

    /// Probe every source concurrently.
    pub async fn health_snapshot(&self) -> Vec<SourceHealth> {
        join_all(self.adapters.iter().map(|adapter| adapter.check_health())).await
    }

    async fn execute_run(&self, run_id: &str, trigger: Trigger) -> Result<IngestionRun> {
        let mut tally = RunTally::default();

        match self.ingest_all(run_id, trigger, &mut tally).await {
            Ok(run) => Ok(run),
            Err(e) => {
                log::error!("Ingestion run {} hit a fatal error: {}", run_id, e);
                let counts = RunCounts {
                    error_count: tally.counts.error_count + 1,
                    ..tally.counts
                };
                let notes = RunNotes {
                    warnings: vec![format!("fatal: {e}")],
                    ..RunNotes::started(trigger)
                };
                self.store
                    .complete_run(run_id, truncate_secs(Utc::now()), RunStatus::Failed, counts, &notes)
                    .await?;
                self.load_run(run_id).await
            }
        }
    }

    async fn ingest_all(
        &self,
        run_id: &str,
        trigger: Trigger,
        tally: &mut RunTally,
    ) -> Result<IngestionRun> {
        let now = truncate_secs(Utc::now());
        let cutoff = retention_cutoff(now, self.config.window_hours)?;

        for adapter in &self.adapters {
            let source_id = adapter.source().id.as_str();
            if let Err(e) = self.ingest_source(adapter.as_ref(), now, cutoff, tally).await {
                log::warn!("{}: ingestion failed: {}", source_id, e);
                tally.counts.error_count += 1;
                tally.warnings.push(format!("{source_id}: ingestion_error={e}"));
            }
        }

        let removed = apply_retention(self.store.as_ref(), now, self.config.window_hours).await?;
        let status = RunStatus::classify(tally.counts.error_count, self.adapters.len());

        let notes = RunNotes {
            trigger: trigger.to_string(),
            records_in: Some(tally.records_in),
            records_out: Some(tally.records_out),
            removed_count: Some(removed),
            warnings: std::mem::take(&mut tally.warnings),
        };
        self.store
            .complete_run(run_id, truncate_secs(Utc::now()), status, tally.counts, &notes)
            .await?;

        self.load_run(run_id).await
    }

    /// Fetch and upsert one source. Errors here stay inside the source boundary.
    async fn ingest_source(
        &self,
        adapter: &dyn SourceAdapter,
        now: DateTime<Utc>,
        cutoff: DateTime<Utc>,
        tally: &mut RunTally,
    ) -> Result<()> {
        let source = adapter.source();
        let source_id = &source.id;
        let outcome = adapter.fetch().await?;

        tally.records_in += outcome.articles.len();
        for warning in &outcome.warnings {
            log::warn!("{}: {}", source_id, warning);
            tally.warnings.push(format!("{source_id}: {warning}"));
        }

        for raw in &outcome.articles {
            let Some(article) = normalize(
                raw,
                Some(&source.base_url),
                now,
                cutoff,
                self.config.snippet_max_len,
            ) else {
                tally.counts.skipped_count += 1;
                continue;
            };
            match self.store.upsert_article(&article, now).await? {
                UpsertOutcome::Inserted => tally.counts.new_count += 1,
                UpsertOutcome::Updated => tally.counts.updated_count += 1,
            }
            tally.records_out += 1;
        }

        log::info!(
            "{}: {} fetched, {} warnings",
            source_id,
            outcome.articles.len(),
            outcome.warnings.len()
        );
        Ok(())
    }

    async fn load_run(&self, run_id: &str) -> Result<IngestionRun> {
        self.store
            .get_run(run_id)
            .await?
            .ok_or_else(|| AppError::run_not_found(run_id))
    }
}
