// src/pipeline/scheduler.rs

//! Daily UTC scheduler.
//!
//! A single background task sleeps until the next configured `HH:MM` UTC,
//! triggers a run and goes back to sleep. Stopping is observed mid-sleep.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{AppError, Result};
use crate::models::{SchedulerConfig, Trigger, TriggerOutcome};
use crate::pipeline::ingest::IngestionService;
use crate::utils::text::to_iso_utc;

/// Shortest sleep between wake-ups.
const MIN_SLEEP: Duration = Duration::from_secs(1);

/// Something the scheduler can start runs on.
#[async_trait]
pub trait RunTrigger: Send + Sync + 'static {
    async fn trigger(&self, trigger: Trigger) -> Result<TriggerOutcome>;
}

#[async_trait]
impl RunTrigger for IngestionService {
    async fn trigger(&self, trigger: Trigger) -> Result<TriggerOutcome> {
        self.trigger_run(trigger).await
    }
}

/// The first `hour:minute` UTC strictly after `now`.
///
/// Returns `None` for an out-of-range time of day.
pub fn next_fire_after(now: DateTime<Utc>, hour: u32, minute: u32) -> Option<DateTime<Utc>> {
    let today = now.date_naive().and_hms_opt(hour, minute, 0)?.and_utc();
    if today <= now {
        Some(today + ChronoDuration::days(1))
    } else {
        Some(today)
    }
}

/// Daily wake-up configuration.
#[derive(Debug, Clone)]
pub struct DailyScheduler {
    hour_utc: u32,
    minute_utc: u32,
    stop_grace: Duration,
}

impl DailyScheduler {
    pub fn new(config: &SchedulerConfig) -> Result<Self> {
        if next_fire_after(Utc::now(), config.hour_utc, config.minute_utc).is_none() {
            return Err(AppError::Scheduler(format!(
                "invalid time of day {:02}:{:02}",
                config.hour_utc, config.minute_utc
            )));
        }
        Ok(Self {
            hour_utc: config.hour_utc,
            minute_utc: config.minute_utc,
            stop_grace: Duration::from_secs(config.stop_grace_secs),
        })
    }

    /// Spawn the scheduling loop on the current runtime.
    pub fn start(&self, target: Arc<dyn RunTrigger>) -> SchedulerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(run_loop(self.hour_utc, self.minute_utc, target, stop_rx));
        log::info!(
            "Scheduler started: daily at {:02}:{:02} UTC",
            self.hour_utc,
            self.minute_utc
        );
        SchedulerHandle {
            stop_tx,
            task,
            grace: self.stop_grace,
        }
    }
}

/// Owner of a running scheduler loop.
pub struct SchedulerHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
    grace: Duration,
}

impl SchedulerHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the loop and wait up to the grace period for it to exit.
    ///
    /// Returns whether the loop stopped in time. A run already in progress
    /// is not interrupted.
    pub async fn stop(self) -> bool {
        let _ = self.stop_tx.send(true);
        match tokio::time::timeout(self.grace, self.task).await {
            Ok(Ok(())) => {
                log::info!("Scheduler stopped");
                true
            }
            Ok(Err(e)) => {
                log::error!("Scheduler task ended abnormally: {}", e);
                false
            }
            Err(_) => {
                log::warn!("Scheduler did not stop within {:?}", self.grace);
                false
            }
        }
    }
}

async fn run_loop(
    hour: u32,
    minute: u32,
    target: Arc<dyn RunTrigger>,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        if *stop_rx.borrow() {
            break;
        }

        let now = Utc::now();
        let Some(next) = next_fire_after(now, hour, minute) else {
            log::error!("Scheduler has invalid time {:02}:{:02}; exiting", hour, minute);
            break;
        };
        let sleep = (next - now).to_std().unwrap_or(MIN_SLEEP).max(MIN_SLEEP);
        log::info!("Scheduler sleeping until {}", to_iso_utc(next));

        tokio::select! {
            _ = tokio::time::sleep(sleep) => {}
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
                continue;
            }
        }

        // Run in its own task so a panic is reported instead of killing the loop.
        let target = Arc::clone(&target);
        match tokio::spawn(async move { target.trigger(Trigger::Scheduler).await }).await {
            Ok(Ok(outcome)) if outcome.accepted => {
                let status = outcome
                    .run
                    .map(|r| r.status.to_string())
                    .unwrap_or_default();
                log::info!("Scheduled ingestion finished: {}", status);
            }
            Ok(Ok(outcome)) => log::warn!("Scheduled ingestion skipped: {}", outcome.message),
            Ok(Err(e)) => log::error!("Scheduled ingestion failed: {}", e),
            Err(e) => log::error!("Scheduled ingestion panicked: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTrigger {
        calls: AtomicUsize,
        mode: Mode,
    }

    #[derive(Clone, Copy)]
    enum Mode {
        Succeed,
        Fail,
        Panic,
    }

    impl CountingTrigger {
        fn new(mode: Mode) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                mode,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RunTrigger for CountingTrigger {
        async fn trigger(&self, trigger: Trigger) -> Result<TriggerOutcome> {
            assert_eq!(trigger, Trigger::Scheduler);
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.mode {
                Mode::Succeed => Ok(TriggerOutcome {
                    accepted: true,
                    run: None,
                    message: "ok".into(),
                }),
                Mode::Fail => Err(AppError::storage("locked")),
                Mode::Panic => panic!("adapter blew up"),
            }
        }
    }

    fn scheduler() -> DailyScheduler {
        DailyScheduler::new(&SchedulerConfig::default()).unwrap()
    }

    async fn wait_for_calls(trigger: &CountingTrigger, n: usize) {
        while trigger.calls() < n {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
    }

    #[test]
    fn test_next_fire_later_today() {
        let now = Utc.with_ymd_and_hms(2026, 2, 10, 0, 5, 0).unwrap();
        assert_eq!(
            next_fire_after(now, 0, 15),
            Some(Utc.with_ymd_and_hms(2026, 2, 10, 0, 15, 0).unwrap())
        );
    }

    #[test]
    fn test_next_fire_rolls_to_tomorrow() {
        let now = Utc.with_ymd_and_hms(2026, 2, 10, 0, 15, 0).unwrap();
        assert_eq!(
            next_fire_after(now, 0, 15),
            Some(Utc.with_ymd_and_hms(2026, 2, 11, 0, 15, 0).unwrap())
        );
        let now = Utc.with_ymd_and_hms(2026, 12, 31, 23, 0, 0).unwrap();
        assert_eq!(
            next_fire_after(now, 6, 0),
            Some(Utc.with_ymd_and_hms(2027, 1, 1, 6, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_invalid_time_is_rejected() {
        assert_eq!(next_fire_after(Utc::now(), 24, 0), None);
        let config = SchedulerConfig {
            minute_utc: 60,
            ..SchedulerConfig::default()
        };
        assert!(matches!(DailyScheduler::new(&config), Err(AppError::Scheduler(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_with_scheduler_trigger() {
        let trigger = CountingTrigger::new(Mode::Succeed);
        let handle = scheduler().start(trigger.clone());
        wait_for_calls(&trigger, 1).await;
        assert!(handle.stop().await);
        assert!(trigger.calls() >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_and_panics_do_not_end_loop() {
        for mode in [Mode::Fail, Mode::Panic] {
            let trigger = CountingTrigger::new(mode);
            let handle = scheduler().start(trigger.clone());
            wait_for_calls(&trigger, 2).await;
            assert!(!handle.is_finished());
            assert!(handle.stop().await);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_interrupts_sleep() {
        let trigger = CountingTrigger::new(Mode::Succeed);
        let handle = scheduler().start(trigger.clone());
        tokio::task::yield_now().await;
        assert!(handle.stop().await);
        assert_eq!(trigger.calls(), 0);
    }
}
