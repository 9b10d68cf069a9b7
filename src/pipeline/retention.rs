// src/pipeline/retention.rs

//! Rolling-window eviction of unsaved articles.

use chrono::{DateTime, Duration, Utc};

use crate::error::{AppError, Result};
use crate::storage::ArticleStore;
use crate::utils::text::truncate_secs;

/// Start of the retention window, at whole-second precision.
///
/// Fails when the window reaches past the representable date range.
pub fn retention_cutoff(now: DateTime<Utc>, window_hours: u32) -> Result<DateTime<Utc>> {
    Duration::try_hours(i64::from(window_hours))
        .and_then(|window| now.checked_sub_signed(window))
        .map(truncate_secs)
        .ok_or_else(|| {
            AppError::validation(format!("window_hours {window_hours} is out of range"))
        })
}

/// Delete every unsaved article published before `now - window_hours`.
///
/// Saved articles are never evicted. Running it twice with the same inputs
/// removes nothing the second time.
pub async fn apply_retention(
    store: &dyn ArticleStore,
    now: DateTime<Utc>,
    window_hours: u32,
) -> Result<usize> {
    let cutoff = retention_cutoff(now, window_hours)?;
    let removed = store.delete_unsaved_older_than(cutoff).await?;
    if removed > 0 {
        log::info!("Retention removed {} articles older than {}", removed, cutoff);
    }
    Ok(removed)
}
