//! File-backed alert throttle that survives supervisor restarts.
//!
//! The record file holds a single ASCII decimal Unix timestamp: the last
//! time an alert was delivered. Reads fail open so a missing or corrupted
//! record never suppresses an alert.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// Default location of the throttle record.
pub const DEFAULT_RECORD_FILE: &str = "/tmp/crashwatch";

/// Lower bound applied to any configured throttle interval.
pub const MIN_INTERVAL: Duration = Duration::from_secs(60);

/// Durable rate limiter for crash alerts.
#[derive(Debug, Clone)]
pub struct ThrottleGate {
    record_file: PathBuf,
    min_interval: Duration,
}

impl ThrottleGate {
    /// Create a gate backed by `record_file`.
    ///
    /// Intervals shorter than [`MIN_INTERVAL`] are raised to it.
    pub fn new(record_file: impl Into<PathBuf>, min_interval: Duration) -> Self {
        Self {
            record_file: record_file.into(),
            min_interval: min_interval.max(MIN_INTERVAL),
        }
    }

    /// Path of the record file.
    pub fn record_file(&self) -> &Path {
        &self.record_file
    }

    /// Effective interval after clamping.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Whether a new alert may be sent now.
    pub async fn allow(&self) -> bool {
        self.allow_at(Utc::now()).await
    }

    /// Whether a new alert may be sent at `now`.
    pub async fn allow_at(&self, now: DateTime<Utc>) -> bool {
        let Some(last) = read_record(&self.record_file).await else {
            return true;
        };

        let elapsed = now.signed_duration_since(last);
        let interval = chrono::Duration::from_std(self.min_interval)
            .unwrap_or(chrono::Duration::MAX);
        let allowed = elapsed >= interval;
        debug!(
            last_reported = %last.to_rfc3339(),
            elapsed_secs = elapsed.num_seconds(),
            allowed,
            "throttle check"
        );
        allowed
    }

    /// Record that an alert was delivered now.
    ///
    /// Write failures are logged and otherwise ignored.
    pub async fn record_now(&self) {
        if let Err(e) = write_record(&self.record_file, Utc::now()).await {
            warn!(
                error = %e,
                path = %self.record_file.display(),
                "failed to write throttle record"
            );
        }
    }
}

/// Read the last-reported timestamp, or `None` if missing or malformed.
async fn read_record(path: &Path) -> Option<DateTime<Utc>> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) => {
            debug!(error = %e, path = %path.display(), "no readable throttle record");
            return None;
        }
    };

    let Ok(secs) = contents.trim().parse::<i64>() else {
        warn!(path = %path.display(), "throttle record is not a timestamp, ignoring");
        return None;
    };

    DateTime::from_timestamp(secs, 0)
}

/// Atomically replace the record with `at`.
///
/// # Errors
///
/// Returns an error if the temporary file cannot be written or renamed.
pub async fn write_record(path: &Path, at: DateTime<Utc>) -> anyhow::Result<()> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, at.timestamp().to_string())
        .await
        .with_context(|| format!("failed to write {}", tmp_path.display()))?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("failed to rename {} into place", tmp_path.display()))?;

    debug!(path = %path.display(), "throttle record updated");
    Ok(())
}
