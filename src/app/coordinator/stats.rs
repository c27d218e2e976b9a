//! Download statistics and the final session result
//!
//! The coordinator folds every [`TaskReport`] into [`DownloadStats`]; the
//! finished [`SessionResult`] decides the exit status of the run.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::models::{TaskReport, Transport};
use crate::errors::{AppError, DownloadError, Result};

/// Aggregated download statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadStats {
    /// Manifest pages fetched
    pub pages_fetched: usize,
    /// Records listed by the manifest
    pub records_seen: usize,
    /// Records selected by the pattern filter
    pub files_matched: usize,
    /// Downloads that completed
    pub files_completed: usize,
    /// Artifacts that failed, including rejected records
    pub files_failed: usize,
    /// Listed records that failed before a download was launched
    pub files_rejected: usize,
    /// Total bytes written
    pub total_bytes_downloaded: u64,
    /// Downloads served by the direct transport
    pub via_direct: usize,
    /// Downloads served from object storage
    pub via_object_storage: usize,
    /// Start time of the session
    pub session_start: DateTime<Utc>,
}

impl Default for DownloadStats {
    fn default() -> Self {
        Self {
            pages_fetched: 0,
            records_seen: 0,
            files_matched: 0,
            files_completed: 0,
            files_failed: 0,
            files_rejected: 0,
            total_bytes_downloaded: 0,
            via_direct: 0,
            via_object_storage: 0,
            session_start: Utc::now(),
        }
    }
}

impl DownloadStats {
    /// Matched downloads with no report, i.e. aborted before finishing
    pub fn files_unfinished(&self) -> usize {
        let reported = self.files_completed + self.files_failed - self.files_rejected;
        self.files_matched.saturating_sub(reported)
    }

    /// Artifacts the run was responsible for: matches plus rejected records
    pub fn files_attempted(&self) -> usize {
        self.files_matched + self.files_rejected
    }

    /// Session duration so far
    pub fn elapsed(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.session_start)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Format the downloaded byte count for humans
    pub fn format_bytes(&self) -> String {
        let bytes = self.total_bytes_downloaded as f64;
        if bytes < 1024.0 {
            format!("{} B", self.total_bytes_downloaded)
        } else if bytes < 1024.0 * 1024.0 {
            format!("{:.1} KB", bytes / 1024.0)
        } else if bytes < 1024.0 * 1024.0 * 1024.0 {
            format!("{:.1} MB", bytes / (1024.0 * 1024.0))
        } else {
            format!("{:.1} GB", bytes / (1024.0 * 1024.0 * 1024.0))
        }
    }
}

/// One artifact that did not download
#[derive(Debug)]
pub struct FailedArtifact {
    /// Artifact path as listed in the manifest
    pub path: String,
    /// Why it failed
    pub error: DownloadError,
}

/// Final result of a download session
#[derive(Debug)]
pub struct SessionResult {
    /// Final download statistics
    pub stats: DownloadStats,
    /// Failures in the order the coordinator received them
    pub failures: Vec<FailedArtifact>,
    /// Whether in-flight downloads were aborted after a failure
    pub aborted: bool,
    /// Time taken for the entire session
    pub total_duration: Duration,
}

impl SessionResult {
    /// Start an empty session
    pub(crate) fn start() -> Self {
        Self {
            stats: DownloadStats::default(),
            failures: Vec::new(),
            aborted: false,
            total_duration: Duration::ZERO,
        }
    }

    /// Fold one task report into the session
    pub(crate) fn record(&mut self, report: TaskReport) {
        match report.outcome {
            Ok(outcome) => {
                self.stats.files_completed += 1;
                self.stats.total_bytes_downloaded += outcome.bytes_written;
                match outcome.via {
                    Transport::Direct => self.stats.via_direct += 1,
                    Transport::ObjectStorage => self.stats.via_object_storage += 1,
                }
            }
            Err(error) => self.record_failure(report.path, error),
        }
    }

    /// Record a listed record that failed before any download was launched
    pub(crate) fn record_rejected(&mut self, path: String, error: DownloadError) {
        self.stats.files_rejected += 1;
        self.record_failure(path, error);
    }

    fn record_failure(&mut self, path: String, error: DownloadError) {
        self.stats.files_failed += 1;
        self.failures.push(FailedArtifact { path, error });
    }

    /// Stop the session clock
    pub(crate) fn finish(&mut self) {
        self.total_duration = self.stats.elapsed();
    }

    /// Whether every matched artifact downloaded
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.aborted
    }

    /// Get a summary of the session result
    pub fn summary(&self) -> String {
        if self.is_success() {
            format!(
                "Downloaded {} of {} artifacts ({}) in {:.1?}",
                self.stats.files_completed,
                self.stats.records_seen,
                self.stats.format_bytes(),
                self.total_duration
            )
        } else if self.aborted {
            format!(
                "Aborted after first failure: {} downloaded, {} failed, {} cancelled",
                self.stats.files_completed,
                self.stats.files_failed,
                self.stats.files_unfinished()
            )
        } else {
            format!(
                "{} downloaded, {} failed in {:.1?}",
                self.stats.files_completed, self.stats.files_failed, self.total_duration
            )
        }
    }

    /// Turn the session into the run's final result
    ///
    /// An aborted session fails with the first failure; otherwise any
    /// failure yields an aggregate error.
    pub fn into_result(mut self) -> Result<DownloadStats> {
        if self.failures.is_empty() {
            return Ok(self.stats);
        }

        if self.aborted {
            let first = self.failures.swap_remove(0);
            return Err(AppError::download(first.path, first.error));
        }

        Err(AppError::DownloadsFailed {
            failed: self.failures.len(),
            total: self.stats.files_attempted(),
        })
    }
}
