//! Download orchestration
//!
//! The coordinator is the control plane of a run. It walks the manifest one
//! page at a time, ensures every record's destination directory, filters the
//! records and launches a [`DownloadTask`] for each match as soon as its page
//! arrives, so enumeration and downloads overlap.
//!
//! - Downloads in flight are bounded by a semaphore.
//! - Tasks send a [`TaskReport`] over a channel; only the coordinator looks at
//!   outcomes, so failure reporting is deterministic.
//! - Under [`FailurePolicy::FailFast`] the first failure stops enumeration and
//!   aborts in-flight downloads.
//! - The coordinator always waits for every launched task before returning.
//!
//! # Architecture
//!
//! - [`config`] - Configuration structures and validation
//! - [`stats`] - Download statistics and the session result

pub mod config;
pub mod stats;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use futures::{FutureExt, TryStreamExt};
use indicatif::ProgressBar;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::app::filter::PatternFilter;
use crate::app::manifest::{ManifestEnumerator, PageSource};
use crate::app::models::{ArtifactRecord, TaskReport};
use crate::app::transport::TransportSelector;
use crate::app::worker::{ensure_parent_dir, resolve_destination, DownloadTask};
use crate::constants::workers;
use crate::errors::{AppError, ConfigError, DownloadError, Result};

pub use config::{CoordinatorConfig, FailurePolicy};
pub use stats::{DownloadStats, FailedArtifact, SessionResult};

/// Main coordinator for a fetch run
pub struct Coordinator {
    config: CoordinatorConfig,
    out_root: PathBuf,
    transport: Arc<TransportSelector>,
    progress: ProgressBar,
}

/// Mutable state of one run
struct RunState {
    session: SessionResult,
    tasks: JoinSet<()>,
    reports: mpsc::Receiver<TaskReport>,
    policy: FailurePolicy,
    progress: ProgressBar,
}

enum Event {
    Report(TaskReport),
    Joined(Option<std::result::Result<(), JoinError>>),
}

impl RunState {
    /// Whether enumeration and launches must stop
    fn stopped(&self) -> bool {
        self.session.aborted
    }

    fn handle_report(&mut self, report: TaskReport) {
        self.progress.inc(1);
        match &report.outcome {
            Ok(outcome) => debug!(
                "Downloaded {} ({} bytes via {})",
                report.path, outcome.bytes_written, outcome.via
            ),
            Err(e) => error!("Download of {} failed: {}", report.path, e),
        }

        let failed = !report.is_success();
        self.session.record(report);
        if failed {
            self.on_failure();
        }
    }

    fn handle_join_error(&mut self, join_error: JoinError) {
        // Cancelled tasks are the result of an abort already accounted for.
        // Download panics are caught inside the task and arrive as reports.
        if join_error.is_panic() {
            error!("Download task panicked after reporting: {}", join_error);
        }
    }

    fn on_failure(&mut self) {
        if self.policy == FailurePolicy::FailFast && !self.session.aborted {
            warn!(
                "Aborting {} in-flight downloads after first failure",
                self.tasks.len()
            );
            self.tasks.abort_all();
            self.session.aborted = true;
        }
    }

    /// Handle every report that is already waiting
    fn drain_ready(&mut self) {
        while let Ok(report) = self.reports.try_recv() {
            self.handle_report(report);
        }
    }

    /// Wait for every launched task, handling reports as they arrive
    async fn wait_for_all(&mut self) {
        loop {
            let event = tokio::select! {
                Some(report) = self.reports.recv() => Event::Report(report),
                joined = self.tasks.join_next() => Event::Joined(joined),
            };

            match event {
                Event::Report(report) => self.handle_report(report),
                Event::Joined(Some(Ok(()))) => {}
                Event::Joined(Some(Err(e))) => self.handle_join_error(e),
                Event::Joined(None) => break,
            }
        }
        self.drain_ready();
    }
}

impl Coordinator {
    /// Create a coordinator writing under `out_root`
    pub fn new(
        config: CoordinatorConfig,
        out_root: impl Into<PathBuf>,
        transport: Arc<TransportSelector>,
    ) -> Self {
        Self {
            config,
            out_root: out_root.into(),
            transport,
            progress: ProgressBar::hidden(),
        }
    }

    /// Report finished downloads on `progress`
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Enumerate, filter and download every matching artifact
    ///
    /// Returns the session once every launched download reached a terminal
    /// state. Download failures are carried in the [`SessionResult`]; use
    /// [`SessionResult::into_result`] for the exit decision.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for an invalid configuration and
    /// `AppError::Manifest` if enumeration fails. Launched downloads are still
    /// waited for (or aborted under fail-fast) before the error is returned.
    pub async fn run<S: PageSource>(
        &self,
        mut enumerator: ManifestEnumerator<S>,
        filter: &PatternFilter,
    ) -> Result<SessionResult> {
        self.config
            .validate()
            .map_err(|reason| ConfigError::InvalidValue {
                field: "concurrency".to_string(),
                value: self.config.concurrency.to_string(),
                reason,
            })?;

        info!(
            "Starting downloads into {} (concurrency {}, {}, patterns {:?})",
            self.out_root.display(),
            self.config.concurrency,
            self.config.failure_policy,
            filter.active_patterns().collect::<Vec<_>>()
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let (report_tx, reports) = mpsc::channel(workers::REPORT_CHANNEL_CAPACITY);
        let mut state = RunState {
            session: SessionResult::start(),
            tasks: JoinSet::new(),
            reports,
            policy: self.config.failure_policy,
            progress: self.progress.clone(),
        };

        let mut manifest_error = None;

        'pages: while !state.stopped() {
            let records = match enumerator.next_page().await {
                Ok(Some(records)) => records,
                Ok(None) => break,
                Err(e) => {
                    error!("Manifest enumeration failed: {}", e);
                    if self.config.failure_policy == FailurePolicy::FailFast {
                        state.tasks.abort_all();
                    }
                    manifest_error = Some(e);
                    break;
                }
            };
            state.session.stats.pages_fetched += 1;

            for record in records {
                state.drain_ready();
                if state.stopped() {
                    break 'pages;
                }
                state.session.stats.records_seen += 1;

                // Every listed artifact gets its directory, matched or not.
                if let Err(e) = self.prepare_directory(&record.path).await {
                    error!("Cannot prepare destination for {}: {}", record.path, e);
                    state.session.record_rejected(record.path, e);
                    state.on_failure();
                    continue;
                }

                if !filter.matches(&record.path) {
                    debug!("Skipping {}: no pattern match", record.path);
                    continue;
                }

                state.session.stats.files_matched += 1;
                state.progress.inc_length(1);
                self.launch(&mut state.tasks, record, &semaphore, &report_tx);
            }
        }

        drop(report_tx);
        state.wait_for_all().await;
        state.progress.finish_and_clear();

        if let Some(e) = manifest_error {
            return Err(AppError::Manifest(e));
        }

        let mut session = state.session;
        session.finish();
        info!("{}", session.summary());
        Ok(session)
    }

    /// Enumerate and filter without touching the filesystem or downloading
    ///
    /// # Errors
    ///
    /// Returns `AppError::Manifest` if enumeration fails.
    pub async fn list_matches<S: PageSource>(
        enumerator: ManifestEnumerator<S>,
        filter: &PatternFilter,
    ) -> Result<Vec<ArtifactRecord>> {
        let matches: Vec<ArtifactRecord> = enumerator
            .into_stream()
            .try_filter(|record| futures::future::ready(filter.matches(&record.path)))
            .try_collect()
            .await?;
        Ok(matches)
    }

    async fn prepare_directory(&self, artifact_path: &str) -> std::result::Result<(), DownloadError> {
        let destination = resolve_destination(&self.out_root, artifact_path)?;
        ensure_parent_dir(&destination).await
    }

    fn launch(
        &self,
        tasks: &mut JoinSet<()>,
        record: ArtifactRecord,
        semaphore: &Arc<Semaphore>,
        report_tx: &mpsc::Sender<TaskReport>,
    ) {
        let task = DownloadTask::new(record, self.out_root.clone(), Arc::clone(&self.transport));
        let semaphore = Arc::clone(semaphore);
        let report_tx = report_tx.clone();

        debug!("Launching download of {}", task.path());
        tasks.spawn(async move {
            let path = task.path().to_string();
            let report = match semaphore.acquire_owned().await {
                Ok(_permit) => AssertUnwindSafe(task.run())
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| aborted(path, panic_reason(panic.as_ref()))),
                Err(_) => aborted(path, "download slots closed".to_string()),
            };
            // The receiver outlives every task; a send error means the run is over.
            let _ = report_tx.send(report).await;
        });
    }
}

fn aborted(path: String, reason: String) -> TaskReport {
    TaskReport {
        path: path.clone(),
        outcome: Err(DownloadError::Aborted { path, reason }),
    }
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    format!("task panicked: {}", message)
}
