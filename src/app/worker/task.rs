//! One artifact download, from destination checks to flushed file

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::path::{ensure_parent_dir, resolve_destination};
use crate::app::models::{ArtifactRecord, DownloadOutcome, TaskReport};
use crate::app::transport::TransportSelector;
use crate::errors::{DownloadError, DownloadResult};

/// Download of a single matched artifact
pub struct DownloadTask {
    record: ArtifactRecord,
    out_root: PathBuf,
    transport: Arc<TransportSelector>,
}

impl DownloadTask {
    pub fn new(record: ArtifactRecord, out_root: impl Into<PathBuf>, transport: Arc<TransportSelector>) -> Self {
        Self {
            record,
            out_root: out_root.into(),
            transport,
        }
    }

    /// Artifact path this task writes
    pub fn path(&self) -> &str {
        &self.record.path
    }

    /// Run the task to a terminal state
    ///
    /// Failures are returned inside the report, never logged here.
    pub async fn run(self) -> TaskReport {
        let outcome = self.download().await;
        TaskReport {
            path: self.record.path,
            outcome,
        }
    }

    async fn download(&self) -> DownloadResult<DownloadOutcome> {
        let destination = resolve_destination(&self.out_root, &self.record.path)?;
        ensure_parent_dir(&destination).await?;

        let mut file = File::create(&destination)
            .await
            .map_err(|source| write_error(&destination, source))?;

        let outcome = self
            .transport
            .fetch_to(&self.record.download_url, &mut file)
            .await?;

        file.flush()
            .await
            .map_err(|source| write_error(&destination, source))?;

        debug!(
            "Wrote {} ({} bytes via {})",
            destination.display(),
            outcome.bytes_written,
            outcome.via
        );
        Ok(outcome)
    }
}

fn write_error(path: &Path, source: std::io::Error) -> DownloadError {
    DownloadError::Write {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{matchers::*, responders::*, Expectation, Server};
    use tempfile::TempDir;

    use crate::app::client::ClientConfig;
    use crate::app::models::Transport;
    use crate::app::transport::tests::RecordingStorage;

    fn transport() -> Arc<TransportSelector> {
        let config = ClientConfig::default();
        Arc::new(TransportSelector::new(
            config.build_http_client().unwrap(),
            "token",
            Arc::new(RecordingStorage::default()),
            config.cdn_host_pattern,
        ))
    }

    fn record_for(server: &Server, path: &str) -> ArtifactRecord {
        ArtifactRecord {
            download_url: server.url_str(&format!("/download/{}", path)),
            upload_destination: String::new(),
            path: path.to_string(),
            filesize: 0,
            sha1sum: String::new(),
        }
    }

    #[tokio::test]
    async fn test_task_writes_nested_file() {
        let temp = TempDir::new().unwrap();
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/download/deep/dir/out.bin"))
                .respond_with(status_code(200).body("payload")),
        );

        let task = DownloadTask::new(record_for(&server, "deep/dir/out.bin"), temp.path(), transport());
        assert_eq!(task.path(), "deep/dir/out.bin");

        let report = task.run().await;
        let outcome = report.outcome.unwrap();
        assert_eq!(outcome.via, Transport::Direct);
        assert_eq!(outcome.bytes_written, 7);
        assert_eq!(
            std::fs::read(temp.path().join("deep/dir/out.bin")).unwrap(),
            b"payload"
        );
    }

    #[tokio::test]
    async fn test_task_truncates_existing_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("out.txt"), "a much longer previous body").unwrap();

        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/download/out.txt"))
                .respond_with(status_code(200).body("new")),
        );

        let report = DownloadTask::new(record_for(&server, "out.txt"), temp.path(), transport())
            .run()
            .await;
        assert!(report.is_success());
        assert_eq!(std::fs::read_to_string(temp.path().join("out.txt")).unwrap(), "new");
    }

    #[tokio::test]
    async fn test_directory_failure_makes_no_request() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("blocker"), b"x").unwrap();

        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/download/blocker/out.bin"))
                .times(0)
                .respond_with(status_code(200)),
        );

        let report = DownloadTask::new(record_for(&server, "blocker/out.bin"), temp.path(), transport())
            .run()
            .await;
        assert!(matches!(report.outcome, Err(DownloadError::CreateDir { .. })));
    }

    #[tokio::test]
    async fn test_unsafe_path_makes_no_request() {
        let temp = TempDir::new().unwrap();
        let server = Server::run();
        server.expect(
            Expectation::matching(any())
                .times(0)
                .respond_with(status_code(200)),
        );

        let report = DownloadTask::new(record_for(&server, "../escape.bin"), temp.path(), transport())
            .run()
            .await;
        assert_eq!(report.path, "../escape.bin");
        assert!(matches!(report.outcome, Err(DownloadError::UnsafePath { .. })));
        assert!(!temp.path().parent().unwrap().join("escape.bin").exists());
    }

    #[tokio::test]
    async fn test_server_error_is_reported() {
        let temp = TempDir::new().unwrap();
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/download/missing.bin"))
                .respond_with(status_code(500)),
        );

        let report = DownloadTask::new(record_for(&server, "missing.bin"), temp.path(), transport())
            .run()
            .await;
        assert!(matches!(
            report.outcome,
            Err(DownloadError::ServerError { status: 500, .. })
        ));
    }
}
