//! Data models for artifact manifests and download results

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::api;
use crate::errors::DownloadError;

/// One artifact record from the build's manifest
///
/// `path` comes from the server and is untrusted: it must go through
/// [`crate::app::worker::resolve_destination`] before touching the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Authenticated URL the artifact is fetched from
    pub download_url: String,
    /// Where the artifact was uploaded to; informational
    #[serde(default)]
    pub upload_destination: String,
    /// Slash-separated path relative to the build root
    pub path: String,
    /// Size in bytes; informational
    #[serde(default)]
    pub filesize: u64,
    /// Content hash as reported by the server; not verified
    #[serde(default)]
    pub sha1sum: String,
}

/// 1-based page index used as the pagination cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageCursor(u32);

impl PageCursor {
    /// Cursor of the first page
    pub fn first() -> Self {
        Self(api::FIRST_PAGE)
    }

    /// Cursor for a server-supplied page number; zero is not a page
    pub fn new(page: u32) -> Option<Self> {
        (page >= 1).then_some(Self(page))
    }

    /// Page number carried by this cursor
    pub fn page(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One decoded page of the manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestPage {
    /// Records on this page
    pub records: Vec<ArtifactRecord>,
    /// Cursor of the following page, `None` on the last page
    pub next: Option<PageCursor>,
}

/// Which transport delivered an artifact's bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transport {
    /// Authenticated GET against the artifact's download URL
    Direct,
    /// Direct read from the object storage bucket
    ObjectStorage,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Direct => write!(f, "direct"),
            Transport::ObjectStorage => write!(f, "object-storage"),
        }
    }
}

/// Successful result of one artifact download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOutcome {
    /// Bytes written to the destination file
    pub bytes_written: u64,
    /// Transport that served the bytes
    pub via: Transport,
}

/// Tagged result a download task sends back to the coordinator
#[derive(Debug)]
pub struct TaskReport {
    /// Artifact path as listed in the manifest
    pub path: String,
    /// Terminal state of the task
    pub outcome: Result<DownloadOutcome, DownloadError>,
}

impl TaskReport {
    /// Whether the task finished successfully
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_decodes_api_shape() {
        let json = r#"[{
            "download_url": "https://api.example.com/artifacts/1/download",
            "upload_destination": "s3://bucket/prefix",
            "path": "build/out.bin",
            "filesize": 1024,
            "sha1sum": "da39a3ee5e6b4b0d3255bfef95601890afd80709",
            "state": "finished"
        }]"#;

        let records: Vec<ArtifactRecord> = serde_json::from_str(json).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, "build/out.bin");
        assert_eq!(records[0].filesize, 1024);
    }

    #[test]
    fn test_record_optional_fields_default() {
        let json = r#"{"download_url": "https://x/1", "path": "a.txt"}"#;
        let record: ArtifactRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.filesize, 0);
        assert!(record.sha1sum.is_empty());
        assert!(record.upload_destination.is_empty());
    }

    #[test]
    fn test_page_cursor() {
        assert_eq!(PageCursor::first().page(), 1);
        assert_eq!(PageCursor::new(0), None);
        assert_eq!(PageCursor::new(7).map(PageCursor::page), Some(7));
        assert_eq!(PageCursor::first().to_string(), "1");
    }
}
