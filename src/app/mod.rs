//! Core application logic for the artifact fetcher
//!
//! - [`client`] lists manifest pages from the artifacts API
//! - [`manifest`] walks those pages as a cursor state machine
//! - [`filter`] selects artifact paths by glob
//! - [`transport`] downloads one artifact, falling back to object storage
//! - [`worker`] turns a matched record into a file on disk
//! - [`coordinator`] fans the downloads out and aggregates their reports
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use parallel_artifact::app::{
//!     ArtifactApiClient, ClientConfig, Coordinator, CoordinatorConfig, ManifestEnumerator,
//!     MatchMode, PatternFilter, S3Storage, TransportSelector,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::default();
//! let http = config.build_http_client()?;
//! let url = "https://api.buildkite.com/v2/organizations/acme/pipelines/web/builds/42/artifacts";
//!
//! let api = ArtifactApiClient::new(http.clone(), url.parse()?, "token", 100);
//! let storage = Arc::new(S3Storage::new("artifacts-bucket", "us-east-1")?);
//! let transport = Arc::new(TransportSelector::new(http, "token", storage, config.cdn_host_pattern));
//!
//! let filter = PatternFilter::new(["build/*.bin"], MatchMode::FirstOnly)?;
//! let session = Coordinator::new(CoordinatorConfig::default(), "out", transport)
//!     .run(ManifestEnumerator::new(api), &filter)
//!     .await?;
//! println!("{}", session.summary());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod coordinator;
pub mod filter;
pub mod manifest;
pub mod models;
pub mod transport;
pub mod worker;

// Re-export main public API
pub use client::{build_artifacts_url, ArtifactApiClient, ClientConfig};
pub use coordinator::{
    Coordinator, CoordinatorConfig, DownloadStats, FailedArtifact, FailurePolicy, SessionResult,
};
pub use filter::{MatchMode, PatternFilter};
pub use manifest::{collect_all_records, ManifestEnumerator, ManifestStats, PageSource};
pub use models::{
    ArtifactRecord, DownloadOutcome, ManifestPage, PageCursor, TaskReport, Transport,
};
pub use transport::{is_cdn_host, ObjectStorage, S3Storage, TransportSelector};
pub use worker::{resolve_destination, DownloadTask};
