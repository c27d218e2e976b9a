//! Application constants for the artifact fetcher
//!
//! Constants are grouped by functional domain.

use std::time::Duration;

/// Environment variable names read by the CLI
pub mod env {
    /// Agent access token used as the bearer token
    pub const ACCESS_TOKEN: &str = "BUILDKITE_AGENT_ACCESS_TOKEN";

    /// Build number whose artifacts are fetched
    pub const BUILD_NUMBER: &str = "BUILDKITE_BUILD_NUMBER";

    /// Organization slug used to build the artifacts URL
    pub const ORGANIZATION_SLUG: &str = "BUILDKITE_ORGANIZATION_SLUG";

    /// Pipeline name used to build the artifacts URL
    pub const PIPELINE_NAME: &str = "BUILDKITE_PIPELINE_NAME";

    /// Bucket holding artifacts served through the CDN
    pub const S3_BUCKET: &str = "BUILDKITE_PLUGIN_PARALLEL_ARTIFACT_S3_BUCKET";

    /// Region of the artifact bucket
    pub const AWS_REGION: &str = "BUILDKITE_PLUGIN_PARALLEL_ARTIFACT_AWS_REGION";

    /// Semicolon-separated glob patterns
    pub const PATTERN: &str = "BUILDKITE_PLUGIN_PARALLEL_ARTIFACT_PATTERN";

    /// Output directory root
    pub const OUTDIR: &str = "BUILDKITE_PLUGIN_PARALLEL_ARTIFACT_OUTDIR";

    /// Full artifacts endpoint, overriding the URL built from org/pipeline/build
    pub const API_URL: &str = "PARALLEL_ARTIFACT_API_URL";
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = concat!("parallel-artifact/", env!("CARGO_PKG_VERSION"));

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Maximum number of redirects to follow on the direct transport
    pub const MAX_REDIRECTS: usize = 10;

    /// Host substring identifying the CDN in front of artifact storage
    pub const CDN_HOST_PATTERN: &str = "cloudfront.net";
}

/// Remote API endpoints and pagination
pub mod api {
    /// REST API base URL
    pub const BASE_URL: &str = "https://api.buildkite.com/v2";

    /// Records requested per manifest page
    pub const PAGE_SIZE: u32 = 100;

    /// Cursor of the first manifest page
    pub const FIRST_PAGE: u32 = 1;
}

/// Worker and concurrency configuration
pub mod workers {
    /// Fallback download concurrency when CPU count is unavailable
    pub const DEFAULT_CONCURRENCY: usize = 8;

    /// Downloads allowed per available CPU
    pub const CONCURRENCY_PER_CPU: usize = 4;

    /// Capacity of the task report channel
    pub const REPORT_CHANNEL_CAPACITY: usize = 256;
}

// Re-export commonly used constants for convenience
pub use api::PAGE_SIZE;
pub use http::{CDN_HOST_PATTERN, USER_AGENT};
pub use workers::DEFAULT_CONCURRENCY;

/// Default download concurrency: available CPUs times a small multiplier
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() * workers::CONCURRENCY_PER_CPU)
        .unwrap_or(workers::DEFAULT_CONCURRENCY)
}
