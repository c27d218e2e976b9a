//! Parallel artifact fetcher library
//!
//! Enumerates a build's artifact manifest page by page, filters artifact
//! paths with a glob pattern and downloads the matches concurrently. Artifacts
//! that the API redirects to the storage CDN are read straight from the bucket.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};

#[cfg(test)]
mod tests {
    use super::*;
    use constants::*;

    #[test]
    fn test_constants_accessible() {
        assert_eq!(env::ACCESS_TOKEN, "BUILDKITE_AGENT_ACCESS_TOKEN");
        assert_eq!(CDN_HOST_PATTERN, "cloudfront.net");
        assert!(DEFAULT_CONCURRENCY >= 1);
    }

    #[test]
    fn test_error_types() {
        let app_error = AppError::from(errors::ConfigError::InvalidPattern {
            pattern: "[".to_string(),
            reason: "unclosed class".to_string(),
        });
        assert_eq!(app_error.category(), "config");
    }
}
