//! Error types for the artifact fetcher
//!
//! Every stage of the pipeline has its own error enum. All of them are fatal
//! for a run; the coordinator decides how a failure ends the session.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration errors, detected before any network call
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Configuration file could not be read
    #[error("Failed to read configuration file: {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Missing required configuration field
    #[error("Missing required setting: {field} (env {env})")]
    MissingField { field: String, env: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// A glob pattern failed to compile
    #[error("Invalid artifact pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Errors while enumerating the artifact manifest
#[derive(Error, Debug)]
pub enum ManifestError {
    /// HTTP request for a page failed
    #[error("Artifact listing request failed for page {page}")]
    Http {
        page: u32,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered a page request with a non-success status
    #[error("Artifact listing returned HTTP {status} for page {page}")]
    ServerError { page: u32, status: u16 },

    /// Page body is not an array of artifact records
    #[error("Failed to decode artifact page {page}")]
    Decode {
        page: u32,
        #[source]
        source: serde_json::Error,
    },

    /// Artifacts endpoint URL is malformed
    #[error("Invalid artifacts URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },
}

/// Object storage errors raised by the fallback transport
#[derive(Error, Debug)]
pub enum StorageError {
    /// Building the storage client failed
    #[error("Failed to configure object storage for bucket {bucket}")]
    Configure {
        bucket: String,
        #[source]
        source: object_store::Error,
    },

    /// Object key could not be turned into a storage path
    #[error("Invalid object key: {key}")]
    InvalidKey {
        key: String,
        #[source]
        source: object_store::path::Error,
    },

    /// The get-object call failed
    #[error("Failed to get object {key}")]
    Get {
        key: String,
        #[source]
        source: object_store::Error,
    },

    /// Streaming the object into the destination failed
    #[error("Failed to stream object {key}")]
    Stream {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// Per-artifact download errors
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Artifact path escapes the output root or is otherwise unusable
    #[error("Refusing unsafe artifact path: {path} ({reason})")]
    UnsafePath { path: String, reason: String },

    /// Destination directory could not be created
    #[error("Failed to create directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Destination file could not be created or written
    #[error("Failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// HTTP request error
    #[error("HTTP request failed for {url}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Streaming the response body failed
    #[error("Failed to stream response body from {url}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },

    /// Server returned error status
    #[error("Server error: HTTP {status} for {url}")]
    ServerError { url: String, status: u16 },

    /// A redirect was refused but carried no usable location
    #[error("Redirect from {url} has no usable Location header")]
    InvalidRedirect { url: String },

    /// The object storage fallback failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The task was aborted or panicked before reporting
    #[error("Download task for {path} did not finish: {reason}")]
    Aborted { path: String, reason: String },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Manifest enumeration error
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Download error for a single artifact
    #[error("Download of {path} failed: {source}")]
    Download {
        path: String,
        #[source]
        source: DownloadError,
    },

    /// Storage client setup error
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// One or more artifacts failed while the run kept going
    ///
    /// `total` counts matched artifacts plus listed records rejected before
    /// a download could start.
    #[error("{failed} of {total} artifacts failed")]
    DownloadsFailed { failed: usize, total: usize },

    /// HTTP client construction error
    #[error("Failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),
}

impl AppError {
    /// Wrap a per-artifact failure with the artifact path
    pub fn download(path: impl Into<String>, source: DownloadError) -> Self {
        Self::Download {
            path: path.into(),
            source,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::Manifest(_) => "manifest",
            AppError::Download { source, .. } => match source {
                DownloadError::UnsafePath { .. }
                | DownloadError::CreateDir { .. }
                | DownloadError::Write { .. } => "filesystem",
                _ => "transport",
            },
            AppError::Storage(_) => "storage",
            AppError::DownloadsFailed { .. } => "transport",
            AppError::HttpClient(_) => "config",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Manifest result type alias
pub type ManifestResult<T> = std::result::Result<T, ManifestError>;

/// Download result type alias
pub type DownloadResult<T> = std::result::Result<T, DownloadError>;

/// Storage result type alias
pub type StorageResult<T> = std::result::Result<T, StorageError>;
