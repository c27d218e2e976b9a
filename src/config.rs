//! Configuration management for the artifact fetcher
//!
//! Required settings (token, build, bucket, patterns, ...) come from the
//! command line or its environment variables. Tuning knobs can also be set
//! in an optional TOML file:
//!
//! ```toml
//! [client]
//! connect_timeout = "10s"
//! cdn_host_pattern = "cloudfront.net"
//!
//! [download]
//! page_size = 100
//! concurrency = 32
//! failure_policy = "keep-going"
//! match_mode = "any"
//! ```
//!
//! Precedence is command line, then file, then built-in defaults.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::app::client::{build_artifacts_url, ClientConfig};
use crate::app::coordinator::{CoordinatorConfig, FailurePolicy};
use crate::app::filter::{MatchMode, PatternFilter};
use crate::cli::FetchArgs;
use crate::constants::{api, default_concurrency, env};
use crate::errors::{ConfigError, ConfigResult};

/// Contents of the optional TOML tuning file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP client settings
    pub client: ClientConfig,
    /// Enumeration and download settings
    pub download: DownloadConfigToml,
}

/// TOML-friendly download configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfigToml {
    /// Records requested per manifest page
    pub page_size: u32,
    /// Downloads in flight; unset means CPUs times four
    pub concurrency: Option<usize>,
    /// Reaction to a failed download
    pub failure_policy: FailurePolicy,
    /// How multiple patterns are applied
    pub match_mode: MatchMode,
}

impl Default for DownloadConfigToml {
    fn default() -> Self {
        Self {
            page_size: api::PAGE_SIZE,
            concurrency: None,
            failure_policy: FailurePolicy::default(),
            match_mode: MatchMode::default(),
        }
    }
}

impl AppConfig {
    /// Load the tuning file, or defaults when no file is given
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if an explicitly given file does not
    /// exist, `ConfigError::Read` if it cannot be read and
    /// `ConfigError::InvalidFormat` if it is not valid TOML.
    pub async fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let Some(path) = path else {
            debug!("No configuration file given, using defaults");
            return Ok(Self::default());
        };

        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let config: AppConfig = toml::from_str(&content)?;
        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }
}

/// Fully resolved settings for one run
#[derive(Clone)]
pub struct Settings {
    /// Bearer token for the API and artifact downloads
    pub token: String,
    /// Endpoint listing the build's artifacts
    pub artifacts_url: Url,
    /// Bucket behind the CDN
    pub bucket: String,
    /// Region of the bucket
    pub region: String,
    /// Configured glob patterns, in order
    pub patterns: Vec<String>,
    /// Output root
    pub out_dir: PathBuf,
    /// HTTP client settings
    pub client: ClientConfig,
    /// Records requested per manifest page
    pub page_size: u32,
    /// Coordinator settings
    pub coordinator: CoordinatorConfig,
    /// How multiple patterns are applied
    pub match_mode: MatchMode,
    /// List matches without downloading
    pub dry_run: bool,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("token", &"<redacted>")
            .field("artifacts_url", &self.artifacts_url.as_str())
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("patterns", &self.patterns)
            .field("out_dir", &self.out_dir)
            .field("client", &self.client)
            .field("page_size", &self.page_size)
            .field("coordinator", &self.coordinator)
            .field("match_mode", &self.match_mode)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl Settings {
    /// Combine command-line arguments with the tuning file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` for an absent or empty required
    /// setting, and any error from [`Settings::validate`].
    pub fn resolve(args: &FetchArgs, file: AppConfig) -> ConfigResult<Self> {
        let token = required(&args.token, "access token", env::ACCESS_TOKEN)?;
        let build_number = required(&args.build_number, "build number", env::BUILD_NUMBER)?;
        let bucket = required(&args.bucket, "storage bucket", env::S3_BUCKET)?;
        let region = required(&args.region, "storage region", env::AWS_REGION)?;
        let pattern_list = required(&args.pattern, "artifact pattern", env::PATTERN)?;
        let out_dir = required(&args.out_dir, "output directory", env::OUTDIR)?;

        let artifacts_url = match present(&args.api_url) {
            Some(url) => Url::parse(url).map_err(|e| ConfigError::InvalidValue {
                field: "api_url".to_string(),
                value: url.to_string(),
                reason: e.to_string(),
            })?,
            None => {
                let organization =
                    required(&args.organization, "organization slug", env::ORGANIZATION_SLUG)?;
                let pipeline = required(&args.pipeline, "pipeline name", env::PIPELINE_NAME)?;
                build_artifacts_url(&organization, &pipeline, &build_number).map_err(|e| {
                    ConfigError::InvalidValue {
                        field: "artifacts_url".to_string(),
                        value: format!("{}/{}/{}", organization, pipeline, build_number),
                        reason: e.to_string(),
                    }
                })?
            }
        };

        let failure_policy = if args.keep_going {
            FailurePolicy::KeepGoing
        } else {
            file.download.failure_policy
        };
        let match_mode = if args.match_all_patterns {
            MatchMode::Any
        } else {
            file.download.match_mode
        };
        let concurrency = args
            .concurrency
            .or(file.download.concurrency)
            .unwrap_or_else(default_concurrency);

        let settings = Self {
            token,
            artifacts_url,
            bucket,
            region,
            patterns: PatternFilter::parse_list(&pattern_list),
            out_dir: PathBuf::from(out_dir),
            client: file.client,
            page_size: file.download.page_size,
            coordinator: CoordinatorConfig::default()
                .with_concurrency(concurrency)
                .with_failure_policy(failure_policy),
            match_mode,
            dry_run: args.dry_run,
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Validate the resolved settings
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for a zero page size or
    /// concurrency, and `ConfigError::InvalidPattern` when no usable pattern
    /// remains or one fails to compile.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "page_size".to_string(),
                value: "0".to_string(),
                reason: "Page size must be at least 1".to_string(),
            });
        }

        self.coordinator
            .validate()
            .map_err(|reason| ConfigError::InvalidValue {
                field: "concurrency".to_string(),
                value: self.coordinator.concurrency.to_string(),
                reason,
            })?;

        self.filter().map(|_| ())
    }

    /// Compile the configured patterns
    pub fn filter(&self) -> ConfigResult<PatternFilter> {
        PatternFilter::new(&self.patterns, self.match_mode)
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn required(value: &Option<String>, field: &str, env_var: &str) -> ConfigResult<String> {
    present(value)
        .map(str::to_string)
        .ok_or_else(|| ConfigError::MissingField {
            field: field.to_string(),
            env: env_var.to_string(),
        })
}
