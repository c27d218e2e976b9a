//! Command-line argument parsing
//!
//! Every required setting can be given as a flag or through the environment
//! variable the CI agent exports. Required values are optional at the clap
//! level so that missing ones are reported by
//! [`crate::config::Settings::resolve`] before any network call.

use std::path::PathBuf;

use clap::{Args, Parser};

use crate::constants::env;

/// Download a build's artifacts in parallel
#[derive(Parser, Debug)]
#[command(
    name = "fetch_artifacts",
    version,
    about = "Download the artifacts of a CI build in parallel",
    long_about = "Lists the artifacts of a build through the paginated artifacts API, keeps the ones \
matching a glob pattern and downloads them concurrently. Artifacts served through the storage CDN \
are read directly from the bucket."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// What to fetch and how
    #[command(flatten)]
    pub fetch: FetchArgs,
}

/// Logging, output and configuration options
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,

    /// TOML file with client and download tuning
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Never show the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

/// Arguments selecting the build, the artifacts and the destination
#[derive(Args, Debug, Clone, Default)]
pub struct FetchArgs {
    /// Bearer token for the artifacts API
    #[arg(long, env = env::ACCESS_TOKEN, hide_env_values = true)]
    pub token: Option<String>,

    /// Build number whose artifacts are fetched
    #[arg(long = "build", env = env::BUILD_NUMBER)]
    pub build_number: Option<String>,

    /// Organization slug
    #[arg(long, env = env::ORGANIZATION_SLUG)]
    pub organization: Option<String>,

    /// Pipeline name
    #[arg(long, env = env::PIPELINE_NAME)]
    pub pipeline: Option<String>,

    /// Full artifacts endpoint; replaces organization, pipeline and build
    #[arg(long, env = env::API_URL)]
    pub api_url: Option<String>,

    /// Bucket holding artifacts served through the CDN
    #[arg(long, env = env::S3_BUCKET)]
    pub bucket: Option<String>,

    /// Region of the bucket
    #[arg(long, env = env::AWS_REGION)]
    pub region: Option<String>,

    /// Semicolon-separated glob patterns; only the first is used unless
    /// --match-all-patterns is given
    #[arg(long, env = env::PATTERN)]
    pub pattern: Option<String>,

    /// Directory artifacts are written under
    #[arg(long, env = env::OUTDIR, value_name = "DIR")]
    pub out_dir: Option<String>,

    /// Maximum downloads in flight [default: CPUs x 4]
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Finish every download and report all failures instead of stopping at the first
    #[arg(long)]
    pub keep_going: bool,

    /// Download artifacts matching any configured pattern
    #[arg(long)]
    pub match_all_patterns: bool,

    /// List the matching artifacts without creating directories or downloading
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    pub fn log_level(&self) -> tracing::Level {
        if self.global.quiet {
            tracing::Level::ERROR
        } else if self.global.very_verbose {
            tracing::Level::DEBUG
        } else if self.global.verbose {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        }
    }

    /// Whether the progress bar may be shown
    pub fn show_progress(&self) -> bool {
        !self.global.quiet && !self.global.no_progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "fetch_artifacts",
            "--token",
            "t",
            "--build",
            "7",
            "--pattern",
            "*.bin",
            "--concurrency",
            "5",
            "--keep-going",
            "--match-all-patterns",
            "--dry-run",
            "-v",
        ])
        .unwrap();

        assert_eq!(cli.fetch.token.as_deref(), Some("t"));
        assert_eq!(cli.fetch.build_number.as_deref(), Some("7"));
        assert_eq!(cli.fetch.concurrency, Some(5));
        assert!(cli.fetch.keep_going);
        assert!(cli.fetch.match_all_patterns);
        assert!(cli.fetch.dry_run);
        assert_eq!(cli.log_level(), tracing::Level::INFO);
    }

    #[test]
    fn test_log_levels() {
        let quiet = Cli::try_parse_from(["fetch_artifacts", "-q", "--very-verbose"]).unwrap();
        assert_eq!(quiet.log_level(), tracing::Level::ERROR);
        assert!(!quiet.show_progress());

        let debug = Cli::try_parse_from(["fetch_artifacts", "--very-verbose"]).unwrap();
        assert_eq!(debug.log_level(), tracing::Level::DEBUG);

        let no_bar = Cli::try_parse_from(["fetch_artifacts", "--no-progress"]).unwrap();
        assert!(!no_bar.show_progress());
    }

    #[test]
    fn test_invalid_concurrency_is_rejected() {
        assert!(Cli::try_parse_from(["fetch_artifacts", "--concurrency", "many"]).is_err());
    }
}
