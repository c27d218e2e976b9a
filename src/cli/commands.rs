//! Command handler for the fetch run
//!
//! Wires configuration, the API client, object storage and the coordinator
//! together, and turns the session into console output and an exit status.

use std::sync::Arc;

use indicatif::ProgressBar;
use tracing::{debug, warn};

use crate::app::client::ArtifactApiClient;
use crate::app::coordinator::{Coordinator, SessionResult};
use crate::app::manifest::ManifestEnumerator;
use crate::app::models::ArtifactRecord;
use crate::app::transport::{ObjectStorage, S3Storage, TransportSelector};
use crate::cli::progress::download_bar;
use crate::cli::{FetchArgs, GlobalArgs};
use crate::config::{AppConfig, Settings};
use crate::errors::{AppError, Result};

/// Handle a fetch run
///
/// Loads the tuning file, resolves settings and either lists the matching
/// artifacts (`--dry-run`) or downloads them.
pub async fn handle_fetch(global: &GlobalArgs, args: FetchArgs) -> Result<()> {
    let file = AppConfig::load(global.config.as_deref()).await?;
    let settings = Settings::resolve(&args, file)?;
    let show_output = !global.quiet;
    if show_output {
        eprintln!("{}", api_banner(&settings));
    }

    if settings.dry_run {
        let matches = list_matching(&settings).await?;
        for record in &matches {
            println!("{}", record.path);
        }
        if show_output {
            eprintln!("{} artifacts match", matches.len());
        }
        return Ok(());
    }

    let storage = Arc::new(S3Storage::new(&settings.bucket, &settings.region)?);
    let progress = download_bar(show_output && !global.no_progress);

    let session = execute_fetch(&settings, storage, progress).await?;

    if show_output {
        println!("{}", session.summary());
    }
    for failure in &session.failures {
        eprintln!("  failed: {}: {}", failure.path, failure.error);
    }

    session.into_result().map(|_| ())
}

/// Startup line naming the artifacts endpoint of this run
pub fn api_banner(settings: &Settings) -> String {
    format!("ARTIFACT API: {}", settings.artifacts_url)
}

/// Enumerate the manifest and return the matching records
///
/// # Errors
///
/// Returns configuration errors and manifest errors.
pub async fn list_matching(settings: &Settings) -> Result<Vec<ArtifactRecord>> {
    let filter = settings.filter()?;
    let http = settings
        .client
        .build_http_client()
        .map_err(AppError::HttpClient)?;
    let api = ArtifactApiClient::new(
        http,
        settings.artifacts_url.clone(),
        settings.token.clone(),
        settings.page_size,
    );

    debug!("Listing artifacts from {}", api.artifacts_url());
    Coordinator::list_matches(ManifestEnumerator::new(api), &filter).await
}

/// Download every matching artifact using the given object storage fallback
///
/// # Errors
///
/// Returns configuration and manifest errors. Download failures are carried
/// in the returned [`SessionResult`].
pub async fn execute_fetch(
    settings: &Settings,
    storage: Arc<dyn ObjectStorage>,
    progress: ProgressBar,
) -> Result<SessionResult> {
    let filter = settings.filter()?;
    let ignored: Vec<_> = filter.ignored_patterns().collect();
    if !ignored.is_empty() {
        warn!(
            "Only the first pattern is used; ignoring {:?} (pass --match-all-patterns to use them)",
            ignored
        );
    }

    let http = settings
        .client
        .build_http_client()
        .map_err(AppError::HttpClient)?;

    let api = ArtifactApiClient::new(
        http.clone(),
        settings.artifacts_url.clone(),
        settings.token.clone(),
        settings.page_size,
    );
    debug!("Fetching artifacts from {}", api.artifacts_url());

    let transport = Arc::new(TransportSelector::new(
        http,
        settings.token.clone(),
        storage,
        settings.client.cdn_host_pattern.clone(),
    ));

    Coordinator::new(settings.coordinator.clone(), settings.out_dir.clone(), transport)
        .with_progress(progress)
        .run(ManifestEnumerator::new(api), &filter)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_banner_names_endpoint() {
        let args = FetchArgs {
            token: Some("t".to_string()),
            build_number: Some("42".to_string()),
            organization: Some("acme".to_string()),
            pipeline: Some("web".to_string()),
            bucket: Some("b".to_string()),
            region: Some("eu-west-1".to_string()),
            pattern: Some("*.bin".to_string()),
            out_dir: Some("out".to_string()),
            ..Default::default()
        };
        let settings = Settings::resolve(&args, AppConfig::default()).unwrap();
        assert_eq!(
            api_banner(&settings),
            "ARTIFACT API: https://api.buildkite.com/v2/organizations/acme/pipelines/web/builds/42/artifacts"
        );
    }
}
