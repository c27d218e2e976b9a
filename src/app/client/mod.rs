//! HTTP client for the artifacts API
//!
//! The module is organized into specialized components:
//! - `config`: HTTP client configuration, including the CDN redirect guard
//! - `pagination`: next-page cursor extraction from `Link` headers
//!
//! [`ArtifactApiClient`] is the manifest page fetcher: one authenticated GET
//! per page, decoded into [`ArtifactRecord`]s plus the next cursor.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::app::manifest::PageSource;
use crate::app::models::{ArtifactRecord, ManifestPage, PageCursor};
use crate::constants::api;
use crate::errors::{ManifestError, ManifestResult};

pub mod config;
pub mod pagination;

pub use config::ClientConfig;
pub use pagination::{next_page, parse_next_link};

/// Build the artifacts endpoint for one build of a pipeline
pub fn build_artifacts_url(
    organization: &str,
    pipeline: &str,
    build_number: &str,
) -> ManifestResult<Url> {
    let url = format!(
        "{}/organizations/{}/pipelines/{}/builds/{}/artifacts",
        api::BASE_URL,
        organization,
        pipeline,
        build_number
    );
    Url::parse(&url).map_err(|e| ManifestError::InvalidUrl {
        url,
        error: e.to_string(),
    })
}

/// Authenticated client for the paginated artifacts listing
#[derive(Debug, Clone)]
pub struct ArtifactApiClient {
    http: Client,
    artifacts_url: Url,
    token: String,
    page_size: u32,
}

impl ArtifactApiClient {
    /// Create a client for the given artifacts endpoint
    ///
    /// # Arguments
    ///
    /// * `http` - Shared HTTP client
    /// * `artifacts_url` - Endpoint listing the build's artifacts
    /// * `token` - Bearer token sent with every request
    /// * `page_size` - Records requested per page (`per_page`)
    pub fn new(http: Client, artifacts_url: Url, token: impl Into<String>, page_size: u32) -> Self {
        Self {
            http,
            artifacts_url,
            token: token.into(),
            page_size,
        }
    }

    /// Endpoint this client lists artifacts from
    pub fn artifacts_url(&self) -> &Url {
        &self.artifacts_url
    }

    /// Fetch and decode one manifest page
    ///
    /// # Errors
    ///
    /// Returns `ManifestError` if the request fails, the server answers with a
    /// non-success status, or the body is not an array of artifact records.
    pub async fn get_page(&self, cursor: PageCursor) -> ManifestResult<ManifestPage> {
        let page = cursor.page();
        debug!("Fetching artifact page {} from {}", page, self.artifacts_url);

        let response = self
            .http
            .get(self.artifacts_url.clone())
            .query(&[
                ("per_page", self.page_size.to_string()),
                ("page", page.to_string()),
            ])
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|source| ManifestError::Http { page, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ManifestError::ServerError {
                page,
                status: status.as_u16(),
            });
        }

        let next = pagination::next_page(response.headers());

        let body = response
            .bytes()
            .await
            .map_err(|source| ManifestError::Http { page, source })?;
        let records: Vec<ArtifactRecord> =
            serde_json::from_slice(&body).map_err(|source| ManifestError::Decode { page, source })?;

        debug!(
            "Page {} listed {} artifacts (next: {:?})",
            page,
            records.len(),
            next.map(PageCursor::page)
        );

        Ok(ManifestPage { records, next })
    }
}

#[async_trait]
impl PageSource for ArtifactApiClient {
    async fn fetch_page(&self, cursor: PageCursor) -> ManifestResult<ManifestPage> {
        self.get_page(cursor).await
    }
}
