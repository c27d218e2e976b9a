//! Transport selection for artifact downloads
//!
//! Every artifact is first requested with an authenticated GET. The shared
//! HTTP client refuses to follow redirects into the storage CDN (see
//! [`crate::app::client::ClientConfig::redirect_policy`]); when such a redirect
//! comes back, the object key is taken from the `Location` path and the bytes
//! are read straight from the bucket instead.

use std::sync::Arc;

use futures::StreamExt;
use reqwest::header::LOCATION;
use reqwest::{Client, Response};
use tokio::io::AsyncWrite;
use tokio_util::io::StreamReader;
use tracing::{debug, info};
use url::Url;

use crate::app::models::{DownloadOutcome, Transport};
use crate::errors::{DownloadError, DownloadResult};

pub mod storage;

pub use storage::{ObjectStorage, S3Storage};

/// Whether `url` points at a host matching the CDN pattern
///
/// An empty pattern never matches.
pub fn is_cdn_host(url: &Url, pattern: &str) -> bool {
    !pattern.is_empty() && url.host_str().is_some_and(|host| host.contains(pattern))
}

/// Result of the authenticated GET
enum Primary {
    /// The artifact is served by this response's body
    Body(Response),
    /// The server redirected to the CDN at this location
    CdnRedirect(Url),
}

/// Picks the transport for each artifact and streams its bytes
pub struct TransportSelector {
    http: Client,
    token: String,
    storage: Arc<dyn ObjectStorage>,
    cdn_host_pattern: String,
}

impl TransportSelector {
    /// Create a selector
    ///
    /// `http` must be built with the CDN redirect guard; the same
    /// `cdn_host_pattern` is used to recognize the refused redirect.
    pub fn new(
        http: Client,
        token: impl Into<String>,
        storage: Arc<dyn ObjectStorage>,
        cdn_host_pattern: impl Into<String>,
    ) -> Self {
        Self {
            http,
            token: token.into(),
            storage,
            cdn_host_pattern: cdn_host_pattern.into(),
        }
    }

    /// Download `download_url` into `writer`
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if the GET fails, answers with an error status
    /// or an unusable redirect, or the storage fallback fails.
    pub async fn fetch_to<W>(&self, download_url: &str, writer: &mut W) -> DownloadResult<DownloadOutcome>
    where
        W: AsyncWrite + Unpin + Send,
    {
        match self.request(download_url).await? {
            Primary::Body(response) => {
                let bytes_written = stream_body(download_url, response, writer).await?;
                debug!("Fetched {} bytes directly from {}", bytes_written, download_url);
                Ok(DownloadOutcome {
                    bytes_written,
                    via: Transport::Direct,
                })
            }
            Primary::CdnRedirect(location) => {
                let key = location.path();
                info!(
                    "Redirected to CDN; reading {} from bucket {}",
                    key,
                    self.storage.bucket()
                );
                let bytes_written = self.storage.get_object(key, writer).await?;
                Ok(DownloadOutcome {
                    bytes_written,
                    via: Transport::ObjectStorage,
                })
            }
        }
    }

    async fn request(&self, download_url: &str) -> DownloadResult<Primary> {
        let response = self
            .http
            .get(download_url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|source| DownloadError::Http {
                url: download_url.to_string(),
                source,
            })?;

        let status = response.status();

        if status.is_redirection() {
            // Only CDN redirects are left unfollowed by the client.
            return match redirect_location(&response) {
                Some(location) if is_cdn_host(&location, &self.cdn_host_pattern) => {
                    Ok(Primary::CdnRedirect(location))
                }
                _ => Err(DownloadError::InvalidRedirect {
                    url: download_url.to_string(),
                }),
            };
        }

        if !status.is_success() {
            return Err(DownloadError::ServerError {
                url: download_url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(Primary::Body(response))
    }
}

/// Resolve the `Location` header against the response URL
fn redirect_location(response: &Response) -> Option<Url> {
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    response.url().join(location).ok()
}

async fn stream_body<W>(url: &str, response: Response, writer: &mut W) -> DownloadResult<u64>
where
    W: AsyncWrite + Unpin + Send,
{
    let stream = response
        .bytes_stream()
        .map(|chunk| chunk.map_err(std::io::Error::other));
    let mut reader = StreamReader::new(stream);

    tokio::io::copy(&mut reader, writer)
        .await
        .map_err(|source| DownloadError::Body {
            url: url.to_string(),
            source,
        })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use httptest::{matchers::*, responders::*, Expectation, Server};
    use tokio::io::AsyncWriteExt;

    use crate::app::client::ClientConfig;
    use crate::errors::{StorageError, StorageResult};

    /// Storage fake recording every requested key
    #[derive(Default)]
    pub(crate) struct RecordingStorage {
        pub(crate) keys: Mutex<Vec<String>>,
        pub(crate) body: Vec<u8>,
        pub(crate) fail: bool,
    }

    impl RecordingStorage {
        pub(crate) fn with_body(body: &[u8]) -> Self {
            Self {
                body: body.to_vec(),
                ..Default::default()
            }
        }

        pub(crate) fn keys(&self) -> Vec<String> {
            self.keys.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ObjectStorage for RecordingStorage {
        async fn get_object(
            &self,
            key: &str,
            writer: &mut (dyn AsyncWrite + Unpin + Send),
        ) -> StorageResult<u64> {
            self.keys.lock().unwrap().push(key.to_string());
            if self.fail {
                return Err(StorageError::Stream {
                    key: key.to_string(),
                    source: std::io::Error::other("simulated storage failure"),
                });
            }
            writer
                .write_all(&self.body)
                .await
                .map_err(|source| StorageError::Stream {
                    key: key.to_string(),
                    source,
                })?;
            Ok(self.body.len() as u64)
        }

        fn bucket(&self) -> &str {
            "test-bucket"
        }
    }

    fn selector(storage: Arc<RecordingStorage>) -> TransportSelector {
        selector_with(ClientConfig::default(), storage)
    }

    fn selector_with(config: ClientConfig, storage: Arc<RecordingStorage>) -> TransportSelector {
        TransportSelector::new(
            config.build_http_client().unwrap(),
            "secret-token",
            storage,
            config.cdn_host_pattern,
        )
    }

    #[test]
    fn test_is_cdn_host() {
        let cdn = Url::parse("https://d1234.cloudfront.net/key/path").unwrap();
        let api = Url::parse("https://api.buildkite.com/v2/x").unwrap();
        assert!(is_cdn_host(&cdn, "cloudfront.net"));
        assert!(!is_cdn_host(&api, "cloudfront.net"));
        assert!(!is_cdn_host(&cdn, ""));
    }

    #[tokio::test]
    async fn test_direct_body_skips_storage() {
        let body: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("GET", "/artifacts/1/download"),
                request::headers(contains(("authorization", "Bearer secret-token"))),
            ])
            .respond_with(status_code(200).body(body.clone())),
        );

        let storage = Arc::new(RecordingStorage::default());
        let mut out = Vec::new();
        let outcome = selector(storage.clone())
            .fetch_to(&server.url_str("/artifacts/1/download"), &mut out)
            .await
            .unwrap();

        assert_eq!(outcome.via, Transport::Direct);
        assert_eq!(outcome.bytes_written, body.len() as u64);
        assert_eq!(out, body);
        assert!(storage.keys().is_empty());
    }

    #[tokio::test]
    async fn test_cdn_redirect_reads_from_storage() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/artifacts/2/download"))
                .respond_with(
                    status_code(302).append_header("Location", "https://x.cloudfront.net/key/path"),
                ),
        );

        let storage = Arc::new(RecordingStorage::with_body(b"from the bucket"));
        let mut out = Vec::new();
        let outcome = selector(storage.clone())
            .fetch_to(&server.url_str("/artifacts/2/download"), &mut out)
            .await
            .unwrap();

        assert_eq!(outcome.via, Transport::ObjectStorage);
        assert_eq!(storage.keys(), vec!["/key/path".to_string()]);
        assert_eq!(out, b"from the bucket");
    }

    #[tokio::test]
    async fn test_non_cdn_redirect_is_followed() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/artifacts/3/download"))
                .respond_with(status_code(302).append_header("Location", "/blobs/3")),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/blobs/3"))
                .respond_with(status_code(200).body("followed")),
        );

        let storage = Arc::new(RecordingStorage::default());
        let mut out = Vec::new();
        let outcome = selector(storage.clone())
            .fetch_to(&server.url_str("/artifacts/3/download"), &mut out)
            .await
            .unwrap();

        assert_eq!(outcome.via, Transport::Direct);
        assert_eq!(out, b"followed");
        assert!(storage.keys().is_empty());
    }

    #[tokio::test]
    async fn test_error_status_is_fatal() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/artifacts/4/download"))
                .respond_with(status_code(404)),
        );

        let storage = Arc::new(RecordingStorage::default());
        let mut out = Vec::new();
        let err = selector(storage.clone())
            .fetch_to(&server.url_str("/artifacts/4/download"), &mut out)
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::ServerError { status: 404, .. }));
        assert!(storage.keys().is_empty());
    }

    #[tokio::test]
    async fn test_storage_failure_is_fatal() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/artifacts/5/download"))
                .respond_with(
                    status_code(307).append_header("Location", "https://y.cloudfront.net/b/5.bin"),
                ),
        );

        let storage = Arc::new(RecordingStorage {
            fail: true,
            ..Default::default()
        });
        let mut out = Vec::new();
        let err = selector(storage.clone())
            .fetch_to(&server.url_str("/artifacts/5/download"), &mut out)
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::Storage(_)));
        assert_eq!(storage.keys(), vec!["/b/5.bin".to_string()]);
    }

    /// A followed hop may still end at the CDN; its location is resolved
    /// against the intermediate URL
    #[tokio::test]
    async fn test_cdn_redirect_after_followed_hop() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("GET", "/artifacts/6/download"))
                .respond_with(status_code(302).append_header("Location", "/hop/6")),
        );
        server.expect(
            Expectation::matching(request::method_path("GET", "/hop/6")).respond_with(
                status_code(302).append_header("Location", "https://z.cloudfront.net/c/6.bin"),
            ),
        );

        let storage = Arc::new(RecordingStorage::with_body(b"six"));
        let mut out = Vec::new();
        let outcome = selector(storage.clone())
            .fetch_to(&server.url_str("/artifacts/6/download"), &mut out)
            .await
            .unwrap();

        assert_eq!(outcome.via, Transport::ObjectStorage);
        assert_eq!(storage.keys(), vec!["/c/6.bin".to_string()]);
        assert_eq!(out, b"six");
    }

    #[tokio::test]
    async fn test_redirect_limit_is_an_error() {
        let server = Server::run();
        for hop in 1..=3 {
            server.expect(
                Expectation::matching(request::method_path("GET", format!("/hop/{}", hop)))
                    .respond_with(
                        status_code(302).append_header("Location", format!("/hop/{}", hop + 1)),
                    ),
            );
        }
        server.expect(
            Expectation::matching(request::method_path("GET", "/hop/4"))
                .times(0)
                .respond_with(status_code(200)),
        );

        let config = ClientConfig {
            max_redirects: 2,
            ..ClientConfig::default()
        };
        let storage = Arc::new(RecordingStorage::default());
        let mut out = Vec::new();
        let err = selector_with(config, storage.clone())
            .fetch_to(&server.url_str("/hop/1"), &mut out)
            .await
            .unwrap_err();

        match err {
            DownloadError::Http { source, .. } => assert!(source.is_redirect(), "{:?}", source),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(out.is_empty());
        assert!(storage.keys().is_empty());
    }
}
