//! HTTP client configuration and building logic
//!
//! One `reqwest::Client` serves both the artifact listing and the direct
//! artifact downloads. Its redirect policy refuses to follow redirects into the
//! storage CDN so the transport selector can fall back to object storage.

use std::time::Duration;

use reqwest::redirect::Policy;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::transport::is_cdn_host;
use crate::constants::http;

/// Configuration for the shared HTTP client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Connect timeout; there is no overall request timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// User agent sent with every request
    pub user_agent: String,
    /// Host substring identifying the storage CDN
    pub cdn_host_pattern: String,
    /// Maximum redirects followed on non-CDN hops
    pub max_redirects: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: http::CONNECT_TIMEOUT,
            user_agent: http::USER_AGENT.to_string(),
            cdn_host_pattern: http::CDN_HOST_PATTERN.to_string(),
            max_redirects: http::MAX_REDIRECTS,
        }
    }
}

impl ClientConfig {
    /// Builds the HTTP client with the CDN redirect guard installed
    pub fn build_http_client(&self) -> reqwest::Result<Client> {
        Client::builder()
            .connect_timeout(self.connect_timeout)
            .user_agent(self.user_agent.as_str())
            .redirect(self.redirect_policy())
            .build()
    }

    /// Redirect policy that stops at the CDN and caps other redirect chains
    ///
    /// Stopping hands the 3xx response, `Location` header included, back to
    /// the caller instead of fetching from the CDN.
    pub fn redirect_policy(&self) -> Policy {
        let pattern = self.cdn_host_pattern.clone();
        let max_redirects = self.max_redirects;

        Policy::custom(move |attempt| {
            if is_cdn_host(attempt.url(), &pattern) {
                debug!("Refusing redirect to CDN host: {}", attempt.url());
                attempt.stop()
            } else if attempt.previous().len() > max_redirects {
                attempt.error(format!("too many redirects (limit {})", max_redirects))
            } else {
                attempt.follow()
            }
        })
    }
}
