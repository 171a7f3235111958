//! Shared HTTP client for source traffic.
//!
//! Features:
//! - Connection pooling with keep-alive, shared across all sources
//! - Brotli, Gzip compression (auto-negotiated)
//! - Cookie store (some sources hand out session cookies on first visit)
//! - Fixed browser identity (see [`crate::fingerprint`])

use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::error::SourceError;
use crate::fingerprint::{chrome_profile, site_headers, AcceptKind};

/// HTTP client used by every source.
#[derive(Debug, Clone)]
pub struct SourceClient {
    client: Client,
}

impl SourceClient {
    /// Create a client whose requests give up after `request_timeout`.
    pub fn new(request_timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .use_rustls_tls()
            .brotli(true)
            .gzip(true)
            .deflate(true)
            .default_headers(chrome_profile().to_headers())
            .connect_timeout(Duration::from_secs(10))
            .timeout(request_timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .cookie_store(true)
            .build()?;

        Ok(Self { client })
    }

    /// Wrap an existing reqwest client (tests point this at local servers).
    #[must_use]
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    #[instrument(skip(self, site), fields(url = %url))]
    async fn get(
        &self,
        source: &'static str,
        url: &str,
        site: &str,
        accept: AcceptKind,
    ) -> Result<Response, SourceError> {
        debug!("fetching");
        let response = self
            .client
            .get(url)
            .headers(site_headers(site, accept))
            .send()
            .await?;

        let status = response.status();
        debug!(%status, "response received");
        if !status.is_success() {
            return Err(SourceError::Status {
                source_tag: source,
                status,
            });
        }

        Ok(response)
    }

    /// Fetch an HTML page as text.
    pub async fn fetch_html(
        &self,
        source: &'static str,
        url: &str,
        site: &str,
    ) -> Result<String, SourceError> {
        let response = self.get(source, url, site, AcceptKind::Html).await?;
        Ok(response.text().await?)
    }

    /// Fetch and decode a JSON document.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        source: &'static str,
        url: &str,
        site: &str,
    ) -> Result<T, SourceError> {
        let response = self.get(source, url, site, AcceptKind::Json).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Client used by the stream proxy.
///
/// No total request timeout: a movie can take hours to relay. Only the
/// connect phase is bounded. Compression is off so byte ranges map 1:1 to
/// what the upstream sends.
pub fn proxy_client() -> reqwest::Result<Client> {
    Client::builder()
        .pool_max_idle_per_host(10)
        .tcp_nodelay(true)
        .use_rustls_tls()
        .gzip(false)
        .brotli(false)
        .deflate(false)
        .connect_timeout(Duration::from_secs(10))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
}
