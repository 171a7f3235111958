//! Stream relay for upstream URLs that only play with the right headers.
//!
//! The client's `Range` header is forwarded so seeking works. Status, a small
//! set of entity headers and the body are relayed as they arrive. When the
//! client goes away axum drops the body stream, and with it the upstream
//! response, which closes the upstream connection.

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};
use http::{header, HeaderMap, HeaderName, StatusCode};
use serde::Deserialize;
use tracing::{debug, error, info, instrument};
use url::Url;

use super::AppState;
use crate::error::ProxyError;
use crate::fingerprint::proxy_headers;

/// Upstream response headers passed through to the client.
pub const FORWARDED_HEADERS: [HeaderName; 5] = [
    header::CONTENT_TYPE,
    header::CONTENT_LENGTH,
    header::CONTENT_RANGE,
    header::ACCEPT_RANGES,
    header::CONTENT_ENCODING,
];

#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    url: Option<String>,
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match &self {
            ProxyError::MissingUrl | ProxyError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
            ProxyError::UpstreamStatus(status) => *status,
            ProxyError::Upstream(e) => {
                error!(error = %e, "upstream request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = match &self {
            ProxyError::Upstream(_) => "Internal Server Error".to_string(),
            other => other.to_string(),
        };
        (status, body).into_response()
    }
}

fn upstream_url(raw: Option<&str>) -> Result<Url, ProxyError> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty()).ok_or(ProxyError::MissingUrl)?;
    let url = Url::parse(raw).map_err(|e| ProxyError::InvalidUrl(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ProxyError::InvalidUrl(format!("unsupported scheme {other}"))),
    }
}

#[instrument(skip_all, fields(upstream = tracing::field::Empty))]
pub async fn proxy(
    State(state): State<AppState>,
    Query(query): Query<ProxyQuery>,
    headers: HeaderMap,
) -> Result<Response, ProxyError> {
    let url = upstream_url(query.url.as_deref())?;
    tracing::Span::current().record("upstream", url.as_str());

    let mut request = state.proxy_client.get(url.clone()).headers(proxy_headers());
    if let Some(range) = headers.get(header::RANGE) {
        debug!(range = ?range, "forwarding range");
        request = request.header(header::RANGE, range.clone());
    }

    let upstream = request.send().await?;
    let status = upstream.status();
    if !(status.is_success() || status.is_redirection()) {
        info!(%status, "upstream refused");
        return Err(ProxyError::UpstreamStatus(status));
    }

    let mut relayed_headers = HeaderMap::new();
    for name in &FORWARDED_HEADERS {
        if let Some(value) = upstream.headers().get(name) {
            relayed_headers.insert(name.clone(), value.clone());
        }
    }

    debug!(%status, "relaying");
    let body = Body::from_stream(RelayStream::new(upstream.bytes_stream().boxed(), url));
    Ok((status, relayed_headers, body).into_response())
}

/// Upstream body stream that logs how the relay ended.
pub struct RelayStream {
    inner: BoxStream<'static, reqwest::Result<Bytes>>,
    url: Url,
    relayed: u64,
    finished: bool,
}

impl RelayStream {
    pub fn new(inner: BoxStream<'static, reqwest::Result<Bytes>>, url: Url) -> Self {
        Self {
            inner,
            url,
            relayed: 0,
            finished: false,
        }
    }

    /// Bytes handed to the client so far.
    #[must_use]
    pub fn relayed(&self) -> u64 {
        self.relayed
    }
}

impl Stream for RelayStream {
    type Item = reqwest::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let next = self.inner.poll_next_unpin(cx);
        match &next {
            Poll::Ready(Some(Ok(chunk))) => self.relayed += chunk.len() as u64,
            Poll::Ready(Some(Err(e))) => {
                error!(url = %self.url, relayed = self.relayed, error = %e, "upstream body failed");
                self.finished = true;
            }
            Poll::Ready(None) => self.finished = true,
            Poll::Pending => {}
        }
        next
    }
}

impl Drop for RelayStream {
    fn drop(&mut self) {
        if !self.finished {
            debug!(url = %self.url, relayed = self.relayed, "client went away, upstream closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_required() {
        assert!(matches!(upstream_url(None), Err(ProxyError::MissingUrl)));
        assert!(matches!(upstream_url(Some("  ")), Err(ProxyError::MissingUrl)));
        assert!(matches!(upstream_url(Some("not a url")), Err(ProxyError::InvalidUrl(_))));
        assert!(matches!(upstream_url(Some("file:///etc/passwd")), Err(ProxyError::InvalidUrl(_))));
        assert!(upstream_url(Some("https://cdn.example/v.mp4")).is_ok());
    }

    #[test]
    fn errors_map_to_status() {
        assert_eq!(ProxyError::MissingUrl.into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ProxyError::UpstreamStatus(StatusCode::FORBIDDEN).into_response().status(),
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn relay_counts_bytes() {
        let chunks: Vec<reqwest::Result<Bytes>> =
            vec![Ok(Bytes::from_static(b"abc")), Ok(Bytes::from_static(b"de"))];
        let url = Url::parse("https://cdn.example/v.mp4").unwrap();
        let mut relay = RelayStream::new(futures::stream::iter(chunks).boxed(), url);
        while relay.next().await.is_some() {}
        assert_eq!(relay.relayed(), 5);
        assert!(relay.finished);
    }
}
