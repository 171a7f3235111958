//! Error types.
//!
//! Source failures never leave the source boundary: the registry and the
//! resolver log them and carry on with an empty result. Only a failed
//! metadata lookup ends a resolution early, and even then callers get an
//! empty stream list.

use thiserror::Error;

use crate::id::IdError;

/// Network or parse failure at one source.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{source_tag} returned status {status}")]
    Status {
        source_tag: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("unexpected response shape from {source_tag}: {detail}")]
    Shape {
        source_tag: &'static str,
        detail: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Id(#[from] IdError),
}

impl SourceError {
    pub(crate) fn shape(source_tag: &'static str, detail: impl Into<String>) -> Self {
        SourceError::Shape {
            source_tag,
            detail: detail.into(),
        }
    }
}

/// Why a resolution stopped before searching any source.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("metadata unavailable for {id}: {reason}")]
    MetadataUnavailable { id: String, reason: String },
}

/// Failure while relaying a stream to a client.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("No URL provided")]
    MissingUrl,

    #[error("invalid upstream URL: {0}")]
    InvalidUrl(String),

    #[error("upstream returned status {0}")]
    UpstreamStatus(reqwest::StatusCode),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),
}

pub type Result<T, E = SourceError> = std::result::Result<T, E>;
