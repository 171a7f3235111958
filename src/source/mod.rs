//! Content sources.
//!
//! A [`Source`] knows how to search, browse and extract streams from one
//! upstream site. Sources never see each other; cross-source reconciliation
//! happens in [`crate::resolve`].
//!
//! # Architecture
//!
//! - [`Source`]: async trait every site implements
//! - [`SourceRegistry`]: sources in priority order, with per-call timeouts and
//!   failure isolation
//!
//! Every registry call is best-effort: a source that errors or hangs yields an
//! empty result and a warning, never an error.

pub mod frenchstream;
pub mod purstream;
pub mod xalaflix;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::Result;
use crate::http_client::SourceClient;
use crate::id::CompositeId;
use crate::model::{pick_episode, ContentType, Item, StreamCandidate};

pub use frenchstream::FrenchStreamSource;
pub use purstream::PurstreamSource;
pub use xalaflix::XalaflixSource;

/// Items per catalog page, fixed by every source.
pub const PAGE_SIZE: u32 = 20;

/// Tags of all built-in sources, in default priority order.
pub const BUILTIN_SOURCES: &[&str] = &[purstream::TAG, xalaflix::TAG, frenchstream::TAG];

/// One upstream content site.
#[async_trait]
pub trait Source: Send + Sync {
    /// Short lowercase tag, first segment of every id this source emits.
    fn name(&self) -> &'static str;

    /// Human readable name for catalogs and stream labels.
    fn display_name(&self) -> &'static str;

    /// Free-text search.
    async fn search(&self, query: &str) -> Result<Vec<Item>>;

    /// Browse page `page` (1-indexed, [`PAGE_SIZE`] items).
    async fn catalog(&self, content_type: ContentType, page: u32) -> Result<Vec<Item>>;

    /// Full details. Series carry their episode index, sorted.
    async fn details(&self, id: &CompositeId) -> Result<Option<Item>>;

    /// Locate one episode of a series and return its composite id.
    ///
    /// The default walks the episode index from [`Source::details`],
    /// accepting an episode numbered one off when there is no exact match.
    async fn resolve_episode(
        &self,
        series_id: &CompositeId,
        season: u32,
        episode: u32,
    ) -> Result<Option<String>> {
        let Some(series) = self.details(series_id).await? else {
            return Ok(None);
        };
        Ok(pick_episode(&series.videos, season, episode).map(|e| e.id.clone()))
    }

    /// Playable streams for a movie or episode id.
    async fn streams(&self, id: &CompositeId) -> Result<Vec<StreamCandidate>>;
}

/// Build a built-in source by tag.
pub fn builtin(tag: &str, client: &SourceClient) -> Option<Arc<dyn Source>> {
    match tag {
        purstream::TAG => Some(Arc::new(PurstreamSource::new(client.clone()))),
        xalaflix::TAG => Some(Arc::new(XalaflixSource::new(client.clone()))),
        frenchstream::TAG => Some(Arc::new(FrenchStreamSource::new(client.clone()))),
        _ => None,
    }
}

/// Sources in priority order.
///
/// All methods swallow source errors and timeouts, logging them, so one
/// broken site never affects the others.
#[derive(Clone)]
pub struct SourceRegistry {
    sources: Vec<Arc<dyn Source>>,
    timeout: Duration,
}

impl SourceRegistry {
    #[must_use]
    pub fn new(sources: Vec<Arc<dyn Source>>, timeout: Duration) -> Self {
        Self { sources, timeout }
    }

    /// Build the registry from configured tags. Unknown tags are skipped with
    /// a warning.
    pub fn from_tags<S: AsRef<str>>(tags: &[S], client: &SourceClient, timeout: Duration) -> Self {
        let sources = tags
            .iter()
            .filter_map(|tag| {
                let tag = tag.as_ref();
                let source = builtin(tag, client);
                if source.is_none() {
                    warn!("Unknown source '{}' in configuration, skipping", tag);
                }
                source
            })
            .collect();
        Self::new(sources, timeout)
    }

    /// All sources, highest priority first.
    #[must_use]
    pub fn sources(&self) -> &[Arc<dyn Source>] {
        &self.sources
    }

    /// Source owning `tag`.
    #[must_use]
    pub fn get(&self, tag: &str) -> Option<&Arc<dyn Source>> {
        self.sources.iter().find(|s| s.name() == tag)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn guarded<T, F>(&self, source: &'static str, op: &'static str, fut: F) -> Option<T>
    where
        F: Future<Output = Result<T>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!(source, op, error = %e, "source call failed");
                None
            }
            Err(_) => {
                warn!(source, op, timeout = ?self.timeout, "source call timed out");
                None
            }
        }
    }

    pub async fn search(&self, source: &dyn Source, query: &str) -> Vec<Item> {
        let items = self
            .guarded(source.name(), "search", source.search(query))
            .await
            .unwrap_or_default();
        debug!(source = source.name(), query, results = items.len(), "search done");
        items
    }

    /// Search every source concurrently. Results come back in priority order.
    pub async fn search_all(&self, query: &str) -> Vec<(Arc<dyn Source>, Vec<Item>)> {
        let searches = self.sources.iter().map(|source| {
            let source = Arc::clone(source);
            async move {
                let items = self.search(source.as_ref(), query).await;
                (source, items)
            }
        });
        futures::future::join_all(searches).await
    }

    pub async fn catalog(&self, source: &dyn Source, content_type: ContentType, page: u32) -> Vec<Item> {
        self.guarded(source.name(), "catalog", source.catalog(content_type, page))
            .await
            .unwrap_or_default()
    }

    pub async fn details(&self, id: &CompositeId) -> Option<Item> {
        let source = self.get(&id.source)?;
        self.guarded(source.name(), "details", source.details(id))
            .await
            .flatten()
    }

    pub async fn resolve_episode(
        &self,
        source: &dyn Source,
        series_id: &CompositeId,
        season: u32,
        episode: u32,
    ) -> Option<String> {
        self.guarded(
            source.name(),
            "resolve_episode",
            source.resolve_episode(series_id, season, episode),
        )
        .await
        .flatten()
    }

    pub async fn streams(&self, id: &CompositeId) -> Vec<StreamCandidate> {
        let Some(source) = self.get(&id.source) else {
            debug!(id = %id, "no source owns id");
            return Vec::new();
        };
        self.guarded(source.name(), "streams", source.streams(id))
            .await
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.sources.iter().map(|s| s.name()).collect();
        f.debug_struct("SourceRegistry")
            .field("sources", &names)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Shared helpers for page parsers.
pub(crate) mod text {
    use once_cell::sync::Lazy;
    use regex::Regex;

    static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

    /// Collapse runs of whitespace and trim.
    pub fn squash(raw: &str) -> String {
        WHITESPACE.replace_all(raw, " ").trim().to_string()
    }

    /// Last non-empty `/` segment of a URL or path.
    pub fn last_segment(link: &str) -> Option<&str> {
        link.split(['?', '#'])
            .next()
            .unwrap_or(link)
            .split('/')
            .rfind(|s| !s.is_empty())
    }

    /// First four characters when they look like a year.
    pub fn year_prefix(date: &str) -> Option<String> {
        let year = date.get(..4)?;
        year.chars()
            .all(|c| c.is_ascii_digit())
            .then(|| year.to_string())
    }

    /// `Some(s)` unless `s` is empty after trimming.
    pub fn non_empty(s: impl AsRef<str>) -> Option<String> {
        let s = s.as_ref().trim();
        (!s.is_empty()).then(|| s.to_string())
    }
}
