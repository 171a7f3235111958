//! Cross-source resolution of external ids into streams.
//!
//! ```text
//! tt1375666[:S:E]
//!   -> title info (metadata provider)
//!   -> title variants, searched one at a time across every source
//!   -> first-word fallback for short titles
//!   -> per-source episode lookup (series)
//!   -> streams, concatenated in source priority order
//! ```
//!
//! Only the metadata lookup can end a resolution early. Everything else
//! degrades to "this source found nothing".

mod stages;

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use crate::error::ResolveError;
use crate::id::{CompositeId, ExternalId};
use crate::metadata::MetadataProvider;
use crate::model::{ContentType, EpisodeRef, MatchQuery, StreamCandidate};
use crate::source::SourceRegistry;

pub use stages::{match_tier, pick_match, simplified_query, title_variants, Matched};

/// Resolves external ids against every registered source.
#[derive(Clone)]
pub struct Resolver {
    registry: SourceRegistry,
    metadata: Arc<dyn MetadataProvider>,
}

impl Resolver {
    pub fn new(registry: SourceRegistry, metadata: Arc<dyn MetadataProvider>) -> Self {
        Self { registry, metadata }
    }

    #[must_use]
    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Streams for `id`. An empty list means nothing was found.
    #[instrument(skip(self, id), fields(id = %id.id))]
    pub async fn resolve(&self, content_type: ContentType, id: &ExternalId) -> Vec<StreamCandidate> {
        let matches = match self.find_matches(content_type, id).await {
            Ok(matches) => matches,
            Err(e) => {
                warn!(error = %e, "resolution stopped");
                return Vec::new();
            }
        };
        if matches.is_empty() {
            info!("no source matched");
            return Vec::new();
        }

        let episode = match content_type {
            ContentType::Series => id.episode,
            ContentType::Movie => None,
        };
        let lookups = matches.iter().map(|m| self.streams_for(m, episode));
        let streams: Vec<StreamCandidate> = join_all(lookups).await.into_iter().flatten().collect();

        info!(sources = matches.len(), streams = streams.len(), "resolved");
        streams
    }

    /// Per-source matches for the title behind `id`, in priority order.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::MetadataUnavailable`] when the title cannot be
    /// looked up.
    pub async fn find_matches(
        &self,
        content_type: ContentType,
        id: &ExternalId,
    ) -> Result<Vec<Matched>, ResolveError> {
        let info = tokio::time::timeout(
            self.registry.timeout(),
            self.metadata.title_info(content_type, &id.id),
        )
        .await
        .map_err(|_| ResolveError::MetadataUnavailable {
            id: id.id.clone(),
            reason: "metadata lookup timed out".to_string(),
        })??;

        let query = MatchQuery {
            title: info.name.clone(),
            content_type,
            year: info.release_year.clone(),
        };

        if let Some(matches) = self.first_matching_tier(&query, &title_variants(&info)).await {
            return Ok(matches);
        }

        let Some(word) = simplified_query(&query.title) else {
            debug!(title = %query.title, "no fallback for this title");
            return Ok(Vec::new());
        };
        debug!(query = %word, "trying first-word fallback");
        // The word only widens the search; candidates are still judged
        // against the full title.
        let results = self.registry.search_all(&word).await;
        Ok(match_tier(results, &query, &query.title))
    }

    /// Search each variant across all sources until one yields a match.
    async fn first_matching_tier(&self, query: &MatchQuery, variants: &[String]) -> Option<Vec<Matched>> {
        for variant in variants {
            let results = self.registry.search_all(variant).await;
            let matched = match_tier(results, query, variant);
            if !matched.is_empty() {
                debug!(variant = %variant, matches = matched.len(), "variant matched");
                return Some(matched);
            }
        }
        None
    }

    async fn streams_for(&self, matched: &Matched, episode: Option<(u32, u32)>) -> Vec<StreamCandidate> {
        let source = matched.source.as_ref();
        let item_id = match matched.item.id.parse::<CompositeId>() {
            Ok(id) => id,
            Err(e) => {
                warn!(source = source.name(), error = %e, "matched item has a bad id");
                return Vec::new();
            }
        };

        let target = match episode {
            None => item_id,
            Some((season, number)) => {
                let mut wanted = EpisodeRef::new(matched.item.id.clone(), season, number);
                wanted.episode_id = self
                    .registry
                    .resolve_episode(source, &item_id, season, number)
                    .await;
                let Some(episode_id) = wanted.episode_id.as_deref() else {
                    debug!(
                        source = source.name(),
                        series = %wanted.series_id,
                        season,
                        episode = number,
                        "episode not found"
                    );
                    return Vec::new();
                };
                match episode_id.parse::<CompositeId>() {
                    Ok(id) => id,
                    Err(e) => {
                        warn!(source = source.name(), error = %e, "bad episode id");
                        return Vec::new();
                    }
                }
            }
        };

        self.registry.streams(&target).await
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
