//! Title metadata for external ids.
//!
//! The resolver only knows an external catalog id (`tt1375666`). A
//! [`MetadataProvider`] turns that into a display title, a release year and,
//! when the catalog has one, a URL slug that often carries the original-language
//! title.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::ResolveError;
use crate::http_client::SourceClient;
use crate::model::{ContentType, TitleInfo};
use crate::source::text::{non_empty, year_prefix};

/// Default Cinemeta-compatible endpoint.
pub const CINEMETA_BASE: &str = "https://v3-cinemeta.strem.io";

const TAG: &str = "cinemeta";

/// Looks up title information for an external id.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Fails with [`ResolveError::MetadataUnavailable`] when the catalog has no
    /// usable name for `id`.
    async fn title_info(
        &self,
        content_type: ContentType,
        id: &str,
    ) -> Result<TitleInfo, ResolveError>;
}

/// Cinemeta `/meta/{type}/{id}.json` lookups.
pub struct CinemetaProvider {
    client: SourceClient,
    base: String,
}

impl CinemetaProvider {
    pub fn new(client: SourceClient, base: impl Into<String>) -> Self {
        Self {
            client,
            base: base.into().trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MetaResponse {
    meta: Option<MetaBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetaBody {
    name: Option<String>,
    release_info: Option<String>,
    slug: Option<String>,
}

impl MetaResponse {
    fn into_title_info(self, id: &str) -> Result<TitleInfo, ResolveError> {
        let meta = self.meta.unwrap_or(MetaBody {
            name: None,
            release_info: None,
            slug: None,
        });
        let Some(name) = meta.name.and_then(non_empty) else {
            return Err(ResolveError::MetadataUnavailable {
                id: id.to_string(),
                reason: "no title in metadata".to_string(),
            });
        };
        Ok(TitleInfo {
            name,
            release_year: meta.release_info.as_deref().and_then(year_prefix),
            slug: meta.slug.and_then(non_empty),
        })
    }
}

#[async_trait]
impl MetadataProvider for CinemetaProvider {
    #[instrument(skip(self), fields(content_type = %content_type))]
    async fn title_info(
        &self,
        content_type: ContentType,
        id: &str,
    ) -> Result<TitleInfo, ResolveError> {
        // Season/episode suffixes are not part of the catalog id.
        let base_id = id.split(':').next().unwrap_or(id);
        let url = format!("{}/meta/{content_type}/{base_id}.json", self.base);

        let response: MetaResponse = self
            .client
            .fetch_json(TAG, &url, &self.base)
            .await
            .map_err(|e| ResolveError::MetadataUnavailable {
                id: base_id.to_string(),
                reason: e.to_string(),
            })?;

        let info = response.into_title_info(base_id)?;
        debug!(name = %info.name, year = ?info.release_year, "title resolved");
        Ok(info)
    }
}

/// Human title hidden in a catalog slug.
///
/// `movie/le-fabuleux-destin-d-amelie-poulain-0211915` becomes
/// `le fabuleux destin d amelie poulain`: last path segment, dashes to
/// spaces, trailing numeric or `tt` id segments dropped.
pub fn slug_title(slug: &str) -> Option<String> {
    let last = slug.rsplit('/').find(|s| !s.is_empty())?;
    let mut words: Vec<&str> = last.split('-').filter(|w| !w.is_empty()).collect();

    while let Some(tail) = words.last().copied() {
        let digits = tail.strip_prefix("tt").unwrap_or(tail);
        if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            words.pop();
        } else {
            break;
        }
    }

    non_empty(words.join(" "))
}
