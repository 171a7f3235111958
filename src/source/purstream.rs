//! Purstream JSON API source.
//!
//! Every response is wrapped in `{"type": "success", "data": {"items": ...}}`;
//! anything else is treated as a failed call.
//!
//! Ids: `purstream:{movie|series}:{mediaId}` and
//! `purstream:episode:{mediaId}:{season}:{episode}`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::debug;

use super::text::{non_empty, year_prefix};
use super::{Source, PAGE_SIZE};
use crate::error::{Result, SourceError};
use crate::http_client::SourceClient;
use crate::id::{CompositeId, IdError, IdKind};
use crate::model::{pick_episode, sort_episodes, ContentType, Episode, Item, StreamCandidate};

pub const TAG: &str = "purstream";

const API_BASE: &str = "https://api.purstream.me/api/v1";
const SITE_BASE: &str = "https://purstream.me";

pub struct PurstreamSource {
    client: SourceClient,
    api_base: String,
}

/// What a purstream id points at.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Media { kind: ContentType, media_id: String },
    Episode { media_id: String, season: u32, episode: u32 },
}

impl Target {
    fn parse(id: &CompositeId) -> Result<Self, IdError> {
        let bad = || IdError::Payload {
            source_tag: TAG,
            payload: id.payload.clone(),
        };

        match id.kind {
            IdKind::Movie | IdKind::Series => {
                if id.payload.contains(':') {
                    return Err(bad());
                }
                let kind = if id.kind == IdKind::Movie {
                    ContentType::Movie
                } else {
                    ContentType::Series
                };
                Ok(Target::Media {
                    kind,
                    media_id: id.payload.clone(),
                })
            }
            IdKind::Episode => {
                let parts: Vec<&str> = id.segments().collect();
                let [media_id, season, episode] = parts.as_slice() else {
                    return Err(bad());
                };
                Ok(Target::Episode {
                    media_id: (*media_id).to_string(),
                    season: season.parse().map_err(|_| bad())?,
                    episode: episode.parse().map_err(|_| bad())?,
                })
            }
        }
    }

    fn to_id(&self) -> CompositeId {
        match self {
            Target::Media { kind, media_id } => {
                CompositeId::new(TAG, IdKind::from(*kind), media_id.clone())
            }
            Target::Episode {
                media_id,
                season,
                episode,
            } => CompositeId::new(TAG, IdKind::Episode, format!("{media_id}:{season}:{episode}")),
        }
    }
}

impl PurstreamSource {
    pub fn new(client: SourceClient) -> Self {
        Self::with_base(client, API_BASE)
    }

    /// Point the source at another API root (tests use a local server).
    pub fn with_base(client: SourceClient, api_base: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into(),
        }
    }

    async fn call<T: for<'de> Deserialize<'de>>(&self, path: &str, what: &str) -> Result<T> {
        let url = format!("{}{path}", self.api_base);
        let envelope: Envelope<T> = self.client.fetch_json(TAG, &url, SITE_BASE).await?;
        envelope.into_items(what)
    }

    async fn fetch_season(&self, media_id: &str, season: u32) -> Result<Vec<PsEpisode>> {
        let season: PsSeason = self
            .call(&format!("/media/{media_id}/season/{season}"), "season")
            .await?;
        Ok(season.episodes)
    }
}

#[async_trait]
impl Source for PurstreamSource {
    fn name(&self) -> &'static str {
        TAG
    }

    fn display_name(&self) -> &'static str {
        "Purstream"
    }

    async fn search(&self, query: &str) -> Result<Vec<Item>> {
        let path = format!("/search-bar/search/{}", urlencoding::encode(query));
        let found: PsSearch = self.call(&path, "search").await?;
        let list = found
            .movies
            .ok_or_else(|| SourceError::shape(TAG, "search: missing movies list"))?;
        Ok(list.items.into_iter().map(PsMedia::into_search_item).collect())
    }

    async fn catalog(&self, content_type: ContentType, page: u32) -> Result<Vec<Item>> {
        let api_type = match content_type {
            ContentType::Movie => "movie",
            ContentType::Series => "tv",
        };
        let path = format!(
            "/catalog/movies?page={page}&sortBy=best-rated&types={api_type}&categoriesIds=*&franchisesIds=*&perPage={PAGE_SIZE}"
        );
        let page: PsPage = self.call(&path, "catalog").await?;
        Ok(page
            .data
            .into_iter()
            .map(|m| m.into_catalog_item(content_type))
            .collect())
    }

    async fn details(&self, id: &CompositeId) -> Result<Option<Item>> {
        let Target::Media { kind, media_id } = Target::parse(id)? else {
            return Ok(None);
        };
        let sheet: PsSheet = self.call(&format!("/media/{media_id}/sheet"), "sheet").await?;

        let season_count = sheet.seasons.unwrap_or(0);
        let mut item = sheet.into_item(id.to_string(), kind);

        if kind == ContentType::Series && season_count > 0 {
            let fetches = (1..=season_count).map(|season| {
                let media_id = media_id.as_str();
                async move {
                    match self.fetch_season(media_id, season).await {
                        Ok(episodes) => season_episodes(media_id, season, episodes),
                        Err(e) => {
                            debug!(media_id, season, error = %e, "season fetch failed");
                            Vec::new()
                        }
                    }
                }
            });
            let mut videos: Vec<Episode> = futures::future::join_all(fetches)
                .await
                .into_iter()
                .flatten()
                .collect();
            sort_episodes(&mut videos);
            item.videos = videos;
        }

        Ok(Some(item))
    }

    /// Only the requested season is fetched; the API is structured enough
    /// that the full sheet is not needed.
    async fn resolve_episode(
        &self,
        series_id: &CompositeId,
        season: u32,
        episode: u32,
    ) -> Result<Option<String>> {
        let Target::Media { media_id, .. } = Target::parse(series_id)? else {
            return Ok(None);
        };

        let episodes = season_episodes(&media_id, season, self.fetch_season(&media_id, season).await?);
        let found = pick_episode(&episodes, season, episode);
        match found {
            Some(ep) if ep.episode != episode => {
                debug!(wanted = episode, got = ep.episode, "using neighbouring episode");
            }
            None => debug!(season, episode, "episode not found"),
            _ => {}
        }
        Ok(found.map(|e| e.id.clone()))
    }

    async fn streams(&self, id: &CompositeId) -> Result<Vec<StreamCandidate>> {
        let (path, media_id) = match Target::parse(id)? {
            Target::Media {
                kind: ContentType::Movie,
                media_id,
            } => (format!("/stream/{media_id}"), media_id),
            Target::Episode {
                media_id,
                season,
                episode,
            } => (
                format!("/stream/{media_id}/episode?season={season}&episode={episode}"),
                media_id,
            ),
            Target::Media { .. } => return Ok(Vec::new()),
        };

        let found: PsStreams = self.call(&path, "stream").await?;
        Ok(found
            .sources
            .into_iter()
            .map(|s| StreamCandidate {
                url: s.stream_url,
                label: format!(
                    "Purstream {} ({})",
                    s.source_name.as_deref().unwrap_or("Source"),
                    s.format.as_deref().unwrap_or("mp4")
                ),
                directly_playable: false,
                binge_group: Some(format!("{TAG}-{media_id}")),
            })
            .collect())
    }
}

fn season_episodes(media_id: &str, season: u32, episodes: Vec<PsEpisode>) -> Vec<Episode> {
    episodes
        .into_iter()
        .map(|ep| {
            let id = Target::Episode {
                media_id: media_id.to_string(),
                season,
                episode: ep.episode,
            }
            .to_id()
            .to_string();
            let title = ep
                .name
                .or(ep.formatted_name)
                .unwrap_or_else(|| format!("S{season}E{}", ep.episode));
            Episode {
                id,
                title,
                season,
                episode: ep.episode,
                released: ep.air_date.as_deref().and_then(parse_air_date),
                thumbnail: ep.poster.and_then(non_empty),
                overview: ep.overview.and_then(non_empty),
            }
        })
        .collect()
}

fn parse_air_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
}

// Serde structures for Purstream API responses

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(rename = "type")]
    status: String,
    data: Option<EnvelopeData<T>>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeData<T> {
    items: Option<T>,
}

impl<T> Envelope<T> {
    fn into_items(self, what: &str) -> Result<T> {
        if self.status != "success" {
            return Err(SourceError::shape(TAG, format!("{what}: status '{}'", self.status)));
        }
        self.data
            .and_then(|d| d.items)
            .ok_or_else(|| SourceError::shape(TAG, format!("{what}: missing items")))
    }
}

/// Media ids are numbers in most payloads and strings in a few.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PsId {
    Number(u64),
    Text(String),
}

impl std::fmt::Display for PsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PsId::Number(n) => write!(f, "{n}"),
            PsId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PsSearch {
    movies: Option<PsList>,
}

#[derive(Debug, Deserialize)]
struct PsList {
    #[serde(default)]
    items: Vec<PsMedia>,
}

#[derive(Debug, Deserialize)]
struct PsPage {
    #[serde(default)]
    data: Vec<PsMedia>,
}

#[derive(Debug, Deserialize)]
struct PsMedia {
    id: PsId,
    title: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    large_poster_path: Option<String>,
    wallpaper_poster_path: Option<String>,
    small_poster_path: Option<String>,
    release_date: Option<String>,
}

impl PsMedia {
    fn into_search_item(self) -> Item {
        let kind = if self.kind.as_deref() == Some("tv") {
            ContentType::Series
        } else {
            ContentType::Movie
        };
        let mut item = Item::new(
            CompositeId::new(TAG, kind.into(), self.id.to_string()).to_string(),
            kind,
            self.title,
        );
        item.poster = self.large_poster_path.and_then(non_empty);
        item.release_year = self.release_date.as_deref().and_then(year_prefix);
        item
    }

    fn into_catalog_item(self, kind: ContentType) -> Item {
        let mut item = Item::new(
            CompositeId::new(TAG, kind.into(), self.id.to_string()).to_string(),
            kind,
            self.title,
        );
        item.poster = self.large_poster_path.and_then(non_empty);
        item.background = self
            .wallpaper_poster_path
            .and_then(non_empty)
            .or_else(|| self.small_poster_path.and_then(non_empty));
        item.release_year = self.release_date.as_deref().and_then(year_prefix);
        item
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PsSheet {
    title: String,
    overview: Option<String>,
    release_date: Option<String>,
    posters: Option<PsPosters>,
    #[serde(default)]
    categories: Vec<PsCategory>,
    seasons: Option<u32>,
}

impl PsSheet {
    fn into_item(self, id: String, kind: ContentType) -> Item {
        let mut item = Item::new(id, kind, self.title);
        item.description = self.overview.and_then(non_empty);
        item.release_year = self.release_date.as_deref().and_then(year_prefix);
        if let Some(posters) = self.posters {
            item.poster = posters.large.and_then(non_empty);
            item.background = posters
                .wallpaper
                .and_then(non_empty)
                .or_else(|| posters.small.and_then(non_empty));
        }
        item.genres = self.categories.into_iter().map(|c| c.name).collect();
        item
    }
}

#[derive(Debug, Deserialize)]
struct PsPosters {
    large: Option<String>,
    wallpaper: Option<String>,
    small: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PsCategory {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PsSeason {
    #[serde(default)]
    episodes: Vec<PsEpisode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PsEpisode {
    episode: u32,
    name: Option<String>,
    formatted_name: Option<String>,
    air_date: Option<String>,
    overview: Option<String>,
    poster: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PsStreams {
    #[serde(default)]
    sources: Vec<PsStreamSource>,
}

#[derive(Debug, Deserialize)]
struct PsStreamSource {
    stream_url: String,
    source_name: Option<String>,
    format: Option<String>,
}
