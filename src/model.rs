//! Normalized catalog types shared by every source.
//!
//! Sources turn their own HTML/JSON shapes into these values; nothing
//! downstream of a [`Source`](crate::source::Source) looks at raw markup.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of title a catalog entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Movie,
    Series,
}

impl ContentType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Movie => "movie",
            ContentType::Series => "series",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(ContentType::Movie),
            "series" => Ok(ContentType::Series),
            other => Err(format!("unknown content type: {other}")),
        }
    }
}

/// A normalized catalog entry.
///
/// `id` is a composite id (see [`CompositeId`](crate::id::CompositeId)) and
/// must be handed back unchanged to the source that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "releaseInfo", skip_serializing_if = "Option::is_none")]
    pub release_year: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub genres: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cast: Vec<String>,
    /// Episode index, populated only by series detail lookups.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub videos: Vec<Episode>,
}

impl Item {
    /// Bare item with only the required fields set.
    pub fn new(id: impl Into<String>, content_type: ContentType, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content_type,
            name: name.into(),
            poster: None,
            background: None,
            description: None,
            release_year: None,
            genres: Vec::new(),
            cast: Vec::new(),
            videos: Vec::new(),
        }
    }
}

/// One entry in a series' episode index.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    /// Composite episode id, resolvable to streams on its own.
    pub id: String,
    pub title: String,
    pub season: u32,
    pub episode: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub released: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
}

/// Sort an episode index by (season, episode) ascending.
pub fn sort_episodes(episodes: &mut [Episode]) {
    episodes.sort_by_key(|e| (e.season, e.episode));
}

/// Pick the episode matching `season`/`episode`, tolerating an off-by-one
/// episode number when no exact match exists.
///
/// Sources number episodes inconsistently (specials, double-length pilots),
/// so a request for E11 of a ten-episode season lands on E10.
#[must_use]
pub fn pick_episode(episodes: &[Episode], season: u32, episode: u32) -> Option<&Episode> {
    let in_season = || episodes.iter().filter(move |e| e.season == season);

    in_season()
        .find(|e| e.episode == episode)
        .or_else(|| in_season().find(|e| e.episode.abs_diff(episode) <= 1))
}

/// Identifies one episode of a matched series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeRef {
    pub series_id: String,
    pub season: u32,
    pub episode: u32,
    /// Composite episode id once the owning source located it.
    pub episode_id: Option<String>,
}

impl EpisodeRef {
    pub fn new(series_id: impl Into<String>, season: u32, episode: u32) -> Self {
        Self {
            series_id: series_id.into(),
            season,
            episode,
            episode_id: None,
        }
    }
}

/// A playable result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamCandidate {
    pub url: String,
    /// Human readable label, always mentions the source.
    pub label: String,
    /// `false` when the URL needs header injection or range relay, i.e. it
    /// must be served through the proxy.
    pub directly_playable: bool,
    pub binge_group: Option<String>,
}

/// Transient input to the match selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchQuery {
    pub title: String,
    pub content_type: ContentType,
    pub year: Option<String>,
}

/// What the metadata collaborator knows about an external id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TitleInfo {
    pub name: String,
    pub release_year: Option<String>,
    pub slug: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ep(season: u32, episode: u32) -> Episode {
        Episode {
            id: format!("test:episode:{season}:{episode}"),
            title: format!("S{season}E{episode}"),
            season,
            episode,
            released: None,
            thumbnail: None,
            overview: None,
        }
    }

    #[test]
    fn content_type_round_trips_through_str() {
        assert_eq!("movie".parse::<ContentType>().unwrap(), ContentType::Movie);
        assert_eq!("series".parse::<ContentType>().unwrap(), ContentType::Series);
        assert!("tv".parse::<ContentType>().is_err());
        assert_eq!(ContentType::Series.to_string(), "series");
    }

    #[test]
    fn pick_episode_prefers_exact() {
        let season: Vec<_> = (1..=10).map(|n| ep(1, n)).collect();
        assert_eq!(pick_episode(&season, 1, 4).unwrap().episode, 4);
    }

    #[test]
    fn pick_episode_tolerates_one_off() {
        let season: Vec<_> = (1..=10).map(|n| ep(1, n)).collect();
        assert_eq!(pick_episode(&season, 1, 11).unwrap().episode, 10);
        assert!(pick_episode(&season, 1, 20).is_none());
    }

    #[test]
    fn pick_episode_ignores_other_seasons() {
        let episodes = vec![ep(1, 1), ep(2, 1), ep(2, 2)];
        assert_eq!(pick_episode(&episodes, 2, 2).unwrap().id, "test:episode:2:2");
        assert!(pick_episode(&episodes, 3, 1).is_none());
    }

    #[test]
    fn sort_episodes_orders_by_season_then_number() {
        let mut episodes = vec![ep(2, 1), ep(1, 3), ep(1, 1)];
        sort_episodes(&mut episodes);
        let order: Vec<_> = episodes.iter().map(|e| (e.season, e.episode)).collect();
        assert_eq!(order, vec![(1, 1), (1, 3), (2, 1)]);
    }

    #[test]
    fn item_serializes_with_addon_field_names() {
        let mut item = Item::new("purstream:movie:1", ContentType::Movie, "Inception");
        item.release_year = Some("2010".into());
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "movie");
        assert_eq!(json["releaseInfo"], "2010");
        assert!(json.get("poster").is_none());
        assert!(json.get("videos").is_none());
    }
}
