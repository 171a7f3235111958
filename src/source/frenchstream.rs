//! French-Stream HTML source.
//!
//! Items are addressed by their path on the site (`films/123-slug.html`,
//! `s-tv/456-slug.html`). Episodes of a series are listed on the series page
//! itself, without season separation.
//!
//! The series page carries no per-episode player links, so every episode id
//! of a series resolves to the same players: those of the series page.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use super::text::{non_empty, squash};
use super::Source;
use crate::error::Result;
use crate::http_client::SourceClient;
use crate::id::{CompositeId, IdError, IdKind};
use crate::model::{sort_episodes, ContentType, Episode, Item, StreamCandidate};

pub const TAG: &str = "frenchstream";

const BASE_URL: &str = "https://fs02.lol";

static SHORT: Lazy<Selector> = Lazy::new(|| Selector::parse(".short").expect("valid selector"));
static SHORT_POSTER: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".short-poster").expect("valid selector"));
static SHORT_POSTER_IMG: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".short-poster img").expect("valid selector"));
static SHORT_TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".short-title").expect("valid selector"));
static H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").expect("valid selector"));
static STORY: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(".short-story-description, .full-text").expect("valid selector")
});
static DVD_IMG: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".dvd-container img").expect("valid selector"));
static GENRE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href*=\"/xfsearch/genre\"]").expect("valid selector"));
static EP_TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".ep-title").expect("valid selector"));
static IFRAME: Lazy<Selector> =
    Lazy::new(|| Selector::parse("#video-iframe").expect("valid selector"));
static PLAYER_OPTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".player-option, .fsctab").expect("valid selector"));

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\((\d{4})\)").expect("valid regex"));
static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

pub struct FrenchStreamSource {
    client: SourceClient,
    base: String,
}

/// What a composite id points at on the site.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Page { kind: ContentType, path: String },
    Episode { season: u32, episode: u32, path: String },
}

impl Target {
    fn parse(id: &CompositeId) -> Result<Self, IdError> {
        let bad = || IdError::Payload {
            source_tag: TAG,
            payload: id.payload.clone(),
        };

        let target = match id.kind {
            IdKind::Movie => Target::Page {
                kind: ContentType::Movie,
                path: id.payload.clone(),
            },
            IdKind::Series => Target::Page {
                kind: ContentType::Series,
                path: id.payload.clone(),
            },
            IdKind::Episode => {
                let mut parts = id.payload.splitn(3, ':');
                let season = parts.next().and_then(|s| s.parse().ok()).ok_or_else(bad)?;
                let episode = parts.next().and_then(|s| s.parse().ok()).ok_or_else(bad)?;
                let path = parts.next().ok_or_else(bad)?.to_string();
                Target::Episode {
                    season,
                    episode,
                    path,
                }
            }
        };

        if !is_site_path(target.path()) {
            return Err(bad());
        }
        Ok(target)
    }

    fn path(&self) -> &str {
        match self {
            Target::Page { path, .. } | Target::Episode { path, .. } => path,
        }
    }
}

/// A relative path on the site; never a full URL or a parent reference.
fn is_site_path(path: &str) -> bool {
    !path.is_empty() && !path.contains("://") && !path.split('/').any(|s| s == "..")
}

impl FrenchStreamSource {
    pub fn new(client: SourceClient) -> Self {
        Self::with_base(client, BASE_URL)
    }

    /// Point the source at another site root (tests use a local server).
    pub fn with_base(client: SourceClient, base: impl Into<String>) -> Self {
        Self {
            client,
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_path(&self, path: &str) -> Result<String> {
        let url = format!("{}/{}", self.base, path.trim_start_matches('/'));
        self.client.fetch_html(TAG, &url, &self.base).await
    }
}

#[async_trait]
impl Source for FrenchStreamSource {
    fn name(&self) -> &'static str {
        TAG
    }

    fn display_name(&self) -> &'static str {
        "FrenchStream"
    }

    async fn search(&self, query: &str) -> Result<Vec<Item>> {
        let html = self
            .fetch_path(&format!("?search={}", urlencoding::encode(query)))
            .await?;
        Ok(parse_cards(&html, &self.base, None))
    }

    async fn catalog(&self, content_type: ContentType, page: u32) -> Result<Vec<Item>> {
        let section = match content_type {
            ContentType::Movie => "films",
            ContentType::Series => "s-tv",
        };
        let html = self
            .fetch_path(&format!("{section}/page/{}/", page.max(1)))
            .await?;
        Ok(parse_cards(&html, &self.base, Some(content_type)))
    }

    async fn details(&self, id: &CompositeId) -> Result<Option<Item>> {
        let Target::Page { kind, path } = Target::parse(id)? else {
            return Ok(None);
        };
        let html = self.fetch_path(&path).await?;
        Ok(Some(parse_details(&html, &self.base, id, kind, &path)))
    }

    async fn streams(&self, id: &CompositeId) -> Result<Vec<StreamCandidate>> {
        let path = match Target::parse(id)? {
            Target::Page {
                kind: ContentType::Series,
                ..
            } => return Ok(Vec::new()),
            target => target.path().to_string(),
        };
        let html = self.fetch_path(&path).await?;
        Ok(parse_streams(&html))
    }
}

/// Path of `link` relative to the site root, without the leading slash.
fn relative_path(link: &str, base: &str) -> Option<String> {
    let path = if let Some(rest) = link.strip_prefix(base) {
        rest.to_string()
    } else if link.starts_with("http://") || link.starts_with("https://") {
        let url = Url::parse(link).ok()?;
        match url.query() {
            Some(q) => format!("{}?{q}", url.path()),
            None => url.path().to_string(),
        }
    } else {
        link.to_string()
    };
    non_empty(path.trim_start_matches('/'))
}

fn absolute(src: &str, base: &str) -> String {
    if src.starts_with("http") {
        src.to_string()
    } else {
        format!("{base}{src}")
    }
}

/// `.short` cards from search and listing pages. Without a forced type, the
/// path decides: `/s-tv/` is a series.
fn parse_cards(html: &str, base: &str, forced: Option<ContentType>) -> Vec<Item> {
    let doc = Html::parse_document(html);

    doc.select(&SHORT)
        .filter_map(|card| {
            let link = card.select(&SHORT_POSTER).next()?.value().attr("href")?;
            let poster = card
                .select(&SHORT_POSTER_IMG)
                .next()?
                .value()
                .attr("src")
                .and_then(non_empty)?;
            let title = card
                .select(&SHORT_TITLE)
                .next()
                .map(|t| squash(&t.text().collect::<String>()))
                .and_then(non_empty)?;
            let path = relative_path(link, base)?;

            let kind = forced.unwrap_or(if link.contains("/s-tv/") {
                ContentType::Series
            } else {
                ContentType::Movie
            });

            let mut item = Item::new(
                CompositeId::new(TAG, kind.into(), path).to_string(),
                kind,
                title,
            );
            item.poster = Some(absolute(&poster, base));
            Some(item)
        })
        .collect()
}

fn parse_details(html: &str, base: &str, id: &CompositeId, kind: ContentType, path: &str) -> Item {
    let doc = Html::parse_document(html);

    let heading = doc
        .select(&H1)
        .next()
        .map(|h| squash(&h.text().collect::<String>()))
        .unwrap_or_default();
    let year = YEAR.captures(&heading).map(|c| c[1].to_string());
    let name = YEAR.replace(&heading, "").trim().to_string();

    let mut item = Item::new(id.to_string(), kind, name);
    item.release_year = year;
    item.description = doc
        .select(&STORY)
        .next()
        .map(|d| squash(&d.text().collect::<String>()))
        .and_then(non_empty);
    item.poster = doc
        .select(&DVD_IMG)
        .next()
        .or_else(|| doc.select(&SHORT_POSTER_IMG).next())
        .and_then(|img| img.value().attr("src"))
        .and_then(non_empty)
        .map(|src| absolute(&src, base));
    item.genres = doc
        .select(&GENRE)
        .map(|g| squash(&g.text().collect::<String>()))
        .filter(|g| !g.is_empty())
        .collect();

    if kind == ContentType::Series {
        let mut videos: Vec<Episode> = Vec::new();
        for (position, el) in doc.select(&EP_TITLE).enumerate() {
            let title = squash(&el.text().collect::<String>());
            let fallback = u32::try_from(position + 1).unwrap_or(u32::MAX);
            let episode = NUMBER
                .find(&title)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(fallback);
            if videos.iter().any(|v| v.episode == episode) {
                continue;
            }
            videos.push(Episode {
                id: CompositeId::new(TAG, IdKind::Episode, format!("1:{episode}:{path}"))
                    .to_string(),
                title,
                season: 1,
                episode,
                released: None,
                thumbnail: None,
                overview: None,
            });
        }
        sort_episodes(&mut videos);
        item.videos = videos;
    }

    item
}

/// The main iframe, then every alternative player, without repeats.
fn parse_streams(html: &str) -> Vec<StreamCandidate> {
    let doc = Html::parse_document(html);
    let mut streams: Vec<StreamCandidate> = Vec::new();

    if let Some(src) = doc
        .select(&IFRAME)
        .next()
        .and_then(|f| f.value().attr("src"))
        .and_then(non_empty)
    {
        streams.push(embed(src, "Player 1"));
    }

    for option in doc.select(&PLAYER_OPTION) {
        let value = option.value();
        let Some(url) = value
            .attr("data-url")
            .or_else(|| value.attr("data-src"))
            .and_then(non_empty)
        else {
            continue;
        };
        if streams.iter().any(|s| s.url == url) {
            continue;
        }
        let name = squash(&option.text().collect::<String>());
        streams.push(embed(url, if name.is_empty() { "Player" } else { &name }));
    }

    streams
}

fn embed(url: String, player: &str) -> StreamCandidate {
    StreamCandidate {
        url,
        label: format!("FrenchStream - {player}"),
        directly_playable: true,
        binge_group: None,
    }
}
