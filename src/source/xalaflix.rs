//! Xalaflix HTML source.
//!
//! Catalog and search pages list `.single-video` cards whose link ends in the
//! numeric media id. Series pages link to one page per season; episodes are
//! cards on those season pages.
//!
//! Ids: `xalaflix:{movie|series}:{id}` and `xalaflix:episode:{id}`.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use super::text::{last_segment, non_empty, squash};
use super::Source;
use crate::error::Result;
use crate::http_client::SourceClient;
use crate::id::{CompositeId, IdError, IdKind};
use crate::model::{sort_episodes, ContentType, Episode, Item, StreamCandidate};

pub const TAG: &str = "xalaflix";

const BASE_URL: &str = "https://xalaflix.men";

/// Season pages fetched per series. Long-running shows have dozens and the
/// add-on client gives up long before they all load.
const MAX_SEASONS: usize = 5;

macro_rules! selector {
    ($css:literal) => {
        Lazy::new(|| Selector::parse($css).expect("valid selector"))
    };
}

static CARD: Lazy<Selector> = selector!(".single-video");
static LINK: Lazy<Selector> = selector!("a[href]");
static ANCHOR: Lazy<Selector> = selector!("a");
static IMG: Lazy<Selector> = selector!("img[src]");
static H1: Lazy<Selector> = selector!("h1");
static TAB_DESCRIPTION: Lazy<Selector> = selector!("#tab1");
static DESCRIPTION: Lazy<Selector> = selector!(".video-description");
static DATE: Lazy<Selector> = selector!(".date-video");
static HERO: Lazy<Selector> = selector!(".vfx-item-ptb-top");
static BACKGROUND_IMG: Lazy<Selector> = selector!(".video-background img[src]");
static POSTER_IMG: Lazy<Selector> = selector!(".video-img img[src]");
static GENRE: Lazy<Selector> = selector!("a[href*=\"genre_id\"]");
static ACTOR: Lazy<Selector> = selector!("a[href*=\"actor_id\"]");
static SEASON_LINK: Lazy<Selector> = selector!("a[href*=\"/seasons/\"]");
static ENTRY_TITLE: Lazy<Selector> = selector!(".entry-title");
static PLAYER_SOURCE: Lazy<Selector> = selector!("video#player source[src]");
static PLAYER: Lazy<Selector> = selector!("video#player[src]");
static IFRAME: Lazy<Selector> = selector!("iframe[src]");

static TOP_BADGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^TOP\s+\d+\s+").expect("valid regex"));
static BG_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"url\(['"]?(.*?)['"]?\)"#).expect("valid regex"));
static SEASON_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Saison\s+(\d+)").expect("valid regex"));
static EPISODE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:Episode|Ep)\s*(\d+)").expect("valid regex"));

pub struct XalaflixSource {
    client: SourceClient,
    base: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Page {
    Movie,
    Show,
    EpisodeVideo,
}

impl XalaflixSource {
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

    fn page_url(&self, page: Page, id: &str) -> String {
        match page {
            Page::Movie => format!("{}/movies/watch/video/{id}", self.base),
            Page::Show => format!("{}/shows/details/show/{id}", self.base),
            Page::EpisodeVideo => format!("{}/shows/details/video/{id}", self.base),
        }
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        self.client.fetch_html(TAG, url, &self.base).await
    }

    async fn fetch_season(&self, url: &str) -> Vec<Episode> {
        match self.fetch(url).await {
            Ok(html) => parse_season_page(&html),
            Err(e) => {
                debug!(url, error = %e, "season page failed");
                Vec::new()
            }
        }
    }
}

/// Payload must be a single path segment.
fn media_id(id: &CompositeId) -> Result<&str, IdError> {
    if id.payload.contains([':', '/']) {
        return Err(IdError::Payload {
            source_tag: TAG,
            payload: id.payload.clone(),
        });
    }
    Ok(&id.payload)
}

#[async_trait]
impl Source for XalaflixSource {
    fn name(&self) -> &'static str {
        TAG
    }

    fn display_name(&self) -> &'static str {
        "Xalaflix"
    }

    async fn search(&self, query: &str) -> Result<Vec<Item>> {
        let url = format!("{}/search_elastic?s={}", self.base, urlencoding::encode(query));
        let html = self.fetch(&url).await?;
        Ok(parse_search(&html))
    }

    async fn catalog(&self, content_type: ContentType, page: u32) -> Result<Vec<Item>> {
        let section = match content_type {
            ContentType::Movie => "movies",
            ContentType::Series => "shows",
        };
        let url = if page <= 1 {
            format!("{}/{section}", self.base)
        } else {
            format!("{}/{section}/page/{page}", self.base)
        };
        let html = self.fetch(&url).await?;
        Ok(parse_catalog(&html, content_type))
    }

    async fn details(&self, id: &CompositeId) -> Result<Option<Item>> {
        let kind = match id.kind {
            IdKind::Movie => ContentType::Movie,
            IdKind::Series => ContentType::Series,
            IdKind::Episode => return Ok(None),
        };
        let media = media_id(id)?;
        let page = if kind == ContentType::Movie {
            Page::Movie
        } else {
            Page::Show
        };

        let html = self.fetch(&self.page_url(page, media)).await?;
        let (mut item, season_links) = parse_details(&html, id.to_string(), kind);

        if kind == ContentType::Series {
            let base = Url::parse(&self.base).ok();
            let urls: Vec<String> = season_links
                .iter()
                .take(MAX_SEASONS)
                .filter_map(|href| absolutize(base.as_ref(), href))
                .collect();
            let seasons = futures::future::join_all(urls.iter().map(|u| self.fetch_season(u))).await;
            let mut videos: Vec<Episode> = seasons.into_iter().flatten().collect();
            sort_episodes(&mut videos);
            item.videos = videos;
        }

        Ok(Some(item))
    }

    async fn streams(&self, id: &CompositeId) -> Result<Vec<StreamCandidate>> {
        let page = match id.kind {
            IdKind::Movie => Page::Movie,
            IdKind::Episode => Page::EpisodeVideo,
            IdKind::Series => return Ok(Vec::new()),
        };
        let media = media_id(id)?;
        let html = self.fetch(&self.page_url(page, media)).await?;
        Ok(parse_streams(&html, media))
    }
}

fn absolutize(base: Option<&Url>, href: &str) -> Option<String> {
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    base?.join(href).ok().map(String::from)
}

fn attr<'a>(el: ElementRef<'a>, sel: &Selector, name: &str) -> Option<&'a str> {
    el.select(sel).next().and_then(|e| e.value().attr(name))
}

fn text_of(el: ElementRef<'_>) -> String {
    squash(&el.text().collect::<String>())
}

fn first_text(doc: &Html, sel: &Selector) -> Option<String> {
    doc.select(sel).next().map(text_of).and_then(non_empty)
}

fn clean_title(raw: &str) -> String {
    TOP_BADGE.replace(&squash(raw), "").trim().to_string()
}

fn card_item(id: &str, kind: ContentType, name: String, poster: &str) -> Item {
    let mut item = Item::new(
        CompositeId::new(TAG, kind.into(), id).to_string(),
        kind,
        name,
    );
    item.poster = non_empty(poster);
    item
}

/// `.single-video` cards from a movies/shows listing.
fn parse_catalog(html: &str, kind: ContentType) -> Vec<Item> {
    let doc = Html::parse_document(html);
    doc.select(&CARD)
        .filter_map(|card| {
            let link = attr(card, &LINK, "href")?;
            let poster = attr(card, &IMG, "src")?;
            let id = last_segment(link)?;
            Some(card_item(id, kind, clean_title(&card.text().collect::<String>()), poster))
        })
        .collect()
}

/// Search results: any anchor to a movie or show page that wraps a poster.
fn parse_search(html: &str) -> Vec<Item> {
    let doc = Html::parse_document(html);
    let mut items: Vec<Item> = Vec::new();

    for anchor in doc.select(&ANCHOR) {
        let Some(link) = anchor.value().attr("href") else {
            continue;
        };
        let kind = if link.contains("/shows/") {
            ContentType::Series
        } else if link.contains("/movies/") {
            ContentType::Movie
        } else {
            continue;
        };
        let (Some(poster), Some(id)) = (attr(anchor, &IMG, "src"), last_segment(link)) else {
            continue;
        };

        let item = card_item(id, kind, clean_title(&anchor.text().collect::<String>()), poster);
        if !items.iter().any(|i| i.id == item.id) {
            items.push(item);
        }
    }

    items
}

/// Detail page fields plus the season page links (series only).
fn parse_details(html: &str, id: String, kind: ContentType) -> (Item, Vec<String>) {
    let doc = Html::parse_document(html);

    let name = first_text(&doc, &H1).unwrap_or_default();
    let mut item = Item::new(id, kind, name);
    item.description =
        first_text(&doc, &TAB_DESCRIPTION).or_else(|| first_text(&doc, &DESCRIPTION));
    item.release_year = first_text(&doc, &DATE);
    item.background = doc
        .select(&HERO)
        .next()
        .and_then(|e| e.value().attr("style"))
        .and_then(|style| BG_URL.captures(style))
        .and_then(|c| c.get(1))
        .and_then(|m| non_empty(m.as_str()))
        .or_else(|| {
            doc.select(&BACKGROUND_IMG)
                .next()
                .and_then(|e| e.value().attr("src"))
                .and_then(non_empty)
        });
    item.poster = doc
        .select(&POSTER_IMG)
        .next()
        .and_then(|e| e.value().attr("src"))
        .and_then(non_empty);
    item.genres = doc.select(&GENRE).map(text_of).filter(|s| !s.is_empty()).collect();
    item.cast = doc.select(&ACTOR).map(text_of).filter(|s| !s.is_empty()).collect();

    let mut seasons: Vec<String> = Vec::new();
    if kind == ContentType::Series {
        for href in doc.select(&SEASON_LINK).filter_map(|a| a.value().attr("href")) {
            if !seasons.iter().any(|s| s == href) {
                seasons.push(href.to_string());
            }
        }
    }

    (item, seasons)
}

/// Episodes listed on one season page. The season comes from `Saison N` in
/// the heading, episode numbers from `Episode N` in the card title, falling
/// back to card position.
fn parse_season_page(html: &str) -> Vec<Episode> {
    let doc = Html::parse_document(html);

    let season = first_text(&doc, &H1)
        .and_then(|h| SEASON_NUMBER.captures(&h).and_then(|c| c[1].parse().ok()))
        .unwrap_or(1);

    doc.select(&CARD)
        .enumerate()
        .filter_map(|(position, card)| {
            let link_el = card.select(&LINK).next()?;
            let episode_id = last_segment(link_el.value().attr("href")?)?;

            let title = card
                .select(&ENTRY_TITLE)
                .next()
                .map(text_of)
                .and_then(non_empty)
                .or_else(|| link_el.value().attr("title").and_then(non_empty))
                .unwrap_or_default();

            let fallback = u32::try_from(position + 1).unwrap_or(u32::MAX);
            let episode = EPISODE_NUMBER
                .captures(&title)
                .and_then(|c| c[1].parse().ok())
                .unwrap_or(fallback);

            Some(Episode {
                id: CompositeId::new(TAG, IdKind::Episode, episode_id).to_string(),
                title,
                season,
                episode,
                released: None,
                thumbnail: attr(card, &IMG, "src").and_then(non_empty),
                overview: None,
            })
        })
        .collect()
}

/// Direct `<video id="player">` sources first (needs the proxy), otherwise
/// the first embedded player.
fn parse_streams(html: &str, media_id: &str) -> Vec<StreamCandidate> {
    let doc = Html::parse_document(html);

    let direct = doc
        .select(&PLAYER_SOURCE)
        .next()
        .or_else(|| doc.select(&PLAYER).next())
        .and_then(|e| e.value().attr("src"))
        .and_then(non_empty);

    if let Some(url) = direct {
        return vec![StreamCandidate {
            url,
            label: "Xalaflix 1080p".to_string(),
            directly_playable: false,
            binge_group: Some(format!("{TAG}-{media_id}")),
        }];
    }

    doc.select(&IFRAME)
        .next()
        .and_then(|e| e.value().attr("src"))
        .and_then(non_empty)
        .map(|url| StreamCandidate {
            url,
            label: "Xalaflix Embed".to_string(),
            directly_playable: true,
            binge_group: None,
        })
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
        <div class="row">
          <div class="single-video">
            <a href="https://xalaflix.men/movies/watch/inception/1375">
              <img src="https://cdn.x/inception.jpg">
              <span>TOP 3  Inception</span>
            </a>
          </div>
          <div class="single-video">
            <a href="/movies/watch/no-poster/99"><span>No Poster</span></a>
          </div>
        </div>"#;

    #[test]
    fn catalog_cards_become_items() {
        let items = parse_catalog(CATALOG, ContentType::Movie);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "xalaflix:movie:1375");
        assert_eq!(items[0].name, "Inception");
        assert_eq!(items[0].poster.as_deref(), Some("https://cdn.x/inception.jpg"));
    }

    #[test]
    fn search_anchors_detect_type_and_dedupe() {
        let html = r#"
            <a href="/shows/details/breaking-bad/42"><img src="bb.jpg"> Breaking Bad </a>
            <a href="/shows/details/breaking-bad/42"><img src="bb.jpg"> Breaking Bad </a>
            <a href="/movies/watch/el-camino/77"><img src="ec.jpg">El Camino</a>
            <a href="/genres/drama"><img src="x.jpg">Drama</a>
            <a href="/movies/watch/text-only/5">Text only</a>"#;
        let items = parse_search(html);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "xalaflix:series:42");
        assert_eq!(items[0].content_type, ContentType::Series);
        assert_eq!(items[0].name, "Breaking Bad");
        assert_eq!(items[1].id, "xalaflix:movie:77");
    }

    #[test]
    fn details_extract_metadata_and_seasons() {
        let html = r#"
            <div class="vfx-item-ptb-top" style="background-image: url('https://cdn.x/bg.jpg')"></div>
            <h1> Breaking Bad </h1>
            <div class="video-img"><img src="https://cdn.x/poster.jpg"></div>
            <span class="date-video">2008</span>
            <div id="tab1"> Un prof de chimie... </div>
            <a href="/search?genre_id=3">Drame</a>
            <a href="/search?actor_id=9">Bryan Cranston</a>
            <a href="/shows/seasons/breaking-bad-1/246">Saison 1</a>
            <a href="/shows/seasons/breaking-bad-2/247">Saison 2</a>
            <a href="/shows/seasons/breaking-bad-1/246">Saison 1</a>"#;
        let (item, seasons) = parse_details(html, "xalaflix:series:42".into(), ContentType::Series);
        assert_eq!(item.name, "Breaking Bad");
        assert_eq!(item.release_year.as_deref(), Some("2008"));
        assert_eq!(item.description.as_deref(), Some("Un prof de chimie..."));
        assert_eq!(item.background.as_deref(), Some("https://cdn.x/bg.jpg"));
        assert_eq!(item.poster.as_deref(), Some("https://cdn.x/poster.jpg"));
        assert_eq!(item.genres, vec!["Drame"]);
        assert_eq!(item.cast, vec!["Bryan Cranston"]);
        assert_eq!(seasons.len(), 2);
    }

    #[test]
    fn details_background_falls_back_to_image() {
        let html = r#"<h1>X</h1><div class="video-background"><img src="bg2.jpg"></div>"#;
        let (item, seasons) = parse_details(html, "xalaflix:movie:1".into(), ContentType::Movie);
        assert_eq!(item.background.as_deref(), Some("bg2.jpg"));
        assert!(seasons.is_empty());
    }

    #[test]
    fn season_page_numbers_episodes() {
        let html = r#"
            <h1>Breaking Bad - Saison 2</h1>
            <div class="single-video"><a href="/shows/details/video/501"><img src="e1.jpg"></a>
              <h3 class="entry-title">Episode 1</h3></div>
            <div class="single-video"><a href="/shows/details/video/502" title="Ep 2 - Grilled"></a></div>
            <div class="single-video"><a href="/shows/details/video/503"></a>
              <h3 class="entry-title">Bonus</h3></div>"#;
        let episodes = parse_season_page(html);
        assert_eq!(episodes.len(), 3);
        assert!(episodes.iter().all(|e| e.season == 2));
        assert_eq!(episodes[0].id, "xalaflix:episode:501");
        assert_eq!(episodes[0].episode, 1);
        assert_eq!(episodes[0].thumbnail.as_deref(), Some("e1.jpg"));
        assert_eq!(episodes[1].episode, 2);
        assert_eq!(episodes[1].title, "Ep 2 - Grilled");
        assert_eq!(episodes[2].episode, 3);
    }

    #[test]
    fn season_defaults_to_one() {
        let html = r#"<h1>Mini-série</h1><div class="single-video"><a href="/v/9"></a></div>"#;
        assert_eq!(parse_season_page(html)[0].season, 1);
    }

    #[test]
    fn streams_prefer_direct_video() {
        let html = r#"
            <video id="player"><source src="https://cdn.x/movie.mp4" type="video/mp4"></video>
            <iframe src="https://embed.x/1"></iframe>"#;
        let streams = parse_streams(html, "1375");
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].url, "https://cdn.x/movie.mp4");
        assert!(!streams[0].directly_playable);
        assert_eq!(streams[0].binge_group.as_deref(), Some("xalaflix-1375"));
    }

    #[test]
    fn streams_fall_back_to_iframe() {
        let streams = parse_streams(r#"<iframe src="https://embed.x/1"></iframe>"#, "1");
        assert_eq!(streams.len(), 1);
        assert!(streams[0].directly_playable);
        assert!(streams[0].label.contains("Xalaflix"));
        assert!(parse_streams("<p>nothing</p>", "1").is_empty());
    }

    #[test]
    fn media_id_rejects_nested_payloads() {
        let id: CompositeId = "xalaflix:movie:12:3".parse().unwrap();
        assert!(media_id(&id).is_err());
        let id: CompositeId = "xalaflix:episode:501".parse().unwrap();
        assert_eq!(media_id(&id).unwrap(), "501");
    }

    #[test]
    fn relative_season_links_are_resolved() {
        let base = Url::parse("https://xalaflix.men").ok();
        assert_eq!(
            absolutize(base.as_ref(), "/shows/seasons/x-1/246").as_deref(),
            Some("https://xalaflix.men/shows/seasons/x-1/246")
        );
        assert_eq!(
            absolutize(None, "https://other/s/1").as_deref(),
            Some("https://other/s/1")
        );
    }
}
