//! Add-on service: catalog, meta and stream lookups as a media-center client
//! asks for them.
//!
//! Composite ids go straight to the source that minted them; external ids go
//! through the [`Resolver`]. Streams a client cannot play on its own are
//! rewritten into links to this service's `/proxy` endpoint.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::Config;
use crate::http_client::SourceClient;
use crate::id::{CompositeId, ExternalId};
use crate::metadata::CinemetaProvider;
use crate::model::{ContentType, Item, StreamCandidate};
use crate::resolve::Resolver;
use crate::source::{Source, SourceRegistry, PAGE_SIZE};

pub const ADDON_ID: &str = "org.sourcemux.addon";
pub const ADDON_NAME: &str = "SourceMux";

/// Optional catalog arguments (`search=...&skip=...`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogExtra {
    pub search: Option<String>,
    pub skip: Option<u32>,
}

impl CatalogExtra {
    /// Parse the `key=value&key=value` extra path segment.
    ///
    /// `raw` must still be percent-encoded: an encoded `&` or `+` inside a
    /// search term is data, not syntax. Unknown keys and malformed values
    /// are ignored.
    pub fn parse(raw: &str) -> Self {
        let mut extra = Self::default();
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            match key.as_ref() {
                "search" if !value.trim().is_empty() => extra.search = Some(value.into_owned()),
                "skip" => extra.skip = value.parse().ok(),
                _ => {}
            }
        }
        extra
    }

    /// 1-indexed page for `skip`.
    #[must_use]
    pub fn page(&self) -> u32 {
        self.skip.unwrap_or(0) / PAGE_SIZE + 1
    }
}

/// Stream entry as sent to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddonStream {
    pub name: String,
    pub title: String,
    pub url: String,
    pub behavior_hints: BehaviorHints,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorHints {
    pub not_web_ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binge_group: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AddonService {
    resolver: Resolver,
    public_base: String,
}

impl AddonService {
    pub fn new(resolver: Resolver, public_base: impl Into<String>) -> Self {
        Self {
            resolver,
            public_base: public_base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Wire the configured sources, metadata endpoint and proxy base.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> reqwest::Result<Self> {
        let client = SourceClient::new(config.request_timeout())?;
        let registry =
            SourceRegistry::from_tags(&config.sources, &client, config.source_timeout());
        let metadata = Arc::new(CinemetaProvider::new(client, &config.metadata_base));
        Ok(Self::new(Resolver::new(registry, metadata), config.public_base()))
    }

    fn registry(&self) -> &SourceRegistry {
        self.resolver.registry()
    }

    #[must_use]
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Add-on manifest: one movie and one series catalog per source.
    #[must_use]
    pub fn manifest(&self) -> Value {
        let extra = json!([
            { "name": "search", "isRequired": false },
            { "name": "skip", "isRequired": false },
        ]);
        let sources = self.registry().sources();

        let catalogs: Vec<Value> = sources
            .iter()
            .flat_map(|s| {
                [ContentType::Movie, ContentType::Series].map(|kind| {
                    json!({
                        "type": kind,
                        "id": catalog_id(s.name(), kind),
                        "name": format!("{} {}", s.display_name(), catalog_label(kind)),
                        "extra": extra,
                    })
                })
            })
            .collect();

        let mut prefixes: Vec<&str> = sources.iter().map(|s| s.name()).collect();
        prefixes.push("tt");

        json!({
            "id": ADDON_ID,
            "version": crate::VERSION,
            "name": ADDON_NAME,
            "description": "Movies and series from several French streaming sites",
            "resources": ["catalog", "meta", "stream"],
            "types": ["movie", "series"],
            "catalogs": catalogs,
            "idPrefixes": prefixes,
        })
    }

    /// Catalog page or search results.
    ///
    /// Searches fan out to every source and keep only `content_type`. Pages
    /// come from the source owning `catalog_id`, or from all sources when no
    /// source owns it.
    pub async fn list_catalog(
        &self,
        content_type: ContentType,
        catalog_id: &str,
        extra: &CatalogExtra,
    ) -> Vec<Item> {
        let registry = self.registry();

        if let Some(query) = extra.search.as_deref() {
            return registry
                .search_all(query)
                .await
                .into_iter()
                .flat_map(|(_, items)| items)
                .filter(|i| i.content_type == content_type)
                .collect();
        }

        let page = extra.page();
        match catalog_owner(registry, catalog_id) {
            Some(source) => registry.catalog(source.as_ref(), content_type, page).await,
            None => {
                debug!(catalog_id, "catalog not owned by a source, merging all");
                let pages = registry
                    .sources()
                    .iter()
                    .map(|s| registry.catalog(s.as_ref(), content_type, page));
                futures::future::join_all(pages).await.into_iter().flatten().collect()
            }
        }
    }

    /// Details for a composite id. External ids have no details here.
    pub async fn get_meta(&self, _content_type: ContentType, id: &str) -> Option<Item> {
        if ExternalId::is_external(id) {
            return None;
        }
        let id: CompositeId = id.parse().ok()?;
        self.registry().details(&id).await
    }

    /// Streams for a composite or external id, ready for the client.
    pub async fn get_streams(&self, content_type: ContentType, id: &str) -> Vec<AddonStream> {
        let candidates = if let Some(external) = ExternalId::parse(id) {
            self.resolver.resolve(content_type, &external).await
        } else if let Ok(composite) = id.parse::<CompositeId>() {
            self.registry().streams(&composite).await
        } else {
            debug!(id, "unrecognized id");
            Vec::new()
        };

        self.present_streams(candidates)
    }

    /// Client-facing entries, proxied where the URL cannot be played as is.
    #[must_use]
    pub fn present_streams(&self, candidates: Vec<StreamCandidate>) -> Vec<AddonStream> {
        candidates.into_iter().map(|c| self.present(c)).collect()
    }

    /// Link that relays `upstream` through this service.
    #[must_use]
    pub fn proxy_link(&self, upstream: &str) -> String {
        format!("{}/proxy?url={}", self.public_base, urlencoding::encode(upstream))
    }

    fn present(&self, candidate: StreamCandidate) -> AddonStream {
        let url = if candidate.directly_playable {
            candidate.url
        } else {
            self.proxy_link(&candidate.url)
        };
        AddonStream {
            name: ADDON_NAME.to_string(),
            title: candidate.label,
            url,
            behavior_hints: BehaviorHints {
                not_web_ready: false,
                binge_group: candidate.binge_group,
            },
        }
    }
}

fn catalog_label(kind: ContentType) -> &'static str {
    match kind {
        ContentType::Movie => "Movies",
        ContentType::Series => "Series",
    }
}

/// `purstream_movies`, `xalaflix_series`, ...
pub fn catalog_id(tag: &str, kind: ContentType) -> String {
    match kind {
        ContentType::Movie => format!("{tag}_movies"),
        ContentType::Series => format!("{tag}_series"),
    }
}

fn catalog_owner<'a>(
    registry: &'a SourceRegistry,
    catalog_id: &str,
) -> Option<&'a Arc<dyn Source>> {
    let tag = catalog_id
        .strip_suffix("_movies")
        .or_else(|| catalog_id.strip_suffix("_series"))?;
    registry.get(tag)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::resolve::testing::FakeMetadata;
    use crate::source::testing::{stream, FakeSource};

    fn service(sources: Vec<Arc<dyn Source>>) -> AddonService {
        let metadata = FakeMetadata::default().with("tt1375666", "Inception", None);
        let registry = SourceRegistry::new(sources, Duration::from_millis(200));
        AddonService::new(Resolver::new(registry, Arc::new(metadata)), "http://host:7000/")
    }

    fn movies(tag: &str, count: usize) -> Vec<Item> {
        (0..count)
            .map(|n| Item::new(format!("{tag}:movie:{n}"), ContentType::Movie, format!("Movie {n}")))
            .collect()
    }

    #[test]
    fn extra_parsing() {
        let extra = CatalogExtra::parse("search=le%20parrain&skip=40");
        assert_eq!(extra.search.as_deref(), Some("le parrain"));
        assert_eq!(extra.skip, Some(40));
        assert_eq!(extra.page(), 3);

        let extra = CatalogExtra::parse("search=&skip=abc&genre=x");
        assert_eq!(extra, CatalogExtra::default());
        assert_eq!(extra.page(), 1);
        assert_eq!(CatalogExtra::parse("skip=19").page(), 1);
    }

    #[test]
    fn extra_values_are_decoded_once() {
        let search = |raw: &str| CatalogExtra::parse(raw).search;
        assert_eq!(search("search=Fast%20%26%20Furious").as_deref(), Some("Fast & Furious"));
        assert_eq!(search("search=C%2B%2B").as_deref(), Some("C++"));
        assert_eq!(search("search=100%25%20Wolf").as_deref(), Some("100% Wolf"));
        assert_eq!(search("search=la+haine").as_deref(), Some("la haine"));
    }

    #[test]
    fn manifest_lists_catalogs_per_source() {
        let svc = service(vec![Arc::new(FakeSource::new("a")), Arc::new(FakeSource::new("b"))]);
        let manifest = svc.manifest();
        assert_eq!(manifest["id"], ADDON_ID);
        let ids: Vec<_> = manifest["catalogs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["a_movies", "a_series", "b_movies", "b_series"]);
        assert_eq!(manifest["catalogs"][1]["type"], "series");
        assert_eq!(manifest["idPrefixes"], json!(["a", "b", "tt"]));
        assert_eq!(manifest["catalogs"][0]["extra"][0]["name"], "search");
    }

    #[tokio::test]
    async fn catalog_pages_follow_skip() {
        let mut a = FakeSource::new("a");
        a.catalog = movies("a", 45);
        let svc = service(vec![Arc::new(a)]);

        let extra = CatalogExtra { search: None, skip: Some(40) };
        let page = svc.list_catalog(ContentType::Movie, "a_movies", &extra).await;
        assert_eq!(page.len(), 5);
        assert_eq!(page[0].id, "a:movie:40");
    }

    #[tokio::test]
    async fn unknown_catalog_merges_sources() {
        let mut a = FakeSource::new("a");
        a.catalog = movies("a", 2);
        let mut b = FakeSource::new("b");
        b.catalog = movies("b", 1);
        let svc = service(vec![Arc::new(a), Arc::new(b)]);

        let items = svc
            .list_catalog(ContentType::Movie, "everything", &CatalogExtra::default())
            .await;
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a:movie:0", "a:movie:1", "b:movie:0"]);
    }

    #[tokio::test]
    async fn search_keeps_requested_type() {
        let a = FakeSource::new("a").with_result(
            "dark",
            vec![
                Item::new("a:movie:1", ContentType::Movie, "Dark Waters"),
                Item::new("a:series:2", ContentType::Series, "Dark"),
            ],
        );
        let svc = service(vec![Arc::new(a)]);
        let extra = CatalogExtra::parse("search=dark");
        let items = svc.list_catalog(ContentType::Series, "a_series", &extra).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "a:series:2");
    }

    #[tokio::test]
    async fn meta_routes_composite_ids_only() {
        let a = FakeSource::new("a").with_details(Item::new("a:movie:1", ContentType::Movie, "X"));
        let svc = service(vec![Arc::new(a)]);
        assert!(svc.get_meta(ContentType::Movie, "a:movie:1").await.is_some());
        assert!(svc.get_meta(ContentType::Movie, "tt1375666").await.is_none());
        assert!(svc.get_meta(ContentType::Movie, "garbage").await.is_none());
    }

    #[tokio::test]
    async fn streams_are_proxied_when_needed() {
        let mut direct = stream("a", "https://cdn/a.mp4");
        direct.directly_playable = false;
        direct.binge_group = Some("a-1".to_string());
        let a = FakeSource::new("a")
            .with_result("Inception", vec![Item::new("a:movie:1", ContentType::Movie, "Inception")])
            .with_streams("a:movie:1", vec![direct, stream("a", "https://embed/1")]);
        let svc = service(vec![Arc::new(a)]);

        for id in ["a:movie:1", "tt1375666"] {
            let streams = svc.get_streams(ContentType::Movie, id).await;
            assert_eq!(streams.len(), 2, "{id}");
            assert_eq!(
                streams[0].url,
                "http://host:7000/proxy?url=https%3A%2F%2Fcdn%2Fa.mp4"
            );
            assert_eq!(streams[0].behavior_hints.binge_group.as_deref(), Some("a-1"));
            assert_eq!(streams[1].url, "https://embed/1");
        }
    }

    #[test]
    fn stream_serialization() {
        let svc = service(Vec::new());
        let value = serde_json::to_value(svc.present(stream("a", "https://x/1"))).unwrap();
        assert_eq!(value["behaviorHints"]["notWebReady"], false);
        assert!(value["behaviorHints"].get("bingeGroup").is_none());
        assert_eq!(value["title"], "a test");
    }
}
