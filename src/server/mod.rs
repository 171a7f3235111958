//! HTTP surface: add-on protocol routes and the stream proxy.

mod handlers;
mod proxy;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::addon::AddonService;
use crate::config::Config;
use crate::http_client::proxy_client;

pub use proxy::{RelayStream, FORWARDED_HEADERS};

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub addon: Arc<AddonService>,
    pub proxy_client: reqwest::Client,
}

impl AppState {
    pub fn new(addon: AddonService, proxy_client: reqwest::Client) -> Self {
        Self {
            addon: Arc::new(addon),
            proxy_client,
        }
    }

    /// Build the full service stack from configuration.
    ///
    /// # Errors
    ///
    /// Fails if an HTTP client cannot be built (TLS backend initialization).
    pub fn from_config(config: &Config) -> Result<Self> {
        let addon = AddonService::from_config(config).context("failed to build source client")?;
        let proxy = proxy_client().context("failed to build proxy client")?;
        Ok(Self::new(addon, proxy))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/manifest.json", get(handlers::manifest))
        .route("/catalog/{kind}/{id}", get(handlers::catalog))
        .route("/catalog/{kind}/{id}/{extra}", get(handlers::catalog_with_extra))
        .route("/meta/{kind}/{id}", get(handlers::meta))
        .route("/stream/{kind}/{id}", get(handlers::streams))
        .route("/proxy", get(proxy::proxy))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind `config.bind` and serve until the process is stopped.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(config: &Config) -> Result<()> {
    let state = AppState::from_config(config)?;
    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    info!(
        addr = %listener.local_addr()?,
        public = %config.public_base(),
        "add-on listening, manifest at {}/manifest.json",
        config.public_base()
    );
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::model::{ContentType, Item};
    use crate::resolve::testing::FakeMetadata;
    use crate::resolve::Resolver;
    use crate::source::testing::FakeSource;
    use crate::source::{Source, SourceRegistry};

    async fn spawn(source: Arc<FakeSource>) -> std::net::SocketAddr {
        let sources: Vec<Arc<dyn Source>> = vec![source];
        let registry = SourceRegistry::new(sources, Duration::from_millis(200));
        let resolver = Resolver::new(registry, Arc::new(FakeMetadata::default()));
        let state = AppState::new(
            AddonService::new(resolver, "http://addon.test"),
            reqwest::Client::new(),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn catalog_search_keeps_reserved_characters() {
        let source = Arc::new(FakeSource::new("a").with_result(
            "Fast & Furious",
            vec![Item::new("a:movie:1", ContentType::Movie, "Fast & Furious")],
        ));
        let addr = spawn(source.clone()).await;

        for extra in ["Fast%20%26%20Furious", "C%2B%2B", "100%25%20Wolf"] {
            let url = format!("http://{addr}/catalog/movie/a_movies/search={extra}.json");
            let response = reqwest::get(url).await.unwrap();
            assert_eq!(response.status(), 200);
        }

        assert_eq!(source.queries(), vec!["Fast & Furious", "C++", "100% Wolf"]);
    }

    #[tokio::test]
    async fn catalog_search_returns_matches() {
        let source = Arc::new(FakeSource::new("a").with_result(
            "Fast & Furious",
            vec![Item::new("a:movie:1", ContentType::Movie, "Fast & Furious")],
        ));
        let addr = spawn(source).await;

        let body: serde_json::Value = reqwest::get(format!(
            "http://{addr}/catalog/movie/a_movies/search=Fast%20%26%20Furious&skip=0.json"
        ))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
        assert_eq!(body["metas"][0]["id"], "a:movie:1");
    }
}
