//! `sourcemux` - resolve film and series ids into playable streams across
//! several uncooperative streaming sites.
//!
//! # Features
//!
//! - **Sources**: JSON and HTML scrapers behind one [`Source`] trait
//! - **Matching**: title normalization and edit-distance scoring
//! - **Resolution**: title variants, fallback search and episode lookup
//!   across every source ([`Resolver`])
//! - **Add-on service**: catalog, meta and stream endpoints plus a
//!   range-aware stream proxy ([`server`])
//!
//! # Example
//!
//! ```rust,no_run
//! use sourcemux::{AddonService, Config, ContentType};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     let addon = AddonService::from_config(&config)?;
//!     for stream in addon.get_streams(ContentType::Movie, "tt1375666").await {
//!         println!("{} -> {}", stream.title, stream.url);
//!     }
//!     Ok(())
//! }
//! ```

pub mod addon;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod http_client;
pub mod id;
pub mod matching;
pub mod metadata;
pub mod model;
pub mod resolve;
pub mod server;
pub mod source;

pub use addon::{AddonService, AddonStream, CatalogExtra};
pub use config::Config;
pub use error::{ProxyError, ResolveError, SourceError};
pub use http_client::SourceClient;
pub use id::{CompositeId, ExternalId, IdKind};
pub use matching::{normalize, select_best, similarity};
pub use metadata::{CinemetaProvider, MetadataProvider};
pub use model::{ContentType, Episode, Item, StreamCandidate};
pub use resolve::Resolver;
pub use source::{Source, SourceRegistry};

/// Version of sourcemux
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
