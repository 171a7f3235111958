//! `sourcemux` CLI - run the add-on server or query sources from a terminal

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use sourcemux::source::BUILTIN_SOURCES;
use sourcemux::{AddonService, CompositeId, Config, ContentType, ExternalId, StreamCandidate};

#[derive(Parser)]
#[command(name = "sourcemux")]
#[command(about = "Resolve film and series ids into playable streams across several sources")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/sourcemux/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the add-on HTTP server
    Serve {
        /// Listen address, overrides the config file
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Resolve an id (tt1375666, tt0903747:1:2, purstream:movie:42) to streams
    Resolve {
        /// Content type: movie or series
        kind: ContentType,

        /// External or composite id
        id: String,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Search every enabled source
    Search {
        /// Free-text query
        query: String,

        /// Keep only this content type
        #[arg(short = 't', long = "type")]
        kind: Option<ContentType>,
    },

    /// List built-in sources and whether they are enabled
    Sources,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so command output can be piped
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind = bind;
            }
            sourcemux::server::serve(&config).await?;
        }
        Commands::Resolve { kind, id, json } => {
            cmd_resolve(&config, kind, &id, json).await?;
        }
        Commands::Search { query, kind } => {
            cmd_search(&config, &query, kind).await?;
        }
        Commands::Sources => {
            cmd_sources(&config);
        }
    }

    Ok(())
}

async fn cmd_resolve(config: &Config, kind: ContentType, id: &str, json: bool) -> Result<()> {
    let addon = AddonService::from_config(config)?;
    let start = Instant::now();

    let streams: Vec<StreamCandidate> = if let Some(external) = ExternalId::parse(id) {
        addon.resolver().resolve(kind, &external).await
    } else {
        let composite: CompositeId = id
            .parse()
            .with_context(|| format!("not an external or composite id: {id}"))?;
        addon.resolver().registry().streams(&composite).await
    };
    let elapsed = start.elapsed();

    if json {
        let presented = addon.present_streams(streams);
        println!("{}", serde_json::to_string_pretty(&presented)?);
        return Ok(());
    }

    if streams.is_empty() {
        println!("No streams found for {id} ({elapsed:.0?})");
        return Ok(());
    }

    println!("{} stream(s) for {id} in {elapsed:.0?}", streams.len());
    for stream in &streams {
        let how = if stream.directly_playable { "direct" } else { "proxy" };
        println!("  [{how:>6}] {}", stream.label);
        println!("           {}", stream.url);
    }
    Ok(())
}

async fn cmd_search(config: &Config, query: &str, kind: Option<ContentType>) -> Result<()> {
    let addon = AddonService::from_config(config)?;
    let results = addon.resolver().registry().search_all(query).await;

    for (source, items) in results {
        let items: Vec<_> = items
            .into_iter()
            .filter(|i| kind.is_none() || kind == Some(i.content_type))
            .collect();
        println!("{} ({} results)", source.display_name(), items.len());
        for item in items {
            let year = item.release_year.as_deref().unwrap_or("----");
            println!("  {year}  {:<6}  {:<40}  {}", item.content_type.as_str(), item.name, item.id);
        }
    }
    Ok(())
}

fn cmd_sources(config: &Config) {
    println!("Sources (priority order as configured):");
    for tag in BUILTIN_SOURCES {
        let position = config.sources.iter().position(|s| s.as_str() == *tag);
        match position {
            Some(n) => println!("  {}. {tag}", n + 1),
            None => println!("  -  {tag} (disabled)"),
        }
    }
    for unknown in config.sources.iter().filter(|s| !BUILTIN_SOURCES.contains(&s.as_str())) {
        println!("  ?  {unknown} (unknown, ignored)");
    }
}
