//! Linked-Record Client CLI
//!
//! Thin command-line front end over the library:
//! - `links`  stream records linking to a target
//! - `counts` like / repost / reply counts for a target
//! - `fetch`  resolve a record directly from the repository API
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use tracing::info;

use rust_constellation::links::{LinkQuery, SUBJECT_URI_PATH};
use rust_constellation::utils::logging::{init_tracing, DEFAULT_FILTER};
use rust_constellation::{Collection, DirectRecordResolver, LinkIndexClient, LinkIndexConfig};

#[derive(Parser)]
#[command(name = "rust_constellation", version, about = "Backlinks, counts and direct record fetches")]
struct Cli {
    /// JSON config file. Environment variables are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stream records linking to TARGET
    Links {
        target: String,
        #[arg(long, default_value = "app.bsky.feed.like")]
        collection: Collection,
        #[arg(long, default_value = SUBJECT_URI_PATH)]
        path: String,
        /// Stop after this many records
        #[arg(long, default_value_t = 100)]
        limit: usize,
        /// Print at:// uris instead of JSON objects
        #[arg(long)]
        uris: bool,
    },
    /// Like, repost and reply counts for TARGET
    Counts { target: String },
    /// Fetch a record and its author straight from the repository API
    Fetch {
        uri: String,
        #[arg(long, value_enum, default_value_t = ViewKind::Post)]
        view: ViewKind,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ViewKind {
    Post,
    Embed,
    Raw,
}

async fn load_config(path: Option<&PathBuf>) -> Result<LinkIndexConfig> {
    let config = match path {
        Some(path) => LinkIndexConfig::load(path)
            .await
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => LinkIndexConfig::from_env().context("Invalid environment configuration")?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing(DEFAULT_FILTER).context("Failed to initialize logging")?;

    let cli = Cli::parse();
    let config = Arc::new(load_config(cli.config.as_ref()).await?);
    info!("Link index: {} (enabled: {})", config.instance_url, config.enabled);

    match cli.command {
        Command::Links {
            target,
            collection,
            path,
            limit,
            uris,
        } => {
            let client = LinkIndexClient::new(config)?;
            let mut links = client.links(LinkQuery::new(target, collection, path)).take(limit);

            while let Some(link) = links.next().await {
                let link = link?;
                if uris {
                    println!("{}", link.at_uri());
                } else {
                    println!("{}", serde_json::to_string(&link)?);
                }
            }
        }
        Command::Counts { target } => {
            let client = LinkIndexClient::new(config)?;
            let counts = client.counts(&target).await?;
            println!("{}", serde_json::to_string_pretty(&counts)?);
        }
        Command::Fetch { uri, view } => {
            let resolver = DirectRecordResolver::from_config(config)?;
            let output = match view {
                ViewKind::Post => {
                    let post = resolver.resolve_post(&uri).await?;
                    info!("Fetched {} (direct: {})", post.uri, post.is_direct_fetch());
                    serde_json::to_value(post)?
                }
                ViewKind::Embed => {
                    let embed = resolver.resolve_embed_record(&uri).await?;
                    info!("Fetched {} (direct: {})", embed.uri, embed.is_direct_fetch());
                    serde_json::to_value(embed)?
                }
                ViewKind::Raw => serde_json::to_value(resolver.resolve(&uri).await?)?,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
