//! Demo CLI: runs one refresh cycle over the configured sources and
//! prints the records a host launcher would receive. Useful for checking
//! a config and the state file without a host attached.

use anyhow::{Context, Result};
use clap::Parser;
use feedrack::feed::{build_client, fetch_all};
use feedrack::storage::JsonFileStore;
use feedrack::store::FeedStore;
use feedrack::{view, Config};
use std::path::PathBuf;
use std::sync::Arc;

/// Get the config directory path (~/.config/feedrack/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("feedrack"))
}

#[derive(Parser, Debug)]
#[command(name = "feedrack", about = "Fetch configured feeds and print launcher records")]
struct Args {
    /// Config file (defaults to ~/.config/feedrack/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Show one feed's items instead of the feed list
    #[arg(long, value_name = "URL")]
    feed: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    let config_path = args
        .config
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path).context("Failed to load configuration")?;

    if config.sources.is_empty() {
        println!("No sources configured in {}", config_path.display());
        return Ok(());
    }

    let kv = Arc::new(JsonFileStore::open(config_dir.join("state.json")));
    let mut store = FeedStore::load(kv);

    let client = build_client().context("Failed to build HTTP client")?;
    let fetched = fetch_all(&client, &config.sources).await;
    store.apply_refresh(fetched, config.items_limit);

    match args.feed {
        Some(url) => {
            let state = store
                .feed(&url)
                .with_context(|| format!("'{}' is not a configured source", url))?;
            for item in view::view_feed(state) {
                let record = view::item_record(state, item);
                let marker = if record.fresh { "*" } else { " " };
                println!("{} {}", marker, record.title);
                println!("    {}", record.description);
            }
        }
        None => {
            for state in view::list_feeds(store.feeds(), config.feeds_order) {
                let record = view::feed_record(state);
                println!("{}", record.title);
                if !record.description.is_empty() {
                    println!("    {}", record.description);
                }
            }
        }
    }

    Ok(())
}
