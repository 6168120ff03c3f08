use anyhow::{Context, Result};
use clap::Parser;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tokio::sync::mpsc;

use feedrace::config::Config;
use feedrace::feed::FeedFetcher;
use feedrace::refresh::{merge_articles, refresh_all};

/// Default config file location (~/.config/feedrace/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("feedrace")
        .join("config.toml"))
}

#[derive(Parser, Debug)]
#[command(
    name = "feedrace",
    about = "Fetch RSS/Atom feeds by racing a JSON converter against CORS relays"
)]
struct Args {
    /// Feed URLs (scheme optional)
    #[arg(required = true, value_name = "URL")]
    urls: Vec<String>,

    /// Config file (defaults to ~/.config/feedrace/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Bypass the result cache
    #[arg(long)]
    force: bool,

    /// Print the fetched feeds and articles as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let client = reqwest::Client::builder()
        .user_agent(concat!("feedrace/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;
    let fetcher = FeedFetcher::new(client, config).context("Invalid configuration")?;

    let (progress_tx, mut progress_rx) = mpsc::channel::<(usize, usize)>(16);
    let progress = tokio::spawn(async move {
        while let Some((done, total)) = progress_rx.recv().await {
            tracing::info!(done = done, total = total, "Refresh progress");
        }
    });

    let outcome = refresh_all(
        &fetcher,
        &args.urls,
        &HashMap::new(),
        args.force,
        Some(progress_tx),
    )
    .await;
    // Sender was moved into refresh_all and is dropped by now
    let _ = progress.await;

    let refreshed = outcome.refreshed_urls();
    let failed = outcome.reports.iter().filter(|r| r.result.is_err()).count();

    if args.json {
        let feeds = outcome.feeds;
        let articles = merge_articles(Vec::new(), outcome.articles, &HashSet::new());
        let out = serde_json::json!({ "feeds": feeds, "articles": articles });
        println!(
            "{}",
            serde_json::to_string_pretty(&out).context("Failed to serialize output")?
        );
    } else {
        for report in &outcome.reports {
            match &report.result {
                Ok(count) => println!("ok    {} ({} articles)", report.feed_url, count),
                Err(e) => println!("fail  {}: {}", report.feed_url, e),
            }
        }
        let articles = merge_articles(Vec::new(), outcome.articles, &HashSet::new());
        if !articles.is_empty() {
            println!();
        }
        for article in &articles {
            println!("{}  [{}] {}", article.pub_date, article.feed_title, article.title);
        }
    }

    if refreshed.is_empty() {
        anyhow::bail!("No feed could be fetched ({} failed)", failed);
    }

    Ok(())
}
