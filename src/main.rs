use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{ArgGroup, Parser};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use rss_reader::config::{config_dir, Config};
use rss_reader::feed::Fetcher;
use rss_reader::output;
use rss_reader::pipeline::{self, PipelineError};
use rss_reader::storage::CacheStore;

#[derive(Parser, Debug)]
#[command(name = "rss-reader", version, about = "Pure command-line RSS reader")]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .multiple(true)
        .args(["source", "date", "clean"])
))]
struct Args {
    /// RSS URL
    source: Option<String>,

    /// Print result as JSON in stdout
    #[arg(long)]
    json: bool,

    /// Outputs verbose status messages (overridden by RUST_LOG)
    #[arg(long)]
    verbose: bool,

    /// Limit news topics if this parameter provided
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    limit: Option<u64>,

    /// Read news published on this day from the cache (no network)
    #[arg(long, value_name = "YYYYMMDD", value_parser = parse_date)]
    date: Option<NaiveDate>,

    /// Clean all data from the cache file
    #[arg(long)]
    clean: bool,

    /// Skip the --clean confirmation prompt
    #[arg(long, requires = "clean")]
    yes: bool,

    /// Cache database file (overrides cache_path from the config file)
    #[arg(long, value_name = "FILE")]
    cache: Option<PathBuf>,

    /// Config file [default: ~/.config/rss-reader/config.toml]
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    const MESSAGE: &str = "must be formatted as YYYYMMDD";
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MESSAGE.to_string());
    }
    NaiveDate::parse_from_str(s, "%Y%m%d").map_err(|_| MESSAGE.to_string())
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "error" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);
    tracing::debug!(?args, "Input arguments");

    if let Err(e) = run(args).await {
        eprintln!("Error: {e:#}");
        if e
            .downcast_ref::<PipelineError>()
            .is_some_and(PipelineError::is_retryable)
        {
            eprintln!("This looks temporary. Please try again later.");
        }
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => config_dir()?.join("config.toml"),
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config file '{}'", config_path.display()))?;

    let cache_path = match &args.cache {
        Some(path) => path.clone(),
        None => config.resolved_cache_path()?,
    };
    let store = CacheStore::open(&cache_path)
        .await
        .map_err(PipelineError::from)
        .with_context(|| format!("Failed to open news cache '{}'", cache_path.display()))?;

    let limit = args.limit.map(|l| usize::try_from(l).unwrap_or(usize::MAX));

    if args.clean {
        return clean(&store, &cache_path, args.yes).await;
    }

    let rendered = if let Some(date) = args.date {
        let retrieval = pipeline::load_cached(&store, date, args.source.as_deref(), limit).await?;
        if retrieval.records.is_empty() {
            anyhow::bail!(
                "No news found in cache for {}",
                output::human_date(&retrieval)
            );
        }
        if args.json {
            output::cached_json(&retrieval)?
        } else {
            output::cached_text(&retrieval)
        }
    } else {
        let source = args
            .source
            .as_deref()
            .context("An RSS source URL is required")?;
        let fetcher = Fetcher::new(&config).map_err(PipelineError::from)?;
        let ingestion = pipeline::ingest(&fetcher, &store, source, limit).await?;
        tracing::info!(
            changed = ingestion.counts.changed,
            unchanged = ingestion.counts.unchanged,
            "News saved to cache"
        );
        if args.json {
            output::feed_json(&ingestion)?
        } else {
            output::feed_text(&ingestion)
        }
    };

    println!("{rendered}");
    store.close().await;
    Ok(())
}

async fn clean(store: &CacheStore, cache_path: &Path, skip_prompt: bool) -> Result<()> {
    tracing::warn!(path = %cache_path.display(), "User requested to clean cache file");

    if !skip_prompt && !confirm_clean(cache_path)? {
        tracing::warn!("Cache clean cancelled by user");
        println!("Operation cancelled");
        return Ok(());
    }

    let removed = store.clean().await.map_err(PipelineError::from)?;
    println!("All data from cache file cleaned successfully ({removed} news items removed)");
    store.close().await;
    Ok(())
}

fn confirm_clean(cache_path: &Path) -> Result<bool> {
    println!(
        "Are you sure you want to clean all data from cache file '{}'? \
         Press 'y' to confirm or any other key to cancel.",
        cache_path.display()
    );
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}
