//! robots-warden main entry point
//!
//! Fetches a list of URLs through the robots-aware client.

use clap::Parser;
use futures::stream::{self, StreamExt};
use reqwest::{Method, Request, Url};
use robots_warden::config::{load_config_with_hash, Config};
use robots_warden::{ClientError, RobotsClient};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// robots-warden: robots.txt enforcement for HTTP clients
///
/// Every URL is checked against the robots.txt of its host before it is
/// fetched. Disallowed URLs are reported instead of fetched and crawl-delays
/// are honoured.
#[derive(Parser, Debug)]
#[command(name = "robots-warden")]
#[command(version = "1.0.0")]
#[command(about = "Fetch URLs while obeying robots.txt", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// URLs to fetch
    #[arg(value_name = "URL", required_unless_present = "dry_run")]
    urls: Vec<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the effective settings without fetching
    #[arg(long)]
    dry_run: bool,

    /// Maximum number of requests in flight
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u16).range(1..))]
    concurrency: u16,
}

#[tokio::main]
async fn main() -> robots_warden::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config, &cli.urls);
        return Ok(());
    }

    // Reject malformed URLs before anything is fetched
    let urls = cli
        .urls
        .iter()
        .map(String::as_str)
        .map(Url::parse)
        .collect::<Result<Vec<_>, _>>()?;

    handle_fetch(&config, urls, usize::from(cli.concurrency)).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("robots_warden=info,warn"),
            1 => EnvFilter::new("robots_warden=debug,info"),
            2 => EnvFilter::new("robots_warden=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config, urls: &[String]) {
    println!("=== robots-warden Dry Run ===\n");

    println!("Robots Cache:");
    println!("  Capacity: {} hosts", config.cache.capacity);
    println!("  Eviction fraction: {}", config.cache.eviction_fraction);

    println!("\nCrawl Delay:");
    match config.crawl_delay.default {
        Some(seconds) => println!("  Default: {}s", seconds),
        None => println!("  Default: none"),
    }
    match config.crawl_delay.override_delay {
        Some(seconds) => println!("  Override: {}s", seconds),
        None => println!("  Override: none"),
    }

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nHTTP:");
    println!("  Timeout: {}s", config.http.timeout_secs);
    println!("  Connect timeout: {}s", config.http.connect_timeout_secs);

    println!("\nURLs ({}):", urls.len());
    for url in urls {
        println!("  - {}", url);
    }

    println!("\n✓ Configuration is valid");
}

/// Fetches every URL through one robots-aware client
async fn handle_fetch(
    config: &Config,
    urls: Vec<Url>,
    concurrency: usize,
) -> robots_warden::Result<()> {
    let client = RobotsClient::from_config(config)?;
    tracing::info!(
        "Fetching {} URLs ({} at a time)",
        urls.len(),
        concurrency
    );

    let mut fetched = 0usize;
    let mut denied = 0usize;
    let mut failed = 0usize;

    let mut results = stream::iter(urls)
        .map(|url| {
            let client = &client;
            async move {
                let result = client.execute(Request::new(Method::GET, url.clone())).await;
                (url, result)
            }
        })
        .buffer_unordered(concurrency);

    while let Some((url, result)) = results.next().await {
        match result {
            Ok(response) => {
                fetched += 1;
                println!("{} {}", response.status().as_u16(), url);
            }
            Err(e @ ClientError::Denied { .. }) => {
                denied += 1;
                println!("DENIED {} ({})", url, e);
            }
            Err(e) => {
                failed += 1;
                tracing::error!("Failed to fetch {}: {}", url, e);
                println!("ERROR {} ({})", url, e);
            }
        }
    }
    drop(results);

    client.close();
    tracing::info!(
        "Done: {} fetched, {} denied, {} failed",
        fetched,
        denied,
        failed
    );

    Ok(())
}
