use anyhow::{Context, Result};
use clap::Parser;
use feedfinder::{FeedFinder, FinderConfig};
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "feedfinder",
    version,
    about = "Find the Atom/RSS feeds a web page advertises"
)]
struct Args {
    /// Page to inspect
    url: String,

    /// Read settings from a TOML file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// User-Agent header to send
    #[arg(long, value_name = "UA")]
    user_agent: Option<String>,

    /// Base URL for a relative page URL
    #[arg(long, value_name = "URL")]
    base: Option<String>,

    /// Anchor keyword for the fallback pass (repeatable, replaces the defaults)
    #[arg(long = "keyword", value_name = "KEYWORD")]
    keywords: Vec<String>,

    /// Only report <link rel="alternate"> feeds, never guess from anchors
    #[arg(long)]
    no_fallback: bool,

    /// Do not treat a URL that serves a feed as its own result
    #[arg(long)]
    no_direct: bool,

    /// Refuse localhost and private network addresses
    #[arg(long)]
    block_private: bool,

    /// Print a JSON array instead of one URL per line
    #[arg(long)]
    json: bool,
}

impl Args {
    /// File settings (or defaults) with command-line flags layered on top.
    fn finder_config(&self) -> Result<FinderConfig> {
        let mut config = match &self.config {
            Some(path) => FinderConfig::load(path)
                .with_context(|| format!("Failed to load config file '{}'", path.display()))?,
            None => FinderConfig::default(),
        };

        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(user_agent) = &self.user_agent {
            config.user_agent = user_agent.clone();
        }
        if let Some(base) = &self.base {
            config.base_url = Some(base.clone());
        }
        if !self.keywords.is_empty() {
            config.anchor_keywords = self.keywords.clone();
        }
        if self.no_fallback {
            config.anchor_fallback = false;
        }
        if self.no_direct {
            config.detect_direct_feed = false;
        }
        if self.block_private {
            config.block_private_hosts = true;
        }

        config.validate().context("Invalid settings")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries only the discovered URLs
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.finder_config()?;

    let finder = FeedFinder::new(config).context("Failed to create HTTP client")?;
    let feeds = finder
        .discover(&args.url)
        .await
        .with_context(|| format!("Feed discovery failed for '{}'", args.url))?;

    tracing::info!(url = %args.url, count = feeds.len(), "Discovered feeds");

    let mut stdout = std::io::stdout().lock();
    if args.json {
        let urls: Vec<&str> = feeds.iter().map(|u| u.as_str()).collect();
        serde_json::to_writer(&mut stdout, &urls).context("Failed to write JSON")?;
        writeln!(stdout)?;
    } else {
        for feed in &feeds {
            writeln!(stdout, "{feed}")?;
        }
    }
    stdout.flush()?;

    Ok(())
}
