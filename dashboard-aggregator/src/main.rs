use anyhow::Context;
use clap::Parser;
use dashboard_aggregator::{DashboardAggregator, FetchConfig, RateLimitTracker, Settings};
use futures::future::join_all;
use interfaces::MemoryErrorSink;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dashboard-aggregator", about = "Builds one dashboard from Reddit and news feeds and prints it as JSON")]
struct Args {
    /// OAuth bearer token for the Reddit API
    #[arg(long, env = "REDDIT_ACCESS_TOKEN", hide_env_values = true)]
    reddit_token: Option<String>,

    /// Subreddit for the link list (front page when omitted)
    #[arg(long, env = "REDDIT_SUBREDDIT")]
    subreddit: Option<String>,

    #[arg(long, default_value_t = 25)]
    link_limit: u32,

    #[arg(long)]
    allow_over_18: bool,

    #[arg(long)]
    no_reddit: bool,

    /// News feed URL; repeat or comma-separate for several
    #[arg(long = "feed", env = "NEWS_FEEDS", value_delimiter = ',')]
    feeds: Vec<String>,

    #[arg(long)]
    no_news: bool,

    #[arg(long, env = "REDDIT_BASE_URL", default_value = "https://oauth.reddit.com")]
    reddit_base_url: String,

    /// Concurrent aggregation passes sharing one rate-limit tracker
    #[arg(long, default_value_t = 1)]
    passes: usize,

    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    info!("Starting dashboard aggregator");

    let config = FetchConfig {
        reddit_base_url: args.reddit_base_url.clone(),
        ..FetchConfig::default()
    };

    let settings = Settings {
        news_enabled: !args.no_news,
        news_feed_urls: args.feeds.clone(),
        reddit_enabled: !args.no_reddit,
        reddit_access_token: args.reddit_token.clone(),
        subreddit: args.subreddit.clone(),
        link_limit: args.link_limit,
        allow_over_18: args.allow_over_18,
    };

    if settings.reddit_enabled && !settings.has_reddit_credentials() {
        warn!("No Reddit token given; Reddit content will be skipped");
    }

    let tracker = Arc::new(RateLimitTracker::from_config(&config));
    let errors = Arc::new(MemoryErrorSink::new());
    let aggregator = DashboardAggregator::with_default_sources(&config, tracker.clone(), errors)
        .context("Failed to set up content sources")?;

    let passes = args.passes.max(1);
    let dashboards = join_all((0..passes).map(|_| aggregator.aggregate(&settings))).await;

    let window = tracker.snapshot();
    info!(
        "Reddit quota after {} pass(es): used={} remaining={} reset_at={}",
        passes, window.used, window.remaining, window.reset_at
    );

    for dashboard in dashboards {
        let json = if args.pretty {
            serde_json::to_string_pretty(&dashboard)
        } else {
            serde_json::to_string(&dashboard)
        }
        .context("Failed to serialize dashboard")?;
        println!("{}", json);
    }

    info!("Dashboard aggregator finished");
    Ok(())
}
