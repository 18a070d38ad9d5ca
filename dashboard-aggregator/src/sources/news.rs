use crate::aggregator::DashboardDraft;
use crate::fetcher::FeedFetcher;
use crate::parser::FeedParser;
use crate::traits::ContentBuilder;
use crate::types::{AggregatorError, NewsItem, Result, Settings};
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

/// Fills the news slot from the configured RSS/Atom feeds.
pub struct NewsContentBuilder {
    fetcher: Arc<FeedFetcher>,
    max_items: usize,
}

impl NewsContentBuilder {
    pub fn new(fetcher: Arc<FeedFetcher>, max_items: usize) -> Self {
        Self { fetcher, max_items }
    }
}

#[async_trait]
impl ContentBuilder for NewsContentBuilder {
    fn name(&self) -> String {
        "news".to_string()
    }

    fn is_applicable(&self, settings: &Settings) -> bool {
        settings.news_enabled && !settings.news_feed_urls.is_empty()
    }

    async fn build(&self, settings: &Settings, draft: &DashboardDraft) -> Result<()> {
        let downloads = join_all(settings.news_feed_urls.iter().map(|url| async move {
            (url, self.fetcher.fetch_feed(url).await)
        }))
        .await;

        let mut parser = FeedParser::new();
        let mut items: Vec<NewsItem> = Vec::new();
        let mut failures = Vec::new();

        for (url, download) in downloads {
            match download.and_then(|content| parser.parse_feed(&content)) {
                Ok(mut parsed) => items.append(&mut parsed),
                Err(e) => {
                    warn!("News feed {} failed: {}", url, e);
                    failures.push(e);
                }
            }
        }

        // Any failed feed fails the whole builder and leaves the slot empty
        if let Some(error) = AggregatorError::from_many(failures) {
            return Err(error);
        }

        // Newest first; undated items sink to the bottom
        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        items.truncate(self.max_items);

        info!(
            "Loaded {} news items from {} feed(s)",
            items.len(),
            settings.news_feed_urls.len()
        );
        draft.set_news(items)
    }
}
