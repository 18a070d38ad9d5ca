use crate::types::{AggregatorError, NewsItem, Result};
use feed_rs::parser;
use std::collections::HashSet;
use tracing::{debug, info};

/// Turns RSS/Atom documents into news items. One parser is meant to live for
/// one aggregation pass: entries already seen (by guid or link) in an earlier
/// document of the same pass are dropped.
pub struct FeedParser {
    seen_guids: HashSet<String>,
    seen_urls: HashSet<String>,
}

impl FeedParser {
    pub fn new() -> Self {
        Self {
            seen_guids: HashSet::new(),
            seen_urls: HashSet::new(),
        }
    }

    pub fn parse_feed(&mut self, content: &str) -> Result<Vec<NewsItem>> {
        debug!("Parsing feed content ({} bytes)", content.len());

        let feed = parser::parse(content.as_bytes())
            .map_err(|e| AggregatorError::Parse(format!("Failed to parse feed: {}", e)))?;

        let source = feed.title.map(|t| t.content);

        let mut items = Vec::new();
        for entry in feed.entries {
            if let Some(item) = self.parse_entry(entry, source.as_deref()) {
                items.push(item);
            }
        }

        info!(
            "Parsed feed {} with {} new entries",
            source.as_deref().unwrap_or("(untitled)"),
            items.len()
        );
        Ok(items)
    }

    fn parse_entry(&mut self, entry: feed_rs::model::Entry, source: Option<&str>) -> Option<NewsItem> {
        let title = entry.title.map(|t| t.content).unwrap_or_else(|| "Untitled".to_string());

        // Entries without a link have nothing to point the dashboard at
        let url = entry.links.first()?.href.clone();

        let guid = if !entry.id.is_empty() {
            Some(entry.id.clone())
        } else {
            None
        };

        if let Some(ref guid) = guid {
            if self.seen_guids.contains(guid) {
                debug!("Skipping duplicate entry with GUID: {}", guid);
                return None;
            }
        }

        if self.seen_urls.contains(&url) {
            debug!("Skipping duplicate entry with URL: {}", url);
            return None;
        }

        if let Some(ref guid) = guid {
            self.seen_guids.insert(guid.clone());
        }
        self.seen_urls.insert(url.clone());

        let summary = entry
            .summary
            .map(|s| s.content)
            .or_else(|| entry.content.and_then(|c| c.body));

        Some(NewsItem {
            guid,
            title,
            url,
            summary,
            source: source.map(|s| s.to_string()),
            published_at: entry.published.or(entry.updated),
        })
    }

    pub fn get_cache_stats(&self) -> (usize, usize) {
        (self.seen_guids.len(), self.seen_urls.len())
    }
}

impl Default for FeedParser {
    fn default() -> Self {
        Self::new()
    }
}
