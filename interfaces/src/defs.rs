use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Read-only knobs consulted by content builders when deciding whether they
/// apply to the current dashboard request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    pub news_enabled: bool,
    pub news_feed_urls: Vec<String>,
    pub reddit_enabled: bool,
    pub reddit_access_token: Option<String>,
    /// Subreddit whose hot links are shown; the front page when absent.
    pub subreddit: Option<String>,
    pub link_limit: u32,
    pub allow_over_18: bool,
}

impl Settings {
    pub fn has_reddit_credentials(&self) -> bool {
        self.reddit_access_token
            .as_deref()
            .map(|token| !token.trim().is_empty())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub guid: Option<String>,
    pub title: String,
    pub url: String,
    pub summary: Option<String>,
    pub source: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedditUser {
    pub name: String,
    pub link_karma: i64,
    pub comment_karma: i64,
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subreddit {
    pub name: String,
    pub title: String,
    pub url: String,
    pub subscribers: u64,
    pub over_18: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub title: String,
    pub url: String,
    pub permalink: String,
    pub subreddit: String,
    pub score: i64,
    pub num_comments: u64,
    pub over_18: bool,
    pub thumbnail: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// A fault observed somewhere in the dashboard, stamped with when it happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub id: Uuid,
    pub source: String,
    pub message: String,
    pub observed_at: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn new(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            message: message.into(),
            observed_at: Utc::now(),
        }
    }
}

// Object style note:
// Sinks are shared by every builder of every pass, so they take `&self` and
// do their own locking. Recording is fire-and-forget: an implementation must
// swallow its own failures rather than hand them back to the caller.

pub trait ErrorSink: Send + Sync {
    fn record(&self, record: ErrorRecord);

    /// Every record still retained, oldest first.
    fn list(&self) -> Vec<ErrorRecord>;

    fn record_error(&self, source: &str, error: &dyn std::error::Error) {
        self.record(ErrorRecord::new(source, error.to_string()));
    }
}
