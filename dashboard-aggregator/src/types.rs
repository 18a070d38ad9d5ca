use crate::rate_limit::RateLimitSample;
// Use the interfaces crate for the shared domain objects
pub use interfaces::defs::{ErrorRecord, ErrorSink, Link, NewsItem, RedditUser, Settings, Subreddit};

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_feed_size_mb: usize,
    pub max_redirects: usize,
    pub reddit_base_url: String,
    pub rate_limit_capacity: u32,
    pub rate_limit_window_seconds: i64,
    pub max_news_items: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Dashboard-Aggregator/1.0".to_string(),
            timeout_seconds: 30,
            max_retries: 3,
            retry_delay_seconds: 5,
            max_feed_size_mb: 10,
            max_redirects: 5,
            reddit_base_url: "https://oauth.reddit.com".to_string(),
            rate_limit_capacity: 60,
            rate_limit_window_seconds: 60,
            max_news_items: 50,
        }
    }
}

/// A successful upstream response: the raw body plus the rate-limit telemetry
/// it carried.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub body: String,
    pub sample: RateLimitSample,
}

/// Result of one guarded upstream call.
///
/// `Skipped` means the tracker refused the call because it would exceed the
/// quota. That is an expected outcome, not an error, and is never reported.
/// `Failed` errors have already been handed to the error sink by the time the
/// caller sees them.
#[derive(Debug)]
pub enum FetchOutcome<T> {
    Skipped,
    Fetched(T),
    Failed(AggregatorError),
}

impl<T> FetchOutcome<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            FetchOutcome::Fetched(value) => Some(value),
            FetchOutcome::Skipped | FetchOutcome::Failed(_) => None,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> FetchOutcome<U> {
        match self {
            FetchOutcome::Skipped => FetchOutcome::Skipped,
            FetchOutcome::Fetched(value) => FetchOutcome::Fetched(f(value)),
            FetchOutcome::Failed(error) => FetchOutcome::Failed(error),
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, FetchOutcome::Skipped)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FetchOutcome::Failed(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// `sample` is the rate-limit telemetry the rejection carried, if any.
    #[error("Authorization rejected for {resource}: {reason}")]
    Authorization {
        resource: String,
        reason: String,
        sample: Option<RateLimitSample>,
    },

    #[error("Upstream error for {resource}: {reason}")]
    Protocol {
        resource: String,
        reason: String,
        sample: Option<RateLimitSample>,
    },

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Feed size exceeds limit: {size_mb}MB")]
    FeedTooLarge { size_mb: usize },

    #[error("Dashboard slot already filled: {slot}")]
    SlotAlreadyFilled { slot: &'static str },

    #[error("Builder {name} panicked: {reason}")]
    BuilderPanicked { name: String, reason: String },

    #[error("{} failures: {}", .0.len(), join_messages(.0))]
    Multiple(Vec<AggregatorError>),

    #[error("General error: {0}")]
    General(String),
}

impl AggregatorError {
    pub fn is_authorization(&self) -> bool {
        matches!(self, AggregatorError::Authorization { .. })
    }

    /// Rate-limit telemetry attached to a rejected upstream response.
    pub fn rate_limit_sample(&self) -> Option<RateLimitSample> {
        match self {
            AggregatorError::Authorization { sample, .. } | AggregatorError::Protocol { sample, .. } => *sample,
            _ => None,
        }
    }

    /// Folds a batch of faults from parallel work into one error, or `None`
    /// when the batch is empty.
    pub fn from_many(mut errors: Vec<AggregatorError>) -> Option<AggregatorError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(AggregatorError::Multiple(errors)),
        }
    }
}

fn join_messages(errors: &[AggregatorError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
