use crate::aggregator::DashboardDraft;
use crate::fetcher::RateLimitedFetcher;
use crate::traits::ContentBuilder;
use crate::types::{AggregatorError, Link, RedditUser, Result, Settings, Subreddit};
use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

pub const IDENTITY_RESOURCE: &str = "/api/v1/me";
pub const SUBSCRIPTIONS_RESOURCE: &str = "/subreddits/mine/subscriber?limit=100&raw_json=1";

const REDDIT_WEB_URL: &str = "https://www.reddit.com";
const MAX_LINK_LIMIT: u32 = 100;

/// Reddit's paging wrapper: `{"kind": "Listing", "data": {"children": [{"kind", "data"}]}}`.
#[derive(Debug, Deserialize)]
pub struct Listing<T> {
    pub data: ListingData<T>,
}

#[derive(Debug, Deserialize)]
pub struct ListingData<T> {
    #[serde(default = "Vec::new")]
    pub children: Vec<Thing<T>>,
    #[serde(default)]
    pub after: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Thing<T> {
    pub data: T,
}

impl<T> Listing<T> {
    /// Unwrap the listing and project every child into the dashboard's type.
    pub fn map<U, F: FnMut(T) -> U>(self, projection: F) -> Vec<U> {
        self.data
            .children
            .into_iter()
            .map(|thing| thing.data)
            .map(projection)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct RawAccount {
    pub name: String,
    #[serde(default)]
    pub link_karma: i64,
    #[serde(default)]
    pub comment_karma: i64,
    #[serde(default)]
    pub icon_img: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawSubreddit {
    pub display_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub subscribers: Option<u64>,
    #[serde(default)]
    pub over18: bool,
}

#[derive(Debug, Deserialize)]
pub struct RawLink {
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub subreddit: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: u64,
    #[serde(default)]
    pub over_18: bool,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub created_utc: Option<f64>,
}

impl From<RawAccount> for RedditUser {
    fn from(raw: RawAccount) -> Self {
        Self {
            name: raw.name,
            link_karma: raw.link_karma,
            comment_karma: raw.comment_karma,
            icon_url: raw.icon_img.filter(|url| url.starts_with("http")),
        }
    }
}

impl From<RawSubreddit> for Subreddit {
    fn from(raw: RawSubreddit) -> Self {
        Self {
            name: raw.display_name,
            title: raw.title,
            url: format!("{}{}", REDDIT_WEB_URL, raw.url),
            subscribers: raw.subscribers.unwrap_or(0),
            over_18: raw.over18,
        }
    }
}

impl From<RawLink> for Link {
    fn from(raw: RawLink) -> Self {
        let permalink = format!("{}{}", REDDIT_WEB_URL, raw.permalink);
        Self {
            title: raw.title,
            url: raw.url.unwrap_or_else(|| permalink.clone()),
            permalink,
            subreddit: raw.subreddit,
            score: raw.score,
            num_comments: raw.num_comments,
            over_18: raw.over_18,
            // "self", "default", "nsfw" and friends are placeholders, not images
            thumbnail: raw.thumbnail.filter(|t| t.starts_with("http")),
            created_at: raw
                .created_utc
                .and_then(|secs| DateTime::from_timestamp(secs as i64, 0)),
        }
    }
}

/// Resource for the hot links of the configured subreddit, or of the front
/// page when none is set.
pub fn links_resource(settings: &Settings) -> String {
    let limit = settings.link_limit.clamp(1, MAX_LINK_LIMIT);
    let subreddit = settings
        .subreddit
        .as_deref()
        .map(|s| s.trim().trim_start_matches('/').trim_start_matches("r/").trim_matches('/'))
        .filter(|s| !s.is_empty());

    match subreddit {
        Some(name) => format!("/r/{}/hot?limit={}&raw_json=1", name, limit),
        None => format!("/hot?limit={}&raw_json=1", limit),
    }
}

/// Fills the user, subreddit and link slots from the Reddit API.
pub struct RedditContentBuilder {
    fetcher: Arc<RateLimitedFetcher>,
}

impl RedditContentBuilder {
    pub fn new(fetcher: Arc<RateLimitedFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl ContentBuilder for RedditContentBuilder {
    fn name(&self) -> String {
        "reddit".to_string()
    }

    fn is_applicable(&self, settings: &Settings) -> bool {
        settings.reddit_enabled && settings.has_reddit_credentials()
    }

    async fn build(&self, settings: &Settings, draft: &DashboardDraft) -> Result<()> {
        let token = settings
            .reddit_access_token
            .as_deref()
            .ok_or_else(|| AggregatorError::General("Missing Reddit access token".to_string()))?;
        let links_resource = links_resource(settings);

        // Three independent calls; each one that yields data fills its own slot.
        // Failures have already been recorded by the fetcher.
        let (account, subscriptions, links) = tokio::join!(
            self.fetcher.fetch::<RawAccount>(IDENTITY_RESOURCE, token, 1),
            self.fetcher.fetch::<Listing<RawSubreddit>>(SUBSCRIPTIONS_RESOURCE, token, 1),
            self.fetcher.fetch::<Listing<RawLink>>(&links_resource, token, 1),
        );

        if let Some(account) = account.into_option() {
            draft.set_user(account.into())?;
        }

        if let Some(listing) = subscriptions.into_option() {
            let mut subreddits = listing.map(Subreddit::from);
            subreddits.sort_by_key(|s| s.name.to_lowercase());
            info!("Loaded {} subscribed subreddits", subreddits.len());
            draft.set_subreddits(subreddits)?;
        }

        if let Some(listing) = links.into_option() {
            let links: Vec<Link> = listing
                .map(Link::from)
                .into_iter()
                .filter(|link| settings.allow_over_18 || !link.over_18)
                .collect();
            info!("Loaded {} links from {}", links.len(), links_resource);
            draft.set_links(links)?;
        }

        Ok(())
    }
}
