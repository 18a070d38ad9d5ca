use crate::fetcher::{FeedFetcher, RateLimitedFetcher};
use crate::rate_limit::RateLimitTracker;
use crate::sources::{NewsContentBuilder, RedditContentBuilder};
use crate::traits::ContentBuilder;
use crate::types::{
    AggregatorError, ErrorRecord, ErrorSink, FetchConfig, Link, NewsItem, RedditUser, Result,
    Settings, Subreddit,
};
use crate::upstream::HttpUpstream;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info};

/// The in-progress dashboard of one aggregation pass. Each slot can be filled
/// once; a second write is rejected instead of silently replacing content.
#[derive(Debug, Default)]
pub struct DashboardDraft {
    news: OnceLock<Vec<NewsItem>>,
    user: OnceLock<RedditUser>,
    subreddits: OnceLock<Vec<Subreddit>>,
    links: OnceLock<Vec<Link>>,
}

impl DashboardDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_news(&self, items: Vec<NewsItem>) -> Result<()> {
        self.news
            .set(items)
            .map_err(|_| AggregatorError::SlotAlreadyFilled { slot: "news" })
    }

    pub fn set_user(&self, user: RedditUser) -> Result<()> {
        self.user
            .set(user)
            .map_err(|_| AggregatorError::SlotAlreadyFilled { slot: "user" })
    }

    pub fn set_subreddits(&self, subreddits: Vec<Subreddit>) -> Result<()> {
        self.subreddits
            .set(subreddits)
            .map_err(|_| AggregatorError::SlotAlreadyFilled { slot: "subreddits" })
    }

    pub fn set_links(&self, links: Vec<Link>) -> Result<()> {
        self.links
            .set(links)
            .map_err(|_| AggregatorError::SlotAlreadyFilled { slot: "links" })
    }

    /// Commit every slot `other` filled. Nothing is taken when any of those
    /// slots is already filled here.
    pub fn absorb(&self, other: DashboardDraft) -> Result<()> {
        let DashboardDraft {
            news,
            user,
            subreddits,
            links,
        } = other;
        let (news, user, subreddits, links) = (
            news.into_inner(),
            user.into_inner(),
            subreddits.into_inner(),
            links.into_inner(),
        );

        let taken = [
            ("news", news.is_some() && self.news.get().is_some()),
            ("user", user.is_some() && self.user.get().is_some()),
            ("subreddits", subreddits.is_some() && self.subreddits.get().is_some()),
            ("links", links.is_some() && self.links.get().is_some()),
        ];
        if let Some((slot, _)) = taken.into_iter().find(|(_, clash)| *clash) {
            return Err(AggregatorError::SlotAlreadyFilled { slot });
        }

        if let Some(items) = news {
            self.set_news(items)?;
        }
        if let Some(user) = user {
            self.set_user(user)?;
        }
        if let Some(subreddits) = subreddits {
            self.set_subreddits(subreddits)?;
        }
        if let Some(links) = links {
            self.set_links(links)?;
        }
        Ok(())
    }

    pub fn snapshot(&self, errors: Vec<ErrorRecord>) -> Dashboard {
        Dashboard {
            news: self.news.get().cloned(),
            user: self.user.get().cloned(),
            subreddits: self.subreddits.get().cloned(),
            links: self.links.get().cloned(),
            errors,
            generated_at: Utc::now(),
        }
    }
}

/// Final, immutable result of one aggregation pass. A slot is `None` when no
/// builder produced it; `errors` is always present.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub news: Option<Vec<NewsItem>>,
    pub user: Option<RedditUser>,
    pub subreddits: Option<Vec<Subreddit>>,
    pub links: Option<Vec<Link>>,
    pub errors: Vec<ErrorRecord>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum BuilderState {
    NotEvaluated,
    Skipped,
    Running,
    Completed,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct BuilderReport {
    pub name: String,
    pub state: BuilderState,
}

/// Fans a dashboard request out to every applicable content builder and
/// gathers whatever they produce into one `Dashboard`.
pub struct DashboardAggregator {
    builders: Vec<Arc<dyn ContentBuilder>>,
    errors: Arc<dyn ErrorSink>,
}

impl DashboardAggregator {
    pub fn new(errors: Arc<dyn ErrorSink>) -> Self {
        Self {
            builders: Vec::new(),
            errors,
        }
    }

    /// Reddit and news builders wired to real HTTP clients. `tracker` should be
    /// the one process-wide tracker for the Reddit API.
    pub fn with_default_sources(
        config: &FetchConfig,
        tracker: Arc<RateLimitTracker>,
        errors: Arc<dyn ErrorSink>,
    ) -> Result<Self> {
        let upstream = Arc::new(HttpUpstream::new(config)?);
        let reddit_fetcher = Arc::new(RateLimitedFetcher::new(upstream, tracker, errors.clone()));
        let feed_fetcher = Arc::new(FeedFetcher::new(config.clone())?);

        Ok(Self::new(errors)
            .with_builder(Arc::new(NewsContentBuilder::new(feed_fetcher, config.max_news_items)))
            .with_builder(Arc::new(RedditContentBuilder::new(reddit_fetcher))))
    }

    pub fn add_builder(&mut self, builder: Arc<dyn ContentBuilder>) {
        info!("Adding content builder: {}", builder.name());
        self.builders.push(builder);
    }

    pub fn with_builder(mut self, builder: Arc<dyn ContentBuilder>) -> Self {
        self.add_builder(builder);
        self
    }

    pub fn builder_count(&self) -> usize {
        self.builders.len()
    }

    pub async fn aggregate(&self, settings: &Settings) -> Dashboard {
        self.aggregate_with_report(settings).await.0
    }

    /// Run one aggregation pass. Never fails: a builder that errors or panics
    /// is recorded in the error sink and its slot stays empty.
    pub async fn aggregate_with_report(&self, settings: &Settings) -> (Dashboard, Vec<BuilderReport>) {
        let settings = Arc::new(settings.clone());
        let draft = DashboardDraft::new();

        let mut reports: Vec<BuilderReport> = self
            .builders
            .iter()
            .map(|builder| BuilderReport {
                name: builder.name(),
                state: BuilderState::NotEvaluated,
            })
            .collect();

        let mut tasks = Vec::new();
        for (index, builder) in self.builders.iter().enumerate() {
            if !builder.is_applicable(&settings) {
                debug!("Skipping builder {}: not applicable", reports[index].name);
                reports[index].state = BuilderState::Skipped;
                continue;
            }

            let builder = builder.clone();
            let settings = settings.clone();
            reports[index].state = BuilderState::Running;
            // Each builder writes into its own draft; only a completed one is committed
            tasks.push((
                index,
                tokio::spawn(async move {
                    let own = DashboardDraft::new();
                    builder.build(&settings, &own).await.map(|()| own)
                }),
            ));
        }

        for (index, handle) in tasks {
            let name = reports[index].name.clone();
            let failure = match handle.await {
                Ok(Ok(own)) => draft.absorb(own).err(),
                Ok(Err(e)) => Some(e),
                Err(join_error) => Some(AggregatorError::BuilderPanicked {
                    name: name.clone(),
                    reason: join_error.to_string(),
                }),
            };

            reports[index].state = match failure {
                None => {
                    debug!("Builder {} completed", name);
                    BuilderState::Completed
                }
                Some(e) => {
                    error!("Builder {} failed: {}", name, e);
                    self.errors.record_error(&name, &e);
                    BuilderState::Failed(e.to_string())
                }
            };
        }

        let dashboard = draft.snapshot(self.errors.list());

        let completed = reports
            .iter()
            .filter(|r| r.state == BuilderState::Completed)
            .count();
        info!(
            "Aggregation pass finished: {}/{} builders completed, {} error(s) on record",
            completed,
            reports.len(),
            dashboard.errors.len()
        );

        (dashboard, reports)
    }
}
