pub mod types;
pub mod rate_limit;
pub mod traits;
pub mod upstream;
pub mod fetcher;
pub mod parser;
pub mod sources;
pub mod aggregator;

pub use types::*;
pub use rate_limit::{MergeOutcome, RateLimitSample, RateLimitTracker, RateLimitWindow};
pub use traits::{ContentBuilder, UpstreamClient};
pub use upstream::HttpUpstream;
pub use fetcher::{FeedFetcher, RateLimitedFetcher};
pub use parser::FeedParser;
pub use sources::{NewsContentBuilder, RedditContentBuilder};
pub use aggregator::{BuilderReport, BuilderState, Dashboard, DashboardAggregator, DashboardDraft};
