use crate::aggregator::DashboardDraft;
use crate::types::{Result, Settings, UpstreamResponse};
use async_trait::async_trait;

/// Trait for issuing authenticated calls against the rate-limited upstream API
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Perform one GET against `resource`, a path (and query) relative to the
    /// upstream base URL.
    ///
    /// Rejected credentials come back as `AggregatorError::Authorization`,
    /// any other non-success status as `AggregatorError::Protocol`.
    async fn get(&self, resource: &str, access_token: &str) -> Result<UpstreamResponse>;
}

/// Trait for one content source feeding a slot of the dashboard
#[async_trait]
pub trait ContentBuilder: Send + Sync {
    /// Human-readable name, used in logs and error records
    fn name(&self) -> String;

    /// Whether this source should run for the given settings
    fn is_applicable(&self, settings: &Settings) -> bool;

    /// Fetch content and write it into the builder's own slot(s) of `draft`.
    /// The draft belongs to this run alone and is discarded if it fails.
    async fn build(&self, settings: &Settings, draft: &DashboardDraft) -> Result<()>;
}
