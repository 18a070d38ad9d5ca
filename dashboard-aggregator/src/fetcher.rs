use crate::rate_limit::RateLimitTracker;
use crate::traits::UpstreamClient;
use crate::types::{AggregatorError, ErrorSink, FetchConfig, FetchOutcome, Result};
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use url::Url;

/// Performs single logical calls against the rate-limited upstream, under the
/// guard of the shared tracker.
pub struct RateLimitedFetcher {
    upstream: Arc<dyn UpstreamClient>,
    tracker: Arc<RateLimitTracker>,
    errors: Arc<dyn ErrorSink>,
}

impl RateLimitedFetcher {
    pub fn new(
        upstream: Arc<dyn UpstreamClient>,
        tracker: Arc<RateLimitTracker>,
        errors: Arc<dyn ErrorSink>,
    ) -> Self {
        Self {
            upstream,
            tracker,
            errors,
        }
    }

    pub fn tracker(&self) -> &Arc<RateLimitTracker> {
        &self.tracker
    }

    /// Fetch `resource` and decode it as `T`, spending `cost` calls of quota.
    ///
    /// Never returns an error: exhausted quota yields `Skipped`, and upstream
    /// or decode faults are recorded in the error sink and yield `Failed`.
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        resource: &str,
        access_token: &str,
        cost: u32,
    ) -> FetchOutcome<T> {
        if self.tracker.would_exceed(cost) {
            info!("Skipping {}: {} call(s) would exceed the upstream rate limit", resource, cost);
            return FetchOutcome::Skipped;
        }

        let response = match self.upstream.get(resource, access_token).await {
            Ok(response) => response,
            Err(e) => return self.fail(resource, e),
        };

        self.tracker.merge(response.sample);

        match serde_json::from_str::<T>(&response.body) {
            Ok(payload) => {
                debug!("Fetched {} ({} bytes)", resource, response.body.len());
                FetchOutcome::Fetched(payload)
            }
            Err(e) => self.fail(resource, AggregatorError::Decode(e)),
        }
    }

    fn fail<T>(&self, resource: &str, error: AggregatorError) -> FetchOutcome<T> {
        // A rejection can still report the quota, often exactly when it is exhausted
        if let Some(sample) = error.rate_limit_sample() {
            self.tracker.merge(sample);
        }
        if error.is_authorization() {
            warn!("Upstream rejected credentials for {}: {}", resource, error);
        } else {
            warn!("Upstream call {} failed: {}", resource, error);
        }
        self.errors.record_error(&format!("upstream {}", resource), &error);
        FetchOutcome::Failed(error)
    }
}

/// Downloads news feed documents. Feeds are not quota-limited, so transient
/// failures are retried with exponential backoff.
pub struct FeedFetcher {
    client: Client,
    config: FetchConfig,
}

impl FeedFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self { client, config })
    }

    pub async fn fetch_feed(&self, url: &str) -> Result<String> {
        let start_time = Instant::now();
        let parsed_url = Url::parse(url)?;
        if parsed_url.scheme() != "http" && parsed_url.scheme() != "https" {
            return Err(AggregatorError::General(format!("Unsupported feed URL scheme: {}", url)));
        }

        debug!("Fetching feed: {}", url);

        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: Duration::from_secs(self.config.retry_delay_seconds),
            initial_interval: Duration::from_secs(self.config.retry_delay_seconds),
            max_interval: Duration::from_secs(self.config.retry_delay_seconds * 32),
            multiplier: 2.0,
            max_elapsed_time: Some(Duration::from_secs(self.config.retry_delay_seconds * 60)),
            ..Default::default()
        };

        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match self.client.get(parsed_url.clone()).send().await {
                Ok(response) => {
                    let status = response.status();

                    if !status.is_success() {
                        last_error = Some(AggregatorError::Protocol {
                            resource: url.to_string(),
                            reason: crate::upstream::status_line(status),
                            sample: None,
                        });
                    } else {
                        if let Some(content_length) = response.content_length() {
                            let size_mb = content_length as usize / (1024 * 1024);
                            if size_mb > self.config.max_feed_size_mb {
                                return Err(AggregatorError::FeedTooLarge { size_mb });
                            }
                        }

                        match response.text().await {
                            Ok(content) => {
                                info!(
                                    "Fetched feed {} ({} bytes in {}ms)",
                                    url,
                                    content.len(),
                                    start_time.elapsed().as_millis()
                                );
                                return Ok(content);
                            }
                            Err(e) => {
                                last_error = Some(AggregatorError::Http(e));
                            }
                        }
                    }
                }
                Err(e) => {
                    last_error = Some(AggregatorError::Http(e));
                }
            }

            if attempt < self.config.max_retries {
                if let Some(delay) = backoff.next_backoff() {
                    warn!("Attempt {} failed for {}, retrying in {:?}", attempt + 1, url, delay);
                    tokio::time::sleep(delay).await;
                    continue;
                }
            }
            break;
        }

        error!("Failed to fetch feed after {} attempt(s): {}", self.config.max_retries + 1, url);
        Err(last_error.unwrap_or_else(|| AggregatorError::General(format!("Failed to fetch feed {}", url))))
    }
}
