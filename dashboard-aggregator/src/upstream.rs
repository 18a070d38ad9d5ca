use crate::rate_limit::RateLimitSample;
use crate::traits::UpstreamClient;
use crate::types::{AggregatorError, FetchConfig, Result, UpstreamResponse};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Timelike, Utc};
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};
use url::Url;

pub const USED_HEADER: &str = "x-ratelimit-used";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";

// Upstream windows are minutes long; anything past a day is garbage.
const MAX_RESET_SECONDS: f64 = 86_400.0;

/// reqwest-backed client for the Reddit OAuth API.
pub struct HttpUpstream {
    client: Client,
    base_url: Url,
}

impl HttpUpstream {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;
        let base_url = Url::parse(&config.reddit_base_url)?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl UpstreamClient for HttpUpstream {
    async fn get(&self, resource: &str, access_token: &str) -> Result<UpstreamResponse> {
        let url = self.base_url.join(resource)?;
        debug!("Calling upstream: {}", url);

        let response = self.client.get(url).bearer_auth(access_token).send().await?;
        let received_at = Utc::now();
        let status = response.status();

        let headers = response.headers();

        if !status.is_success() {
            // Only a rejection that actually reports the quota may move the tracker
            let sample = has_telemetry(headers).then(|| sample_from_headers(headers, received_at));
            let reason = status_line(status);
            let resource = resource.to_string();

            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(AggregatorError::Authorization {
                    resource,
                    reason,
                    sample,
                });
            }
            return Err(AggregatorError::Protocol {
                resource,
                reason,
                sample,
            });
        }

        let sample = sample_from_headers(headers, received_at);
        let body = response.text().await?;

        Ok(UpstreamResponse { body, sample })
    }
}

pub fn status_line(status: StatusCode) -> String {
    format!("{} {}", status.as_u16(), status.canonical_reason().unwrap_or("Unknown"))
}

/// Whether the response carries any rate-limit header at all.
pub fn has_telemetry(headers: &HeaderMap) -> bool {
    [USED_HEADER, REMAINING_HEADER, RESET_HEADER]
        .iter()
        .any(|name| headers.contains_key(*name))
}

/// Read rate-limit telemetry off a response. Missing or malformed headers
/// fall back to used 0, remaining 0 and no reset time.
///
/// The reset header counts whole seconds from the moment the upstream
/// answered, so `reset_at` is rounded up to the next whole second. Responses
/// from the same window then agree on it despite sub-second receipt jitter.
pub fn sample_from_headers(headers: &HeaderMap, received_at: DateTime<Utc>) -> RateLimitSample {
    let used = header_number(headers, USED_HEADER).unwrap_or(0.0);
    let remaining = header_number(headers, REMAINING_HEADER).unwrap_or(0.0);
    let reset_at = header_number(headers, RESET_HEADER)
        .map(|secs| secs.min(MAX_RESET_SECONDS))
        .and_then(|secs| received_at.checked_add_signed(Duration::seconds(secs as i64)))
        .map(round_up_to_second);

    RateLimitSample {
        used: clamp_count(used),
        remaining: clamp_count(remaining),
        reset_at,
        received_at,
    }
}

fn round_up_to_second(at: DateTime<Utc>) -> DateTime<Utc> {
    let truncated = at.with_nanosecond(0).unwrap_or(at);
    if truncated < at {
        truncated + Duration::seconds(1)
    } else {
        truncated
    }
}

fn header_number(headers: &HeaderMap, name: &str) -> Option<f64> {
    let raw = headers.get(name)?;
    let parsed = raw
        .to_str()
        .ok()
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite() && *value >= 0.0);

    if parsed.is_none() {
        warn!("Ignoring malformed {} header: {:?}", name, raw);
    }
    parsed.map(f64::floor)
}

fn clamp_count(value: f64) -> u32 {
    value.min(u32::MAX as f64) as u32
}
