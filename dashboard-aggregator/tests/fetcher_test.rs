use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashboard_aggregator::{
    AggregatorError, FetchConfig, FetchOutcome, HttpUpstream, RateLimitSample, RateLimitTracker,
    RateLimitWindow, RateLimitedFetcher, Result, UpstreamClient, UpstreamResponse,
};
use interfaces::{ErrorSink, MemoryErrorSink};
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize, PartialEq)]
struct Greeting {
    message: String,
}

enum Reply {
    Body(&'static str, u32, u32),
    Unauthorized,
    ServerError,
}

struct FakeUpstream {
    reply: Reply,
    calls: AtomicUsize,
}

impl FakeUpstream {
    fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpstreamClient for FakeUpstream {
    async fn get(&self, resource: &str, _access_token: &str) -> Result<UpstreamResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.reply {
            Reply::Body(body, used, remaining) => Ok(UpstreamResponse {
                body: body.to_string(),
                sample: RateLimitSample {
                    used,
                    remaining,
                    reset_at: None,
                    received_at: Utc::now(),
                },
            }),
            Reply::Unauthorized => Err(AggregatorError::Authorization {
                resource: resource.to_string(),
                reason: "401 Unauthorized".to_string(),
                sample: None,
            }),
            Reply::ServerError => Err(AggregatorError::Protocol {
                resource: resource.to_string(),
                reason: "500 Internal Server Error".to_string(),
                sample: None,
            }),
        }
    }
}

fn tracker_with_remaining(remaining: u32) -> Arc<RateLimitTracker> {
    let now = Utc::now();
    Arc::new(RateLimitTracker::from_window(RateLimitWindow {
        used: 60 - remaining,
        remaining,
        reset_at: now + Duration::seconds(60),
        last_observed_at: None,
    }))
}

#[tokio::test]
async fn test_fetch_decodes_payload_and_merges_telemetry() {
    let upstream = FakeUpstream::new(Reply::Body(r#"{"message":"hi"}"#, 7, 53));
    let tracker = tracker_with_remaining(60);
    let errors = Arc::new(MemoryErrorSink::new());
    let fetcher = RateLimitedFetcher::new(upstream.clone(), tracker.clone(), errors.clone());

    let outcome = fetcher.fetch::<Greeting>("/hello", "token", 1).await;

    match outcome {
        FetchOutcome::Fetched(greeting) => assert_eq!(greeting.message, "hi"),
        other => panic!("expected a payload, got {:?}", other),
    }
    assert_eq!(upstream.calls(), 1);

    let window = tracker.snapshot();
    assert_eq!(window.used, 7);
    assert_eq!(window.remaining, 53);
    assert!(window.last_observed_at.is_some());
    assert!(errors.is_empty());
}

#[tokio::test]
async fn test_exhausted_quota_skips_without_calling_or_reporting() {
    let upstream = FakeUpstream::new(Reply::Body(r#"{"message":"hi"}"#, 60, 0));
    let tracker = tracker_with_remaining(1);
    let errors = Arc::new(MemoryErrorSink::new());
    let fetcher = RateLimitedFetcher::new(upstream.clone(), tracker, errors.clone());

    let outcome = fetcher.fetch::<Greeting>("/hello", "token", 2).await;

    assert!(outcome.is_skipped());
    assert_eq!(upstream.calls(), 0);
    assert!(errors.is_empty());
}

#[tokio::test]
async fn test_authorization_failure_is_recorded_not_raised() {
    let upstream = FakeUpstream::new(Reply::Unauthorized);
    let tracker = tracker_with_remaining(60);
    let errors = Arc::new(MemoryErrorSink::new());
    let fetcher = RateLimitedFetcher::new(upstream, tracker.clone(), errors.clone());

    let outcome = fetcher.fetch::<Greeting>("/api/v1/me", "bad-token", 1).await;

    match outcome {
        FetchOutcome::Failed(e) => assert!(e.is_authorization()),
        other => panic!("expected an authorization failure, got {:?}", other),
    }

    let records = errors.list();
    assert_eq!(records.len(), 1);
    assert!(records[0].source.contains("/api/v1/me"));
    assert!(records[0].message.contains("401"));
    // nothing was received, so the tracker is untouched
    assert!(tracker.snapshot().last_observed_at.is_none());
}

#[tokio::test]
async fn test_protocol_failure_is_recorded() {
    let upstream = FakeUpstream::new(Reply::ServerError);
    let errors = Arc::new(MemoryErrorSink::new());
    let fetcher = RateLimitedFetcher::new(upstream, tracker_with_remaining(60), errors.clone());

    let outcome = fetcher.fetch::<Greeting>("/hot", "token", 1).await;

    assert!(matches!(outcome, FetchOutcome::Failed(AggregatorError::Protocol { .. })));
    assert_eq!(errors.len(), 1);
}

#[tokio::test]
async fn test_undecodable_body_still_updates_tracker() {
    let upstream = FakeUpstream::new(Reply::Body("<html>maintenance</html>", 9, 51));
    let tracker = tracker_with_remaining(60);
    let errors = Arc::new(MemoryErrorSink::new());
    let fetcher = RateLimitedFetcher::new(upstream, tracker.clone(), errors.clone());

    let outcome = fetcher.fetch::<Greeting>("/hello", "token", 1).await;

    assert!(matches!(outcome, FetchOutcome::Failed(AggregatorError::Decode(_))));
    assert_eq!(errors.len(), 1);
    assert_eq!(tracker.snapshot().used, 9);
}

#[test]
fn test_outcome_helpers() {
    let fetched: FetchOutcome<u32> = FetchOutcome::Fetched(2);
    assert_eq!(fetched.map(|n| n * 10).into_option(), Some(20));

    let skipped: FetchOutcome<u32> = FetchOutcome::Skipped;
    assert!(skipped.is_skipped());
    assert_eq!(skipped.into_option(), None);

    let failed: FetchOutcome<u32> = FetchOutcome::Failed(AggregatorError::General("boom".to_string()));
    assert!(failed.is_failed());
    assert_eq!(failed.into_option(), None);
}

fn http_fetcher(
    server: &MockServer,
    tracker: Arc<RateLimitTracker>,
    errors: Arc<MemoryErrorSink>,
) -> RateLimitedFetcher {
    let config = FetchConfig {
        reddit_base_url: server.uri(),
        timeout_seconds: 5,
        ..FetchConfig::default()
    };
    let upstream = Arc::new(HttpUpstream::new(&config).expect("client should build"));
    RateLimitedFetcher::new(upstream, tracker, errors)
}

#[tokio::test]
async fn test_rejection_with_telemetry_closes_admission() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hot"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("x-ratelimit-used", "60")
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", "30"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let tracker = tracker_with_remaining(60);
    let errors = Arc::new(MemoryErrorSink::new());
    let fetcher = http_fetcher(&server, tracker.clone(), errors.clone());

    let first = fetcher.fetch::<Greeting>("/hot", "token", 1).await;
    assert!(first.is_failed());

    let window = tracker.snapshot();
    assert_eq!(window.used, 60);
    assert_eq!(window.remaining, 0);
    assert!(window.last_observed_at.is_some());

    // the exhausted quota now keeps further calls off the wire
    for _ in 0..2 {
        assert!(fetcher.fetch::<Greeting>("/hot", "token", 1).await.is_skipped());
    }
    assert_eq!(errors.len(), 1);
}

#[tokio::test]
async fn test_rejection_without_telemetry_leaves_tracker_alone() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hot"))
        .respond_with(ResponseTemplate::new(502))
        .expect(2)
        .mount(&server)
        .await;

    let tracker = tracker_with_remaining(60);
    let errors = Arc::new(MemoryErrorSink::new());
    let fetcher = http_fetcher(&server, tracker.clone(), errors.clone());

    assert!(fetcher.fetch::<Greeting>("/hot", "token", 1).await.is_failed());
    assert!(fetcher.fetch::<Greeting>("/hot", "token", 1).await.is_failed());

    let window = tracker.snapshot();
    assert_eq!(window.remaining, 60);
    assert!(window.last_observed_at.is_none());
    assert_eq!(errors.len(), 2);
}
