//! Shared view of one upstream API's rate-limit window.
//!
//! Every response from the upstream carries its own reading of the quota.
//! Responses can be processed out of order when many fetchers run at once,
//! so readings are reconciled rather than blindly overwritten: within a
//! window the most restrictive reading wins, and only a later reset time
//! replaces the baseline.

use crate::types::FetchConfig;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

/// The tracker's current understanding of the quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitWindow {
    pub used: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
    /// Receipt time of the newest sample merged so far.
    pub last_observed_at: Option<DateTime<Utc>>,
}

/// Telemetry read from a single upstream response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSample {
    pub used: u32,
    pub remaining: u32,
    pub reset_at: Option<DateTime<Utc>>,
    pub received_at: DateTime<Utc>,
}

/// What a merge did to the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Received at or before the newest merged sample; nothing changed.
    Stale,
    /// The sample opened a new window and replaced the baseline.
    Rollover,
    /// Folded into the current window.
    Applied,
}

impl RateLimitWindow {
    pub fn fresh(capacity: u32, length: Duration, now: DateTime<Utc>) -> Self {
        Self {
            used: 0,
            remaining: capacity,
            reset_at: now + length,
            last_observed_at: None,
        }
    }

    /// Once `reset_at` has passed the upstream has started a new window, so
    /// elapsed time alone never blocks a call.
    pub fn would_exceed(&self, expected_calls: u32, now: DateTime<Utc>) -> bool {
        now < self.reset_at && expected_calls > self.remaining
    }

    pub fn merge(&mut self, sample: &RateLimitSample) -> MergeOutcome {
        if let Some(last) = self.last_observed_at {
            if sample.received_at <= last {
                return MergeOutcome::Stale;
            }
        }

        let mut outcome = MergeOutcome::Applied;
        if let Some(reset_at) = sample.reset_at {
            if reset_at > self.reset_at {
                self.used = sample.used;
                self.remaining = sample.remaining;
                self.reset_at = reset_at;
                outcome = MergeOutcome::Rollover;
            }
        }

        // used only climbs and remaining only falls inside a window
        if sample.used > self.used {
            self.used = sample.used;
        }
        if sample.remaining < self.remaining {
            self.remaining = sample.remaining;
        }

        self.last_observed_at = Some(sample.received_at);
        outcome
    }
}

/// Process-wide tracker for one rate-limited upstream. Share it behind an
/// `Arc` between every fetcher and every aggregation pass.
pub struct RateLimitTracker {
    window: Mutex<RateLimitWindow>,
}

impl RateLimitTracker {
    pub fn new(capacity: u32, window_length: Duration) -> Self {
        Self::from_window(RateLimitWindow::fresh(capacity, window_length, Utc::now()))
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(
            config.rate_limit_capacity,
            Duration::seconds(config.rate_limit_window_seconds.max(0)),
        )
    }

    pub fn from_window(window: RateLimitWindow) -> Self {
        Self {
            window: Mutex::new(window),
        }
    }

    /// Would `expected_calls` more calls go over the quota right now?
    pub fn would_exceed(&self, expected_calls: u32) -> bool {
        self.would_exceed_at(expected_calls, Utc::now())
    }

    pub fn would_exceed_at(&self, expected_calls: u32, now: DateTime<Utc>) -> bool {
        self.window.lock().would_exceed(expected_calls, now)
    }

    pub fn merge(&self, sample: RateLimitSample) -> MergeOutcome {
        let (outcome, window) = {
            let mut window = self.window.lock();
            let outcome = window.merge(&sample);
            (outcome, *window)
        };

        match outcome {
            MergeOutcome::Stale => debug!(
                "Discarded stale rate-limit sample received at {} (newest merged: {:?})",
                sample.received_at, window.last_observed_at
            ),
            MergeOutcome::Rollover => debug!(
                "Rate-limit window rolled over: used={} remaining={} reset_at={}",
                window.used, window.remaining, window.reset_at
            ),
            MergeOutcome::Applied => debug!(
                "Rate-limit sample merged: used={} remaining={}",
                window.used, window.remaining
            ),
        }

        outcome
    }

    pub fn snapshot(&self) -> RateLimitWindow {
        *self.window.lock()
    }
}
