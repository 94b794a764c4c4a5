//! Sliding-window rate limiting keyed by user or client IP.
//!
//! Three nested windows are checked in order, most restrictive first:
//! burst (5 s), minute (60 s) and hour (3600 s). Every admitted request is
//! recorded as an instant in a per-key event log; rejected requests are not.

use std::collections::VecDeque;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::Serialize;

use crate::config::RateLimitConfig;
use crate::observability::metrics;

/// The widest tracked window; older events are trimmed.
const RETENTION: Duration = Duration::from_secs(3600);

/// A rate-limit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Window {
    Burst,
    Minute,
    Hour,
}

impl Window {
    /// Length of the trailing interval counted for this window.
    pub const fn span(self) -> Duration {
        match self {
            Window::Burst => Duration::from_secs(5),
            Window::Minute => Duration::from_secs(60),
            Window::Hour => Duration::from_secs(3600),
        }
    }

    /// Fixed retry hint sent with a rejection.
    pub const fn retry_after(self) -> Duration {
        self.span()
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Window::Burst => "burst",
            Window::Minute => "minute",
            Window::Hour => "hour",
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The principal being throttled.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateKey(String);

impl RateKey {
    pub fn user(id: &str) -> Self {
        Self(format!("user:{id}"))
    }

    pub fn ip(addr: &str) -> Self {
        Self(format!("ip:{addr}"))
    }

    /// Prefer the authenticated identity, fall back to the resolved client IP.
    pub fn for_request(user_id: Option<&str>, client_ip: &str) -> Self {
        match user_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => Self::user(id),
            None => Self::ip(client_ip),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-minute allowance reported with an admitted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub limit: u32,
    pub remaining: u32,
}

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    pub window: Window,
    pub retry_after: Duration,
}

impl Rejection {
    fn new(window: Window) -> Self {
        Self {
            window,
            retry_after: window.retry_after(),
        }
    }

    pub fn retry_after_secs(&self) -> u64 {
        self.retry_after.as_secs()
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed(Quota),
    Rejected(Rejection),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed(_))
    }
}

/// In-memory sliding-window limiter.
///
/// The key store is an LRU map capped at `max_tracked_keys`, so IP churn
/// cannot grow memory without bound. A single lock covers the whole
/// trim-count-append sequence.
pub struct SlidingWindowLimiter {
    logs: Mutex<LruCache<String, VecDeque<Instant>>>,
    burst_limit: usize,
    requests_per_minute: usize,
    requests_per_hour: usize,
}

impl SlidingWindowLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let max_keys = NonZeroUsize::new(config.max_tracked_keys).unwrap_or(NonZeroUsize::MIN);
        Self {
            logs: Mutex::new(LruCache::new(max_keys)),
            burst_limit: config.burst_limit as usize,
            requests_per_minute: config.requests_per_minute as usize,
            requests_per_hour: config.requests_per_hour as usize,
        }
    }

    /// Check and record a request for `key` at the current instant.
    pub fn admit(&self, key: &RateKey) -> Decision {
        self.admit_at(key, Instant::now())
    }

    /// Check and record a request for `key` at `now`.
    ///
    /// A poisoned store fails closed: the request that finds it is rejected,
    /// every history is dropped and the lock is cleared for later callers.
    pub fn admit_at(&self, key: &RateKey, now: Instant) -> Decision {
        let mut logs = match self.logs.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!(client = %key, "Rate limiter state poisoned, resetting");
                poisoned.into_inner().clear();
                self.logs.clear_poison();
                return Decision::Rejected(Rejection::new(Window::Burst));
            }
        };

        if !logs.contains(key.as_str()) && logs.len() >= logs.cap().get() {
            if let Some((evicted, _)) = logs.pop_lru() {
                tracing::debug!(evicted = %evicted, "Evicted least recently used rate-limit key");
            }
        }

        let events = logs.get_or_insert_mut(key.as_str().to_string(), VecDeque::new);

        while events
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= RETENTION)
        {
            events.pop_front();
        }

        let in_burst = count_within(events, now, Window::Burst.span());
        let in_minute = count_within(events, now, Window::Minute.span());

        let exceeded = if in_burst >= self.burst_limit {
            Some(Window::Burst)
        } else if in_minute >= self.requests_per_minute {
            Some(Window::Minute)
        } else if events.len() >= self.requests_per_hour {
            Some(Window::Hour)
        } else {
            None
        };

        let decision = match exceeded {
            Some(window) => Decision::Rejected(Rejection::new(window)),
            None => {
                events.push_back(now);
                Decision::Allowed(Quota {
                    limit: self.requests_per_minute as u32,
                    remaining: self.requests_per_minute.saturating_sub(in_minute + 1) as u32,
                })
            }
        };

        let tracked = logs.len();
        drop(logs);
        metrics::record_limiter_keys(tracked);

        decision
    }

    /// Number of distinct keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.logs.lock().map(|logs| logs.len()).unwrap_or(0)
    }

    /// Recorded events for `key`, without touching its recency.
    pub fn event_count(&self, key: &RateKey) -> usize {
        self.logs
            .lock()
            .ok()
            .and_then(|logs| logs.peek(key.as_str()).map(VecDeque::len))
            .unwrap_or(0)
    }

    pub fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute as u32
    }
}

/// Events newer than `span`, counted from the tail of the ascending log.
fn count_within(events: &VecDeque<Instant>, now: Instant, span: Duration) -> usize {
    events
        .iter()
        .rev()
        .take_while(|t| now.saturating_duration_since(**t) < span)
        .count()
}
