//! Admin Rate Limiting
//!
//! Per-key rate limiting over a rolling window, with a general tier charged
//! on every request and a stricter sensitive tier for state-mutating tool
//! calls. Blocked requests are never recorded.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Quota tier a request is charged against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateTier {
    General,
    Sensitive,
}

/// Rate limit configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub general_per_hour: u32,
    pub sensitive_per_hour: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            general_per_hour: 100,
            sensitive_per_hour: 50,
            window: Duration::from_secs(3600),
        }
    }
}

/// Identity the quota is tracked by. Authenticated requests use the API key
/// id; the network address is the fallback.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RateKey {
    ApiKey(String),
    Address(IpAddr),
}

/// Tracks rate limit state for a single key
#[derive(Debug)]
struct KeyRateState {
    general_count: u32,
    sensitive_count: u32,
    window_start: Instant,
}

impl KeyRateState {
    fn new(now: Instant) -> Self {
        Self {
            general_count: 0,
            sensitive_count: 0,
            window_start: now,
        }
    }

    fn reset_if_expired(&mut self, now: Instant, window: Duration) {
        if now.duration_since(self.window_start) >= window {
            self.general_count = 0;
            self.sensitive_count = 0;
            self.window_start = now;
        }
    }
}

/// Snapshot of the window after a successful charge, for response headers.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitStatus {
    pub limit: u32,
    pub remaining: u32,
    pub reset_secs: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitExceeded {
    pub limit: u32,
    pub retry_after_secs: u32,
}

/// Rate limiter for admin requests
pub struct AdminRateLimiter {
    config: RateLimitConfig,
    states: Mutex<HashMap<RateKey, KeyRateState>>,
}

impl AdminRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Check if a request is allowed and record it if so.
    pub fn check_and_record(
        &self,
        key: &RateKey,
        tier: RateTier,
    ) -> Result<RateLimitStatus, RateLimitExceeded> {
        self.check_and_record_at(key, tier, Instant::now())
    }

    fn check_and_record_at(
        &self,
        key: &RateKey,
        tier: RateTier,
        now: Instant,
    ) -> Result<RateLimitStatus, RateLimitExceeded> {
        let mut states = self.states.lock().unwrap();
        let state = states
            .entry(key.clone())
            .or_insert_with(|| KeyRateState::new(now));

        state.reset_if_expired(now, self.config.window);

        let (current, limit) = match tier {
            RateTier::General => (&mut state.general_count, self.config.general_per_hour),
            RateTier::Sensitive => (&mut state.sensitive_count, self.config.sensitive_per_hour),
        };

        let window_secs = self.config.window.as_secs();
        let elapsed = now.duration_since(state.window_start).as_secs();
        let reset_secs = window_secs.saturating_sub(elapsed);

        if *current >= limit {
            return Err(RateLimitExceeded {
                limit,
                retry_after_secs: reset_secs.max(1) as u32,
            });
        }

        *current += 1;
        Ok(RateLimitStatus {
            limit,
            remaining: limit - *current,
            reset_secs,
        })
    }

    /// Current usage for a key as (general, sensitive), for status reporting.
    pub fn get_usage(&self, key: &RateKey) -> Option<(u32, u32)> {
        let states = self.states.lock().unwrap();
        states
            .get(key)
            .map(|s| (s.general_count, s.sensitive_count))
    }

    /// Clean up old entries (call periodically)
    pub fn cleanup_stale_entries(&self) {
        let mut states = self.states.lock().unwrap();
        let threshold = self.config.window * 2;
        states.retain(|_, state| state.window_start.elapsed() < threshold);
    }
}

impl Default for AdminRateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
