//! Sliding-window rate limiter. Process-local and in-memory; unlike the
//! ledger and behavior stores it is never persisted.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

const WINDOW_MS: i64 = 60_000;

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub global_rpm: u32,
    pub burst: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub used: u32,
    pub limit: u32,
    pub retry_after_secs: u32,
}

pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<String, VecDeque<i64>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// `override_rpm` is the per-subject rpm from the admitted principal, if any.
    pub fn check(&self, subject_id: &str, override_rpm: Option<u32>, now_ms: i64) -> RateLimitDecision {
        let limit = override_rpm.unwrap_or(self.config.global_rpm) + self.config.burst;
        let cutoff = now_ms - WINDOW_MS;

        let mut windows = self.windows.lock().expect("rate limiter mutex poisoned");
        let deque = windows.entry(subject_id.to_string()).or_default();

        while let Some(&oldest) = deque.front() {
            if oldest <= cutoff {
                deque.pop_front();
            } else {
                break;
            }
        }

        let used = deque.len() as u32;
        if used >= limit {
            let oldest = *deque.front().expect("deque non-empty when at capacity");
            let retry_after_ms = oldest + WINDOW_MS - now_ms;
            let retry_after_secs = (retry_after_ms as f64 / 1000.0).ceil().max(1.0) as u32;
            return RateLimitDecision {
                allowed: false,
                used,
                limit,
                retry_after_secs,
            };
        }

        deque.push_back(now_ms);
        RateLimitDecision {
            allowed: true,
            used: used + 1,
            limit,
            retry_after_secs: 0,
        }
    }
}
