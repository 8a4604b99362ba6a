//! Token bucket rate limiter.
//!
//! # Responsibilities
//! - Bound the rate of admitted operations
//! - Refill one token per `refill_interval`, up to `capacity`
//! - Provide a non-blocking check and an optional waiting wrapper
//!
//! # Design Decisions
//! - Whole tokens only; the accounting instant advances by the exact
//!   duration of the tokens earned, so fractional time carries over
//! - The bucket starts full

use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::error::ResilienceError;

/// Point-in-time view of a rate limiter, for status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimiterSnapshot {
    pub capacity: u32,
    pub tokens: u32,
    pub refill_interval_ms: u64,
    /// Time until the next token is earned, if the bucket is empty.
    pub next_token_ms: Option<u64>,
}

#[derive(Debug)]
struct Bucket {
    tokens: u32,
    last_refill: Instant,
}

/// Request-rate throttle.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: u32,
    refill_interval: Duration,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Create a full bucket of `capacity` tokens earning one token every
    /// `refill_interval`.
    pub fn new(capacity: u32, refill_interval: Duration) -> Result<Self, ResilienceError> {
        if capacity == 0 {
            return Err(ResilienceError::invalid(
                "rate limit capacity must be greater than zero",
            ));
        }
        if refill_interval.is_zero() {
            return Err(ResilienceError::invalid(
                "rate limit refill interval must be greater than zero",
            ));
        }
        Ok(Self {
            capacity,
            refill_interval,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        })
    }

    pub fn from_config(config: &RateLimitConfig) -> Result<Self, ResilienceError> {
        Self::new(config.capacity, config.refill_interval())
    }

    fn lock(&self) -> MutexGuard<'_, Bucket> {
        self.bucket.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Credit whole tokens earned since the last accounting instant.
    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        let elapsed = now.saturating_duration_since(bucket.last_refill);
        let interval = self.refill_interval.as_nanos();
        let earned = elapsed.as_nanos() / interval;
        if earned == 0 {
            return;
        }

        let credited = u32::try_from(earned).unwrap_or(u32::MAX);
        bucket.tokens = bucket.tokens.saturating_add(credited).min(self.capacity);

        // Keep the sub-token remainder: step back from `now` by it instead of
        // snapping to `now`.
        let remainder = elapsed.as_nanos() % interval;
        bucket.last_refill = now - Duration::from_nanos(remainder as u64);
    }

    /// Take a token without waiting; `Err` carries the wait until the next one.
    fn take(&self) -> Result<(), Duration> {
        let now = Instant::now();
        let mut bucket = self.lock();
        self.refill(&mut bucket, now);

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            Ok(())
        } else {
            let since = now.saturating_duration_since(bucket.last_refill);
            Err(self.refill_interval.saturating_sub(since))
        }
    }

    /// Admit one operation if a token is available. Never blocks.
    pub fn allow(&self) -> bool {
        self.take().is_ok()
    }

    /// Wait until a token is available and take it.
    pub async fn until_ready(&self) {
        while let Err(wait) = self.take() {
            tokio::time::sleep(wait).await;
        }
    }

    /// Tokens available right now.
    pub fn available_tokens(&self) -> u32 {
        let mut bucket = self.lock();
        self.refill(&mut bucket, Instant::now());
        bucket.tokens
    }

    /// Time until another token is earned, or zero when one is available.
    pub fn time_until_next_token(&self) -> Duration {
        let now = Instant::now();
        let mut bucket = self.lock();
        self.refill(&mut bucket, now);
        if bucket.tokens > 0 {
            return Duration::ZERO;
        }
        self.refill_interval
            .saturating_sub(now.saturating_duration_since(bucket.last_refill))
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn refill_interval(&self) -> Duration {
        self.refill_interval
    }

    pub fn snapshot(&self) -> RateLimiterSnapshot {
        let now = Instant::now();
        let mut bucket = self.lock();
        self.refill(&mut bucket, now);
        let next_token_ms = (bucket.tokens == 0).then(|| {
            self.refill_interval
                .saturating_sub(now.saturating_duration_since(bucket.last_refill))
                .as_millis() as u64
        });
        RateLimiterSnapshot {
            capacity: self.capacity,
            tokens: bucket.tokens,
            refill_interval_ms: self.refill_interval.as_millis() as u64,
            next_token_ms,
        }
    }
}
