//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Durations are expressed in milliseconds to keep TOML files flat.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, request timeout).
    pub listener: ListenerConfig,

    /// Token bucket in front of every request.
    pub rate_limit: RateLimitConfig,

    /// Bulkhead bounding in-flight requests.
    pub concurrency: ConcurrencyConfig,

    /// Circuit breaker guarding upstream calls.
    pub breaker: BreakerConfig,

    /// Optional downstream service reached through the breaker.
    pub upstream: UpstreamConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Total time allowed for a request/response in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Token bucket configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable request-rate throttling.
    pub enabled: bool,

    /// Maximum tokens the bucket holds (burst size).
    pub capacity: u32,

    /// Time to earn one token, in milliseconds.
    pub refill_interval_ms: u64,
}

impl RateLimitConfig {
    pub fn refill_interval(&self) -> Duration {
        Duration::from_millis(self.refill_interval_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 5,
            refill_interval_ms: 1000,
        }
    }
}

/// Concurrency limiter (bulkhead) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Enable the in-flight request limit.
    pub enabled: bool,

    /// Maximum concurrently admitted requests.
    pub max_in_flight: usize,

    /// Bounded wait for a slot in milliseconds. Absent means wait indefinitely.
    pub acquire_timeout_ms: Option<u64>,
}

impl ConcurrencyConfig {
    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.acquire_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_in_flight: 3,
            acquire_timeout_ms: None,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures that trip the breaker open.
    pub failure_threshold: u32,

    /// How long the breaker stays open before admitting a probe, in milliseconds.
    pub open_timeout_ms: u64,
}

impl BreakerConfig {
    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            open_timeout_ms: 5000,
        }
    }
}

/// Downstream service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the upstream (e.g., "http://127.0.0.1:3000/health").
    pub url: Option<String>,

    /// Per-call timeout in milliseconds. A timeout counts as a failure.
    pub timeout_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_ms: 2000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}
