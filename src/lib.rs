//! Overload protection for a downstream resource.
//!
//! Three independent primitives, usable standalone or stacked:
//! - [`ConcurrencyLimiter`]: bulkhead bounding in-flight work
//! - [`CircuitBreaker`]: stops calling a failing dependency, then probes it
//! - [`RateLimiter`]: token bucket bounding admitted work per unit of time
//!
//! The `http` subsystem wires them into an axum gateway; everything else
//! (config, logging, lifecycle) supports that binary.

// Core primitives
pub mod error;
pub mod resilience;

// Gateway
pub mod config;
pub mod http;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use error::{CallError, ResilienceError};
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use resilience::{BreakerState, CircuitBreaker, ConcurrencyLimiter, RateLimiter};
