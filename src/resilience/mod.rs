//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request:
//!     → rate_limit.rs (token bucket; reject with 429 when empty)
//!     → bulkhead.rs (bound in-flight work; wait or reject with 503)
//!     → handler
//!         → circuit_breaker.rs (fail fast while the dependency is down)
//!         → outbound call
//! ```
//!
//! # Design Decisions
//! - The three primitives are independent; composition is the caller's job
//! - Each instance serializes its bookkeeping behind one short critical section
//! - No primitive holds its lock while user work runs
//! - Instances are built once from config and shared by reference (`Arc`)

pub mod bulkhead;
pub mod circuit_breaker;
pub mod rate_limit;

pub use bulkhead::{ConcurrencyLimiter, SlotPermit};
pub use circuit_breaker::{BreakerPermit, BreakerSnapshot, BreakerState, CircuitBreaker};
pub use rate_limit::{RateLimiter, RateLimiterSnapshot};
