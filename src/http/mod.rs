//! HTTP gateway subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, trace + timeout layers)
//!     → middleware.rs (rate limit → concurrency limit)
//!     → handlers.rs
//!         → upstream.rs (outbound call, wrapped in the circuit breaker)
//!     → Send to client
//! ```

pub mod handlers;
pub mod middleware;
pub mod server;
pub mod upstream;

pub use middleware::ConcurrencyGate;
pub use server::{AppState, GatewayServer, ServerError};
pub use upstream::{Upstream, UpstreamError};
