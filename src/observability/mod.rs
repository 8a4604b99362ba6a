//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Gateway and primitives produce:
//!     → tracing events (structured fields)
//!     → logging.rs (filter + fmt/json subscriber)
//!     → stdout
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Rejections are logged at the edge (middleware), not inside the primitives
//! - No metrics export; the `/status` endpoint serves snapshots instead

pub mod logging;
