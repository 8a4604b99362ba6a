//! Admission middleware.
//!
//! # Responsibilities
//! - Throttle request rate (429 Too Many Requests)
//! - Bound in-flight requests (503 Service Unavailable when overloaded)
//!
//! # Design Decisions
//! - Rejected requests never reach downstream handlers
//! - Rejections are logged here, at the edge; the primitives stay silent

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ResilienceError;
use crate::resilience::{ConcurrencyLimiter, RateLimiter};

/// Bulkhead plus the wait policy applied at the edge.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    pub limiter: ConcurrencyLimiter,
    /// `None` waits for a slot indefinitely.
    pub acquire_timeout: Option<Duration>,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Middleware function for request-rate throttling.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if limiter.allow() {
        next.run(request).await
    } else {
        tracing::warn!(
            path = %request.uri().path(),
            capacity = limiter.capacity(),
            "Rate limit exceeded"
        );
        error_response(StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded")
    }
}

/// Middleware function bounding concurrently executing requests.
pub async fn concurrency_limit_middleware(
    State(gate): State<ConcurrencyGate>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let admitted = match gate.acquire_timeout {
        Some(timeout) => gate.limiter.try_execute(|| next.run(request), timeout).await,
        None => gate.limiter.execute(|| next.run(request)).await,
    };

    match admitted {
        Ok(response) => response,
        Err(ResilienceError::Overloaded) => {
            tracing::warn!(
                path = %path,
                in_flight = gate.limiter.in_flight(),
                "Concurrency limit reached"
            );
            error_response(StatusCode::SERVICE_UNAVAILABLE, "Server overloaded")
        }
        Err(e) => {
            tracing::error!(error = %e, "Admission failed");
            error_response(StatusCode::SERVICE_UNAVAILABLE, "Server overloaded")
        }
    }
}
