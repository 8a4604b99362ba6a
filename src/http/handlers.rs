use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::error::CallError;
use crate::http::server::AppState;
use crate::resilience::{BreakerSnapshot, RateLimiterSnapshot};

#[derive(Debug, Serialize)]
pub struct ConcurrencyStatus {
    pub capacity: usize,
    pub in_flight: usize,
    pub available: usize,
}

#[derive(Debug, Serialize)]
pub struct GatewayStatus {
    pub version: &'static str,
    pub rate_limit: Option<RateLimiterSnapshot>,
    pub concurrency: Option<ConcurrencyStatus>,
    pub breaker: BreakerSnapshot,
}

pub async fn root() -> &'static str {
    "Request successful"
}

/// Forward to the configured upstream through the circuit breaker.
pub async fn upstream(State(state): State<AppState>) -> Response {
    let Some(upstream) = state.upstream.as_ref() else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "No upstream configured" })),
        )
            .into_response();
    };

    match state.breaker.call(|| upstream.fetch()).await {
        Ok(response) => {
            let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::OK);
            (status, response.body).into_response()
        }
        Err(CallError::Open) => {
            tracing::warn!(upstream = %upstream.url(), "Circuit open, failing fast");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "Upstream unavailable" })),
            )
                .into_response()
        }
        Err(CallError::Inner(e)) => {
            tracing::error!(
                upstream = %upstream.url(),
                error = %e,
                breaker = %state.breaker.state(),
                "Upstream call failed"
            );
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "Upstream request failed" })),
            )
                .into_response()
        }
    }
}

pub async fn status(State(state): State<AppState>) -> Json<GatewayStatus> {
    Json(GatewayStatus {
        version: env!("CARGO_PKG_VERSION"),
        rate_limit: state.rate_limiter.as_ref().map(|l| l.snapshot()),
        concurrency: state.concurrency.as_ref().map(|gate| ConcurrencyStatus {
            capacity: gate.limiter.capacity(),
            in_flight: gate.limiter.in_flight(),
            available: gate.limiter.available(),
        }),
        breaker: state.breaker.snapshot(),
    })
}
