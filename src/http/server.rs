//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the resilience primitives once from configuration
//! - Create the Axum Router with admission middleware
//! - Serve until the shutdown signal, draining in-flight requests

use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{validate_config, ConfigError, GatewayConfig};
use crate::error::ResilienceError;
use crate::http::handlers;
use crate::http::middleware::{
    concurrency_limit_middleware, rate_limit_middleware, ConcurrencyGate,
};
use crate::http::upstream::Upstream;
use crate::lifecycle::shutdown;
use crate::resilience::{CircuitBreaker, ConcurrencyLimiter, RateLimiter};

/// Errors building the server from configuration.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Resilience(#[from] ResilienceError),

    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Application state injected into handlers.
///
/// Every primitive is constructed once here and shared by reference.
#[derive(Debug, Clone)]
pub struct AppState {
    pub rate_limiter: Option<Arc<RateLimiter>>,
    pub concurrency: Option<ConcurrencyGate>,
    pub breaker: Arc<CircuitBreaker>,
    pub upstream: Option<Upstream>,
}

impl AppState {
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ServerError> {
        let rate_limiter = if config.rate_limit.enabled {
            Some(Arc::new(RateLimiter::from_config(&config.rate_limit)?))
        } else {
            None
        };

        let concurrency = if config.concurrency.enabled {
            Some(ConcurrencyGate {
                limiter: ConcurrencyLimiter::from_config(&config.concurrency)?,
                acquire_timeout: config.concurrency.acquire_timeout(),
            })
        } else {
            None
        };

        Ok(Self {
            rate_limiter,
            concurrency,
            breaker: Arc::new(CircuitBreaker::from_config(&config.breaker)?),
            upstream: Upstream::from_config(&config.upstream)?,
        })
    }
}

/// HTTP gateway fronting the protected resource.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
    state: AppState,
}

impl GatewayServer {
    /// Validate `config` and build every primitive from it.
    pub fn new(config: GatewayConfig) -> Result<Self, ServerError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let state = AppState::from_config(&config)?;
        let router = Self::build_router(&config, state.clone());
        Ok(Self {
            router,
            config,
            state,
        })
    }

    /// Build the Axum router.
    ///
    /// Layer order (outermost first): trace, timeout, rate limit, concurrency.
    /// `/status` sits outside the admission layers so it stays observable
    /// under load.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let mut gated = Router::new()
            .route("/", get(handlers::root))
            .route("/upstream", get(handlers::upstream))
            .with_state(state.clone());

        if let Some(gate) = state.concurrency.clone() {
            gated = gated.layer(middleware::from_fn_with_state(
                gate,
                concurrency_limit_middleware,
            ));
        }
        if let Some(limiter) = state.rate_limiter.clone() {
            gated = gated.layer(middleware::from_fn_with_state(
                limiter,
                rate_limit_middleware,
            ));
        }

        Router::new()
            .route("/status", get(handlers::status))
            .with_state(state)
            .merge(gated)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.listener.request_timeout_secs,
                    ))),
            )
    }

    /// Run the server until `shutdown_rx` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            rate_limit = self.state.rate_limiter.is_some(),
            concurrency = self.state.concurrency.is_some(),
            upstream = ?self.state.upstream.as_ref().map(Upstream::url),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait(shutdown_rx))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Shared primitives, for callers that want to observe them.
    pub fn state(&self) -> &AppState {
        &self.state
    }
}
