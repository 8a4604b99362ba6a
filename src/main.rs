//! load-guard gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ rate limit ──▶ concurrency ──▶ handler ──▶ breaker ──▶ upstream
//!                     (429)          (503)                       (503 when open)
//! ```
//!
//! `serve` runs the gateway; `demo` replays the bulkhead and breaker
//! behaviour against simulated work without any network.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpListener;

use load_guard::config::{load_config, GatewayConfig};
use load_guard::lifecycle::signals::wait_for_signal;
use load_guard::observability::logging;
use load_guard::{CallError, CircuitBreaker, ConcurrencyLimiter, GatewayServer, Shutdown};

#[derive(Parser)]
#[command(name = "load-guard")]
#[command(about = "Rate limiting, bulkhead and circuit breaker gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP gateway
    Serve {
        /// Path to a TOML configuration file; defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Exercise a primitive against simulated work
    Demo {
        #[arg(value_enum)]
        primitive: DemoKind,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DemoKind {
    Bulkhead,
    Breaker,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config } => {
            let config = match config {
                Some(path) => load_config(&path)?,
                None => GatewayConfig::default(),
            };
            logging::init(&config.observability)?;
            serve(config).await?;
        }
        Commands::Demo { primitive } => {
            logging::init(&GatewayConfig::default().observability)?;
            match primitive {
                DemoKind::Bulkhead => bulkhead_demo().await?,
                DemoKind::Breaker => breaker_demo().await?,
            }
        }
    }

    Ok(())
}

async fn serve(config: GatewayConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        bind_address = %config.listener.bind_address,
        rate_limit_capacity = config.rate_limit.capacity,
        max_in_flight = config.concurrency.max_in_flight,
        failure_threshold = config.breaker.failure_threshold,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = GatewayServer::new(config)?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, server_shutdown).await?;
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Ten one-second jobs through three slots: they finish in four waves.
async fn bulkhead_demo() -> Result<(), Box<dyn std::error::Error>> {
    let limiter = ConcurrencyLimiter::new(3)?;
    let mut handles = Vec::new();

    for job in 0..10 {
        let handle = limiter
            .spawn(async move {
                tracing::info!(job, "Processing request");
                tokio::time::sleep(Duration::from_secs(1)).await;
            })
            .await?;
        handles.push(handle);
    }
    for handle in handles {
        handle.await?;
    }

    tracing::info!(in_flight = limiter.in_flight(), "All jobs finished");
    Ok(())
}

/// Ten failing calls one second apart against a threshold-3 breaker.
async fn breaker_demo() -> Result<(), Box<dyn std::error::Error>> {
    let breaker = CircuitBreaker::new(3, Duration::from_secs(5))?;

    for attempt in 0..10 {
        let result = breaker
            .call(|| async { Err::<(), _>("simulated failure") })
            .await;
        match result {
            Ok(()) => tracing::info!(attempt, "Request succeeded"),
            Err(CallError::Open) => {
                tracing::warn!(attempt, state = %breaker.state(), "Request rejected")
            }
            Err(CallError::Inner(e)) => {
                tracing::warn!(attempt, error = e, state = %breaker.state(), "Request failed")
            }
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    Ok(())
}
