//! End-to-end tests for the gateway's admission and breaker behaviour.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use load_guard::http::ServerError;
use load_guard::{GatewayConfig, GatewayServer};

mod common;

/// Config with every admission layer off and no upstream.
fn bare_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.rate_limit.enabled = false;
    config.concurrency.enabled = false;
    config
}

#[tokio::test]
async fn test_requests_beyond_bucket_get_429() {
    let mut config = bare_config();
    config.rate_limit.enabled = true;
    config.rate_limit.capacity = 3;
    config.rate_limit.refill_interval_ms = 60_000;

    let (addr, shutdown) = common::spawn_gateway(config).await;
    let client = common::client();
    let url = format!("http://{}/", addr);

    for _ in 0..3 {
        let res = client.get(&url).send().await.expect("gateway unreachable");
        assert_eq!(res.status(), 200);
        assert_eq!(res.text().await.unwrap(), "Request successful");
    }

    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), 429);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Rate limit exceeded");

    shutdown.trigger();
}

#[tokio::test]
async fn test_status_is_not_rate_limited() {
    let mut config = bare_config();
    config.rate_limit.enabled = true;
    config.rate_limit.capacity = 1;
    config.rate_limit.refill_interval_ms = 60_000;

    let (addr, shutdown) = common::spawn_gateway(config).await;
    let client = common::client();

    assert_eq!(client.get(format!("http://{}/", addr)).send().await.unwrap().status(), 200);
    assert_eq!(client.get(format!("http://{}/", addr)).send().await.unwrap().status(), 429);

    let res = client.get(format!("http://{}/status", addr)).send().await.unwrap();
    assert_eq!(res.status(), 200);
    let status: serde_json::Value = res.json().await.unwrap();
    assert_eq!(status["rate_limit"]["capacity"], 1);
    assert_eq!(status["rate_limit"]["tokens"], 0);
    assert_eq!(status["breaker"]["state"], "closed");

    shutdown.trigger();
}

#[tokio::test]
async fn test_saturated_gateway_returns_503() {
    let backend_addr = common::start_programmable_backend(|| async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        (200, "slow".to_string())
    })
    .await;

    let mut config = bare_config();
    config.concurrency.enabled = true;
    config.concurrency.max_in_flight = 1;
    config.concurrency.acquire_timeout_ms = Some(50);
    config.upstream.url = Some(format!("http://{}/", backend_addr));

    let (addr, shutdown) = common::spawn_gateway(config).await;
    let client = common::client();

    let slow_client = client.clone();
    let slow_url = format!("http://{}/upstream", addr);
    let slow = tokio::spawn(async move { slow_client.get(slow_url).send().await });

    tokio::time::sleep(Duration::from_millis(150)).await;
    let res = client.get(format!("http://{}/", addr)).send().await.unwrap();
    assert_eq!(res.status(), 503);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Server overloaded");

    let slow = slow.await.unwrap().unwrap();
    assert_eq!(slow.status(), 200);
    assert_eq!(slow.text().await.unwrap(), "slow");

    // Slot is free again once the slow request completes.
    let res = client.get(format!("http://{}/", addr)).send().await.unwrap();
    assert_eq!(res.status(), 200);

    shutdown.trigger();
}

#[tokio::test]
async fn test_breaker_stops_calling_failing_upstream() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let backend_addr = common::start_programmable_backend(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            (500, "boom".to_string())
        }
    })
    .await;

    let mut config = bare_config();
    config.breaker.failure_threshold = 2;
    config.breaker.open_timeout_ms = 60_000;
    config.upstream.url = Some(format!("http://{}/", backend_addr));

    let (addr, shutdown) = common::spawn_gateway(config).await;
    let client = common::client();
    let url = format!("http://{}/upstream", addr);

    for _ in 0..2 {
        let res = client.get(&url).send().await.unwrap();
        assert_eq!(res.status(), 502);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), 503);
    assert_eq!(calls.load(Ordering::SeqCst), 2, "open breaker must not call upstream");

    let status: serde_json::Value = client
        .get(format!("http://{}/status", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["breaker"]["state"], "open");
    assert_eq!(status["breaker"]["failure_threshold"], 2);

    shutdown.trigger();
}

#[tokio::test]
async fn test_breaker_recovers_after_open_timeout() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let backend_addr = common::start_programmable_backend(move || {
        let counter = counter.clone();
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                (500, "down".to_string())
            } else {
                (200, "up".to_string())
            }
        }
    })
    .await;

    let mut config = bare_config();
    config.breaker.failure_threshold = 1;
    config.breaker.open_timeout_ms = 200;
    config.upstream.url = Some(format!("http://{}/", backend_addr));

    let (addr, shutdown) = common::spawn_gateway(config).await;
    let client = common::client();
    let url = format!("http://{}/upstream", addr);

    assert_eq!(client.get(&url).send().await.unwrap().status(), 502);
    assert_eq!(client.get(&url).send().await.unwrap().status(), 503);

    tokio::time::sleep(Duration::from_millis(300)).await;

    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "up");
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let status: serde_json::Value = client
        .get(format!("http://{}/status", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["breaker"]["state"], "closed");
    assert_eq!(status["breaker"]["failure_count"], 0);

    shutdown.trigger();
}

#[tokio::test]
async fn test_upstream_timeout_beyond_request_timeout_is_rejected() {
    let mut config = bare_config();
    config.listener.request_timeout_secs = 1;
    config.upstream.timeout_ms = 5000;
    config.upstream.url = Some("http://127.0.0.1:9/".to_string());

    match GatewayServer::new(config) {
        Err(ServerError::Config(e)) => assert!(e.to_string().contains("upstream.timeout_ms")),
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("gateway accepted an upstream timeout longer than the request timeout"),
    }
}

#[tokio::test]
async fn test_hung_upstream_trips_breaker() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let backend_addr = common::start_programmable_backend(move || {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(3)).await;
            (200, "late".to_string())
        }
    })
    .await;

    let mut config = bare_config();
    config.listener.request_timeout_secs = 2;
    config.upstream.timeout_ms = 300;
    config.breaker.failure_threshold = 1;
    config.breaker.open_timeout_ms = 60_000;
    config.upstream.url = Some(format!("http://{}/", backend_addr));

    let (addr, shutdown) = common::spawn_gateway(config).await;
    let client = common::client();
    let url = format!("http://{}/upstream", addr);

    assert_eq!(client.get(&url).send().await.unwrap().status(), 502);
    assert_eq!(client.get(&url).send().await.unwrap().status(), 503);
    assert_eq!(client.get(&url).send().await.unwrap().status(), 503);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    shutdown.trigger();
}

#[tokio::test]
async fn test_client_errors_do_not_trip_breaker() {
    let backend_addr = common::start_programmable_backend(|| async {
        (404, "missing".to_string())
    })
    .await;

    let mut config = bare_config();
    config.breaker.failure_threshold = 1;
    config.upstream.url = Some(format!("http://{}/", backend_addr));

    let (addr, shutdown) = common::spawn_gateway(config).await;
    let client = common::client();
    let url = format!("http://{}/upstream", addr);

    for _ in 0..3 {
        assert_eq!(client.get(&url).send().await.unwrap().status(), 404);
    }

    shutdown.trigger();
}

#[tokio::test]
async fn test_upstream_route_without_upstream_is_404() {
    let (addr, shutdown) = common::spawn_gateway(bare_config()).await;
    let client = common::client();

    let res = client
        .get(format!("http://{}/upstream", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "No upstream configured");

    shutdown.trigger();
}

#[tokio::test]
async fn test_shutdown_stops_accepting() {
    let (addr, shutdown) = common::spawn_gateway(bare_config()).await;
    let client = common::client();

    let res = client.get(format!("http://{}/", addr)).send().await.unwrap();
    assert_eq!(res.status(), 200);

    shutdown.trigger();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let result = client.get(format!("http://{}/", addr)).send().await;
    assert!(result.is_err(), "gateway should refuse connections after shutdown");
}
