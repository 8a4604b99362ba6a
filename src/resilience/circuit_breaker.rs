//! Circuit breaker for downstream protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: one probe call tests whether it recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= threshold
//! Open → Half-Open: first call after the open timeout (it becomes the probe)
//! Half-Open → Closed: probe succeeds
//! Half-Open → Open: probe fails (open timeout restarts)
//! ```
//!
//! # Design Decisions
//! - One breaker per protected dependency, shared by reference
//! - Admission and the Open → Half-Open claim happen in one critical section
//! - The lock is never held while the wrapped call runs
//! - Outcomes from calls admitted before the last transition are ignored

use serde::Serialize;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::BreakerConfig;
use crate::error::{CallError, ResilienceError};

/// Externally visible breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        };
        f.write_str(s)
    }
}

/// Point-in-time view of a breaker, for status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub open_timeout_ms: u64,
    /// Time left before a probe is admitted, if currently open.
    pub open_remaining_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Closed { failures: u32 },
    Open { opened_at: Instant },
    HalfOpen { probe_in_flight: bool },
}

#[derive(Debug)]
struct Inner {
    state: State,
    /// Bumped on every transition.
    epoch: u64,
}

impl Inner {
    fn transition(&mut self, next: State) {
        tracing::debug!(from = ?self.state, to = ?next, "circuit breaker transition");
        self.state = next;
        self.epoch = self.epoch.wrapping_add(1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ticket {
    Closed { epoch: u64 },
    Probe { epoch: u64 },
}

/// Stops calling a failing dependency, then probes for recovery.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    open_timeout: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a breaker that opens after `failure_threshold` consecutive
    /// failures and stays open for `open_timeout`.
    pub fn new(failure_threshold: u32, open_timeout: Duration) -> Result<Self, ResilienceError> {
        if failure_threshold == 0 {
            return Err(ResilienceError::invalid(
                "breaker failure threshold must be greater than zero",
            ));
        }
        if open_timeout.is_zero() {
            return Err(ResilienceError::invalid(
                "breaker open timeout must be greater than zero",
            ));
        }
        Ok(Self {
            failure_threshold,
            open_timeout,
            inner: Mutex::new(Inner {
                state: State::Closed { failures: 0 },
                epoch: 0,
            }),
        })
    }

    pub fn from_config(config: &BreakerConfig) -> Result<Self, ResilienceError> {
        Self::new(config.failure_threshold, config.open_timeout())
    }

    // Critical sections never panic midway, so a poisoned lock still
    // holds a consistent state.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ask for admission. The caller must report the outcome on the permit.
    pub fn acquire(&self) -> Result<BreakerPermit<'_>, ResilienceError> {
        let mut inner = self.lock();
        let current = inner.state;
        let ticket = match current {
            State::Closed { .. } => Ticket::Closed { epoch: inner.epoch },
            State::Open { opened_at } => {
                if opened_at.elapsed() < self.open_timeout {
                    return Err(ResilienceError::BreakerOpen);
                }
                inner.transition(State::HalfOpen {
                    probe_in_flight: true,
                });
                Ticket::Probe { epoch: inner.epoch }
            }
            State::HalfOpen {
                probe_in_flight: true,
            } => return Err(ResilienceError::BreakerOpen),
            State::HalfOpen {
                probe_in_flight: false,
            } => {
                inner.state = State::HalfOpen {
                    probe_in_flight: true,
                };
                Ticket::Probe { epoch: inner.epoch }
            }
        };
        Ok(BreakerPermit {
            breaker: self,
            ticket: Some(ticket),
        })
    }

    /// Run `f` if the breaker admits it.
    ///
    /// `Ok` and `Err(CallError::Inner)` carry `f`'s result unchanged;
    /// `Err(CallError::Open)` means `f` was never invoked.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.acquire().map_err(|_| CallError::Open)?;
        match f().await {
            Ok(value) => {
                permit.success();
                Ok(value)
            }
            Err(e) => {
                permit.failure();
                Err(CallError::Inner(e))
            }
        }
    }

    fn record(&self, ticket: Ticket, succeeded: bool) {
        let mut inner = self.lock();
        match (ticket, inner.state) {
            (Ticket::Closed { epoch }, State::Closed { failures }) if epoch == inner.epoch => {
                if succeeded {
                    inner.state = State::Closed { failures: 0 };
                    return;
                }
                let failures = failures.saturating_add(1);
                if failures >= self.failure_threshold {
                    inner.transition(State::Open {
                        opened_at: Instant::now(),
                    });
                } else {
                    inner.state = State::Closed { failures };
                }
            }
            (Ticket::Probe { epoch }, State::HalfOpen { .. }) if epoch == inner.epoch => {
                if succeeded {
                    inner.transition(State::Closed { failures: 0 });
                } else {
                    inner.transition(State::Open {
                        opened_at: Instant::now(),
                    });
                }
            }
            // Admitted before the last transition; the outcome is stale.
            _ => {}
        }
    }

    fn abandon(&self, ticket: Ticket) {
        let mut inner = self.lock();
        if let (Ticket::Probe { epoch }, State::HalfOpen { .. }) = (ticket, inner.state) {
            if epoch == inner.epoch {
                inner.state = State::HalfOpen {
                    probe_in_flight: false,
                };
            }
        }
    }

    /// Current state. An expired Open state is reported as Open until the
    /// next call claims the probe.
    pub fn state(&self) -> BreakerState {
        match self.lock().state {
            State::Closed { .. } => BreakerState::Closed,
            State::Open { .. } => BreakerState::Open,
            State::HalfOpen { .. } => BreakerState::HalfOpen,
        }
    }

    /// Consecutive failures counted in the current Closed period.
    pub fn failure_count(&self) -> u32 {
        match self.lock().state {
            State::Closed { failures } => failures,
            _ => 0,
        }
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn open_timeout(&self) -> Duration {
        self.open_timeout
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let state = self.lock().state;
        let (public, failure_count, open_remaining_ms) = match state {
            State::Closed { failures } => (BreakerState::Closed, failures, None),
            State::Open { opened_at } => {
                let remaining = self.open_timeout.saturating_sub(opened_at.elapsed());
                (BreakerState::Open, 0, Some(remaining.as_millis() as u64))
            }
            State::HalfOpen { .. } => (BreakerState::HalfOpen, 0, None),
        };
        BreakerSnapshot {
            state: public,
            failure_count,
            failure_threshold: self.failure_threshold,
            open_timeout_ms: self.open_timeout.as_millis() as u64,
            open_remaining_ms,
        }
    }
}

/// Admission granted by [`CircuitBreaker::acquire`].
///
/// Report the outcome with [`success`](Self::success) or
/// [`failure`](Self::failure). Dropping an unreported probe permit frees the
/// probe slot so the next caller can try.
#[derive(Debug)]
#[must_use = "report the outcome with success() or failure()"]
pub struct BreakerPermit<'a> {
    breaker: &'a CircuitBreaker,
    ticket: Option<Ticket>,
}

impl BreakerPermit<'_> {
    /// True when this permit is the Half-Open probe.
    pub fn is_probe(&self) -> bool {
        matches!(self.ticket, Some(Ticket::Probe { .. }))
    }

    pub fn success(mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.breaker.record(ticket, true);
        }
    }

    pub fn failure(mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.breaker.record(ticket, false);
        }
    }
}

impl Drop for BreakerPermit<'_> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.breaker.abandon(ticket);
        }
    }
}
