//! Error types shared by the resilience primitives.
//!
//! Rejections are always surfaced as typed values to the immediate caller.
//! Errors produced by wrapped work are never rewritten: the bulkhead returns
//! the work's output as-is, and the breaker carries it in [`CallError::Inner`].

use thiserror::Error;

/// Errors produced by the primitives themselves.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResilienceError {
    /// Construction parameters were out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No concurrency slot became free within the bounded wait.
    #[error("overloaded: no concurrency slot available")]
    Overloaded,

    /// The circuit breaker rejected the call without invoking it.
    #[error("circuit breaker is open")]
    BreakerOpen,
}

impl ResilienceError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        ResilienceError::InvalidConfig(msg.into())
    }
}

/// Outcome of a call guarded by a [`CircuitBreaker`](crate::CircuitBreaker).
#[derive(Debug, Error)]
pub enum CallError<E> {
    /// Rejected; the wrapped operation was not invoked.
    #[error("circuit breaker is open")]
    Open,

    /// The wrapped operation ran and failed with this error.
    #[error(transparent)]
    Inner(E),
}

impl<E> CallError<E> {
    /// True when the breaker rejected the call.
    pub fn is_open(&self) -> bool {
        matches!(self, CallError::Open)
    }

    /// The wrapped operation's error, if it ran.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CallError::Open => None,
            CallError::Inner(e) => Some(e),
        }
    }
}
