//! Concurrency limiter (bulkhead).
//!
//! # Responsibilities
//! - Bound the number of concurrently executing work units
//! - Block or reject excess work, per call site
//! - Release the slot on every exit path of the work
//!
//! # Design Decisions
//! - Slots are permits of a tokio semaphore; waiters are admitted FIFO
//! - A slot is an RAII permit, so panics and cancellation release it
//! - The work's output is returned untouched; its errors are never wrapped

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

use crate::config::ConcurrencyConfig;
use crate::error::ResilienceError;

/// Bounds simultaneous in-flight work.
///
/// Cloning is cheap and clones share the same slot pool.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    slots: Arc<Semaphore>,
    capacity: usize,
}

impl ConcurrencyLimiter {
    /// Create a limiter with `capacity` admission slots.
    pub fn new(capacity: usize) -> Result<Self, ResilienceError> {
        if capacity == 0 {
            return Err(ResilienceError::invalid(
                "concurrency capacity must be greater than zero",
            ));
        }
        if capacity > Semaphore::MAX_PERMITS {
            return Err(ResilienceError::invalid(format!(
                "concurrency capacity must not exceed {}",
                Semaphore::MAX_PERMITS
            )));
        }
        Ok(Self {
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    pub fn from_config(config: &ConcurrencyConfig) -> Result<Self, ResilienceError> {
        Self::new(config.max_in_flight)
    }

    /// Wait until a slot is free.
    ///
    /// Dropping the returned future before it resolves abandons the wait
    /// without holding a slot.
    pub async fn acquire(&self) -> Result<SlotPermit, ResilienceError> {
        // The semaphore is never closed, so the error arm is unreachable in practice.
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ResilienceError::Overloaded)?;
        Ok(SlotPermit { _permit: permit })
    }

    /// Wait at most `timeout` for a slot. A zero timeout never waits.
    pub async fn try_acquire_for(&self, timeout: Duration) -> Result<SlotPermit, ResilienceError> {
        if timeout.is_zero() {
            let permit = self
                .slots
                .clone()
                .try_acquire_owned()
                .map_err(|_| ResilienceError::Overloaded)?;
            return Ok(SlotPermit { _permit: permit });
        }

        match tokio::time::timeout(timeout, self.acquire()).await {
            Ok(permit) => permit,
            Err(_) => Err(ResilienceError::Overloaded),
        }
    }

    /// Run `work` once a slot is free, holding the slot until it finishes.
    pub async fn execute<F, Fut, R>(&self, work: F) -> Result<R, ResilienceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        let _slot = self.acquire().await?;
        Ok(work().await)
    }

    /// Like [`execute`](Self::execute) but gives up with `Overloaded` if no
    /// slot frees within `timeout`. `work` is not invoked in that case.
    pub async fn try_execute<F, Fut, R>(&self, work: F, timeout: Duration) -> Result<R, ResilienceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        let _slot = self.try_acquire_for(timeout).await?;
        Ok(work().await)
    }

    /// Detached execution: wait for admission here, then run `work` on a
    /// background task that holds the slot until it completes.
    pub async fn spawn<Fut>(&self, work: Fut) -> Result<JoinHandle<Fut::Output>, ResilienceError>
    where
        Fut: Future + Send + 'static,
        Fut::Output: Send + 'static,
    {
        let slot = self.acquire().await?;
        Ok(tokio::spawn(async move {
            let _slot = slot;
            work.await
        }))
    }

    /// Configured maximum concurrent admissions.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Admitted units that have not released their slot yet.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.available()
    }
}

/// A held admission slot. The slot returns to the pool when dropped.
#[derive(Debug)]
pub struct SlotPermit {
    _permit: OwnedSemaphorePermit,
}
