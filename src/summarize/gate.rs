//! Concurrency gate for summarizer calls
//!
//! A semaphore caps in-flight calls; an optional minimum interval spaces
//! call starts for services with per-second limits.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

/// Permit holder for one external call; dropping it frees the slot
pub struct CallPermit {
    _permit: OwnedSemaphorePermit,
}

pub struct CallGate {
    semaphore: Arc<Semaphore>,
    min_interval: Duration,
    next_start: Mutex<Instant>,
}

impl CallGate {
    pub fn new(max_concurrent: usize, min_interval: Duration) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            min_interval,
            next_start: Mutex::new(Instant::now()),
        }
    }

    /// Wait for a free slot (and the pacing interval, when set)
    ///
    /// Returns `None` only if the gate was closed.
    pub async fn acquire(&self) -> Option<CallPermit> {
        let permit = Arc::clone(&self.semaphore).acquire_owned().await.ok()?;

        if !self.min_interval.is_zero() {
            let wait_until = {
                let mut next = self.next_start.lock().await;
                let now = Instant::now();
                let start_at = (*next).max(now);
                *next = start_at + self.min_interval;
                start_at
            };
            tokio::time::sleep_until(wait_until).await;
        }

        Some(CallPermit { _permit: permit })
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Refuse all further acquisitions; pending waiters get `None`
    pub fn close(&self) {
        self.semaphore.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_permits_are_bounded() {
        let gate = CallGate::new(2, Duration::ZERO);
        let a = gate.acquire().await.unwrap();
        let _b = gate.acquire().await.unwrap();
        assert_eq!(gate.available(), 0);
        drop(a);
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn test_closed_gate_refuses() {
        let gate = CallGate::new(1, Duration::ZERO);
        gate.close();
        assert!(gate.acquire().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_min_interval_spaces_starts() {
        let gate = CallGate::new(4, Duration::from_millis(500));
        let started = Instant::now();
        let _a = gate.acquire().await.unwrap();
        let _b = gate.acquire().await.unwrap();
        let _c = gate.acquire().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(1_000));
    }
}
