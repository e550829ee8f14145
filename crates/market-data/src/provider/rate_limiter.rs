//! Minimum-interval rate limiter for a single provider.
//!
//! Every caller reserves the next free slot under the lock and then sleeps
//! until that slot outside of it, so concurrent callers queue up one
//! interval apart instead of all waking at the same instant.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

pub struct RateLimiter {
    provider: &'static str,
    min_interval: Duration,
    /// Earliest instant the next request may start.
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(provider: &'static str, min_interval: Duration) -> Self {
        Self {
            provider,
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Lock the slot mutex, recovering from poison if necessary.
    fn lock_slot(&self) -> MutexGuard<'_, Option<Instant>> {
        self.next_slot.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter mutex for '{}' was poisoned, recovering", self.provider);
            poisoned.into_inner()
        })
    }

    /// Wait (asynchronously) until this caller's slot comes up.
    pub async fn acquire(&self) {
        let slot = {
            let mut next = self.lock_slot();
            let now = Instant::now();
            let slot = match *next {
                Some(at) if at > now => at,
                _ => now,
            };
            *next = Some(slot + self.min_interval);
            slot
        };

        let now = Instant::now();
        if slot > now {
            debug!(
                "Rate limiter: waiting {:?} for provider '{}'",
                slot - now,
                self.provider
            );
            tokio::time::sleep_until(slot).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_request_is_immediate() {
        let limiter = RateLimiter::new("test", Duration::from_secs(2));
        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_request_waits_min_interval() {
        let limiter = RateLimiter::new("test", Duration::from_secs(2));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_after_interval_passed() {
        let limiter = RateLimiter::new("test", Duration::from_secs(1));
        limiter.acquire().await;
        tokio::time::advance(Duration::from_secs(5)).await;

        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_are_spaced() {
        let limiter = std::sync::Arc::new(RateLimiter::new("test", Duration::from_secs(1)));
        let start = Instant::now();

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.acquire().await;
                    Instant::now()
                })
            })
            .collect();

        let mut finished = Vec::new();
        for handle in handles {
            finished.push(handle.await.unwrap() - start);
        }
        finished.sort();
        assert_eq!(finished[0], Duration::ZERO);
        assert!(finished[2] >= Duration::from_secs(2));
    }
}
