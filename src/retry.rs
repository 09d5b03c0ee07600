//! Retry with backoff for flaky network calls.
//!
//! # Retry Strategy
//!
//! The delay before retry `n` (1-based) is:
//! ```text
//! delay = min(base_delay * multiplier^(n-1), max_delay) + random_jitter(0..=jitter)
//! ```
//! A multiplier of 1 gives a fixed pause between attempts, 2 gives classic
//! exponential backoff. Only errors the caller's predicate accepts are
//! retried; everything else is returned straight away.

use crate::error::{Error, Result};
use rand::{Rng, rng};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, warn};

#[derive(Debug, Clone)]
pub struct Backoff {
    /// Retries after the first attempt.
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
    multiplier: u32,
    jitter_ms: u64,
}

impl Backoff {
    /// Exponential backoff: `base_delay`, `2 * base_delay`, `4 * base_delay`, ...
    pub fn exponential(max_retries: usize, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
            multiplier: 2,
            jitter_ms: 250,
        }
    }

    /// Fixed pause between attempts, no jitter.
    pub fn fixed(max_retries: usize, delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay: delay,
            max_delay: delay,
            multiplier: 1,
            jitter_ms: 0,
        }
    }

    #[cfg(test)]
    pub fn with_jitter_ms(mut self, jitter_ms: u64) -> Self {
        self.jitter_ms = jitter_ms;
        self
    }

    fn delay_for(&self, attempt: usize) -> Duration {
        let factor = self.multiplier.saturating_pow((attempt - 1) as u32);
        let delay = self.base_delay.saturating_mul(factor).min(self.max_delay);
        if self.jitter_ms == 0 {
            return delay;
        }
        let jitter_ms: u64 = rng().random_range(0..=self.jitter_ms);
        delay + Duration::from_millis(jitter_ms)
    }

    /// Run `op` until it succeeds, fails with an error `retryable` rejects,
    /// or the retry budget runs out.
    pub async fn run<T, F, Fut, P>(&self, label: &str, retryable: P, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        P: Fn(&Error) -> bool,
    {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if !retryable(&e) {
                        return Err(e);
                    }

                    if attempt > self.max_retries {
                        error!(
                            label,
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        label,
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
