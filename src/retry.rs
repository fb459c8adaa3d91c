//! Retry with exponential backoff
//!
//! Wraps one delivery attempt (an HTTP POST, typically) in a bounded retry
//! loop: exponential backoff with a configurable multiplier, uniform jitter,
//! and an optional delay ceiling. Intermediate failures are logged and
//! swallowed; the final failure propagates to the caller.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

/// Default maximum delivery attempts
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default delay before the first retry
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Default backoff multiplier per attempt
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Default jitter as a fraction of the computed delay
pub const DEFAULT_JITTER_FRACTION: f64 = 0.1;

/// Bounded retry policy for delivery operations.
#[derive(Debug, Clone)]
pub struct RetryHandler {
    max_retries: u32,
    base_delay: Duration,
    backoff_multiplier: f64,
    jitter_fraction: f64,
    max_delay: Option<Duration>,
}

impl Default for RetryHandler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

impl RetryHandler {
    /// `max_retries` is clamped to at least one attempt.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries: max_retries.max(1),
            base_delay: DEFAULT_BASE_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            jitter_fraction: DEFAULT_JITTER_FRACTION,
            max_delay: None,
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self
    }

    pub fn with_jitter_fraction(mut self, fraction: f64) -> Self {
        self.jitter_fraction = fraction.max(0.0);
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Backoff before attempt `n` (0-indexed), before jitter and capping.
    /// Hard ceiling of one day keeps the duration finite at extreme settings.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let scaled = self.base_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_secs_f64(scaled.min(86_400.0))
    }

    fn next_delay(&self, attempt: u32) -> Duration {
        let mut delay = self.backoff_delay(attempt);
        if self.jitter_fraction > 0.0 {
            let jitter = delay.as_secs_f64() * self.jitter_fraction * rand::thread_rng().gen::<f64>();
            delay += Duration::from_secs_f64(jitter);
        }
        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    /// Run `operation` until it succeeds or attempts are exhausted.
    ///
    /// On the final failed attempt the operation's error is returned;
    /// earlier failures are logged at warn level and retried after a
    /// backoff sleep.
    pub async fn execute<T, E, F, Fut>(&self, mut operation: F, context: &str) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0u32;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.max_retries {
                        return Err(e);
                    }
                    let delay = self.next_delay(attempt);
                    tracing::warn!(
                        error = %e,
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis(),
                        context,
                        "Retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
