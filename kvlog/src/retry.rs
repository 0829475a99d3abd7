//! Bounded retry with jittered backoff for compare-and-swap loops.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;
use crate::error::{Error, Result};

/// Retry budget and delay between lost compare-and-swap races.
///
/// Both CAS loops (offset increment and commit advance) share this policy.
/// Between attempts the caller sleeps `base_delay` plus a uniformly random
/// jitter in `0..=max_jitter`, so colliding writers spread out instead of
/// retrying in lockstep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryPolicy {
    pub(crate) max_attempts: u32,
    pub(crate) base_delay: Duration,
    pub(crate) max_jitter: Duration,
}

impl RetryPolicy {
    pub(crate) fn from_config(config: &RetryConfig) -> Result<Self> {
        if config.max_attempts == 0 {
            return Err(Error::InvalidInput(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_jitter: Duration::from_millis(config.max_jitter_ms),
        })
    }

    /// Returns the delay to wait before the next attempt.
    pub(crate) fn backoff(&self) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        self.base_delay + Duration::from_millis(jitter)
    }

    /// Sleeps for one backoff interval.
    pub(crate) async fn wait(&self) {
        let delay = self.backoff();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_millis(5),
            max_jitter: Duration::from_millis(5),
        }
    }
}
