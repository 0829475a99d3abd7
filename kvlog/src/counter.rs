//! Monotonic integer counters over a compare-and-swap register.
//!
//! The linearizable store only offers read and compare-and-swap. A counter
//! update reads the current value, computes the replacement and swaps it in;
//! if another writer got there first the swap fails, and the loop backs off and
//! starts over from a fresh read. The same loop serves two purposes with
//! different update rules:
//!
//! - [`CounterService::increment`] always moves the counter up by one and is
//!   used to hand out offsets.
//! - [`CounterService::advance`] moves the counter to a target only if the
//!   target is larger, and is used for committed offsets.

use std::sync::Arc;

use common::{LinearizableStore, StorageError};

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use crate::serde::{deserialize_counter, serialize_counter};

#[derive(Clone)]
pub(crate) struct CounterService {
    store: Arc<dyn LinearizableStore>,
    retry: RetryPolicy,
}

impl CounterService {
    pub(crate) fn new(store: Arc<dyn LinearizableStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Reads the counter at `key`. A key that was never written reads as 0.
    pub(crate) async fn read(&self, key: &str) -> Result<u64> {
        let value = self.store.read(key).await?;
        deserialize_counter(key, value.as_ref())
    }

    /// Increments the counter at `key` and returns the post-increment value.
    pub(crate) async fn increment(&self, key: &str) -> Result<u64> {
        self.update(key, |current| {
            current
                .checked_add(1)
                .map(Some)
                .ok_or_else(|| Error::Internal(format!("counter at {} overflowed", key)))
        })
        .await
    }

    /// Raises the counter at `key` to `target` unless it is already at or
    /// above it. Returns the value stored once the call completes.
    pub(crate) async fn advance(&self, key: &str, target: u64) -> Result<u64> {
        self.update(key, |current| Ok((target > current).then_some(target)))
            .await
    }

    /// Runs the read/compute/swap loop.
    ///
    /// `next` maps the current value to the replacement, or to `None` when no
    /// write is needed, in which case the current value is returned as is.
    async fn update<F>(&self, key: &str, next: F) -> Result<u64>
    where
        F: Fn(u64) -> Result<Option<u64>>,
    {
        let max_attempts = self.retry.max_attempts;
        for attempt in 1..=max_attempts {
            let stored = self.store.read(key).await?;
            let current = deserialize_counter(key, stored.as_ref())?;
            let Some(replacement) = next(current)? else {
                return Ok(current);
            };

            let expected = stored.unwrap_or_else(|| serialize_counter(0));
            match self
                .store
                .compare_and_swap(key, expected, serialize_counter(replacement), true)
                .await
            {
                Ok(()) => return Ok(replacement),
                Err(StorageError::PreconditionFailed { .. }) => {
                    tracing::debug!(key, attempt, current, "compare-and-swap lost race");
                    if attempt < max_attempts {
                        self.retry.wait().await;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(key, attempts = max_attempts, "compare-and-swap retries exhausted");
        Err(Error::RetryExhausted {
            key: key.to_string(),
            attempts: max_attempts,
        })
    }
}
