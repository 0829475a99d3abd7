//! Core Log implementation.
//!
//! This module provides the [`Log`] struct, the log engine that turns the two
//! primitive stores into log semantics. It exposes the four operations served
//! to clients: [`append`](Log::append), [`poll`](Log::poll),
//! [`commit_offsets`](Log::commit_offsets) and
//! [`list_committed_offsets`](Log::list_committed_offsets).

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use common::storage::factory::{Stores, create_storage};
use dashmap::DashMap;
use futures::future::try_join_all;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::counter::CounterService;
use crate::error::{Error, Result};
use crate::model::{LogEntry, Offset};
use crate::retry::RetryPolicy;
use crate::serde::{CommittedOffsetKey, OffsetCounterKey};
use crate::storage::LogStorage;

/// Topic whose offset counter is read by [`Log::check_storage`].
const READINESS_CHECK_TOPIC: &str = "_kvlog_ready";

/// The log engine.
///
/// Offsets come from a per-topic counter in the linearizable store, entries
/// live one per key in the sequential store, and committed offsets are a
/// second per-topic counter that only ever moves forward.
///
/// # Thread Safety
///
/// `Log` is designed to be shared across tasks. All methods take `&self`.
/// Appends to the same topic serialize on a per-topic lock around offset
/// assignment only; appends to different topics and every read or commit run
/// without taking any lock.
///
/// # Consistency
///
/// Offsets within a topic are unique and strictly increasing. An entry
/// becomes visible some time after its offset is assigned, so a poll may
/// briefly see a gap where an in-flight append has not written yet. An append
/// that fails after taking its offset leaves that gap permanently; readers
/// skip it.
///
/// # Example
///
/// ```ignore
/// use std::collections::HashMap;
/// use bytes::Bytes;
/// use kvlog::{Config, Log};
///
/// let log = Log::open(config).await?;
/// let offset = log.append("orders", Bytes::from("42")).await?;
///
/// let polled = log.poll(HashMap::from([("orders".to_string(), 0)])).await?;
/// log.commit_offsets(HashMap::from([("orders".to_string(), offset)])).await?;
/// ```
pub struct Log {
    counters: CounterService,
    storage: LogStorage,
    append_locks: DashMap<String, Arc<Mutex<()>>>,
    max_poll_messages: usize,
}

impl Log {
    /// Opens a log over the storage backend described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend cannot be initialized or the
    /// retry configuration is invalid.
    pub async fn open(config: Config) -> Result<Self> {
        let stores = create_storage(&config.storage)
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;
        Self::with_stores(stores, &config)
    }

    /// Creates a log over already-constructed stores.
    ///
    /// `config.storage` is ignored; the retry and poll settings apply.
    pub fn with_stores(stores: Stores, config: &Config) -> Result<Self> {
        if config.max_poll_messages == 0 {
            return Err(Error::InvalidInput(
                "max_poll_messages must be at least 1".to_string(),
            ));
        }
        let retry = RetryPolicy::from_config(&config.retry)?;
        Ok(Self {
            counters: CounterService::new(stores.linearizable, retry),
            storage: LogStorage::new(stores.sequential),
            append_locks: DashMap::new(),
            max_poll_messages: config.max_poll_messages,
        })
    }

    /// Appends `value` to `topic` and returns the offset assigned to it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RetryExhausted`] if the offset counter stayed
    /// contended for the whole retry budget; no offset is consumed in that
    /// case. Returns a storage error if the entry write fails; the offset is
    /// then consumed and shows up as a gap.
    #[tracing::instrument(level = "debug", skip(self, value))]
    pub async fn append(&self, topic: &str, value: Bytes) -> Result<Offset> {
        let counter_key = OffsetCounterKey::new(topic).serialize();
        let lock = self.append_lock(topic);
        let offset = {
            let _guard = lock.lock().await;
            self.counters.increment(&counter_key).await? - 1
        };

        self.storage.write_entry(topic, offset, value).await?;
        tracing::debug!(offset, "appended entry");
        Ok(offset)
    }

    /// Reads entries for every topic in `offsets`, starting at the given
    /// offset (inclusive).
    ///
    /// Each topic returns at most `max_poll_messages` entries in offset order.
    /// Only offsets below the topic's counter at the time of the call are
    /// considered; unwritten offsets are skipped. Topics that were never
    /// appended to return an empty list. Topics are read concurrently, and any
    /// failure fails the whole poll.
    #[tracing::instrument(level = "debug", skip_all, fields(topics = offsets.len()))]
    pub async fn poll(
        &self,
        offsets: HashMap<String, Offset>,
    ) -> Result<HashMap<String, Vec<LogEntry>>> {
        let reads = offsets.into_iter().map(|(topic, start)| async move {
            let end = self
                .counters
                .read(&OffsetCounterKey::new(&topic).serialize())
                .await?;
            let entries = self
                .storage
                .scan_entries(&topic, start..end, self.max_poll_messages)
                .await?;
            Ok::<_, Error>((topic, entries))
        });
        Ok(try_join_all(reads).await?.into_iter().collect())
    }

    /// Records committed offsets for every topic in `offsets`.
    ///
    /// A committed offset never decreases: committing a value at or below the
    /// stored one is a no-op. Topics are committed concurrently.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RetryExhausted`] if any topic's update kept losing
    /// races. Topics whose update already landed stay committed.
    #[tracing::instrument(level = "debug", skip_all, fields(topics = offsets.len()))]
    pub async fn commit_offsets(&self, offsets: HashMap<String, Offset>) -> Result<()> {
        let commits = offsets.into_iter().map(|(topic, offset)| async move {
            let key = CommittedOffsetKey::new(&topic).serialize();
            self.counters.advance(&key, offset).await
        });
        try_join_all(commits).await?;
        Ok(())
    }

    /// Returns the committed offset of each topic in `topics`.
    ///
    /// Topics that were never committed report 0.
    #[tracing::instrument(level = "debug", skip_all, fields(topics = topics.len()))]
    pub async fn list_committed_offsets(
        &self,
        topics: Vec<String>,
    ) -> Result<HashMap<String, Offset>> {
        let reads = topics.into_iter().map(|topic| async move {
            let committed = self
                .counters
                .read(&CommittedOffsetKey::new(&topic).serialize())
                .await?;
            Ok::<_, Error>((topic, committed))
        });
        Ok(try_join_all(reads).await?.into_iter().collect())
    }

    /// Verifies that the linearizable store answers reads.
    ///
    /// Reads a single register without touching any topic's state.
    pub async fn check_storage(&self) -> Result<()> {
        self.counters
            .read(&OffsetCounterKey::new(READINESS_CHECK_TOPIC).serialize())
            .await?;
        Ok(())
    }

    /// Returns the lock that serializes offset assignment for `topic`.
    fn append_lock(&self, topic: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.append_locks.get(topic) {
            return Arc::clone(lock.value());
        }
        Arc::clone(self.append_locks.entry(topic.to_string()).or_default().value())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use async_trait::async_trait;
    use common::storage::in_memory::InMemoryStorage;
    use common::{LinearizableStore, SequentialStore, StorageConfig, StorageError, StorageResult};

    use super::*;
    use crate::config::RetryConfig;

    fn test_config() -> Config {
        Config {
            storage: StorageConfig::InMemory,
            retry: RetryConfig {
                max_attempts: 1_000,
                base_delay_ms: 0,
                max_jitter_ms: 1,
            },
            ..Default::default()
        }
    }

    fn with_storage() -> (Log, Arc<InMemoryStorage>) {
        let storage = Arc::new(InMemoryStorage::new());
        let log = Log::with_stores(Stores::shared(storage.clone()), &test_config()).unwrap();
        (log, storage)
    }

    fn topics(pairs: &[(&str, Offset)]) -> HashMap<String, Offset> {
        pairs.iter().map(|(t, o)| (t.to_string(), *o)).collect()
    }

    fn offsets_of(entries: &[LogEntry]) -> Vec<Offset> {
        entries.iter().map(|e| e.offset).collect()
    }

    /// Sequential store whose writes always fail.
    struct BrokenWrites(InMemoryStorage);

    #[async_trait]
    impl SequentialStore for BrokenWrites {
        async fn read(&self, key: &str) -> StorageResult<Option<Bytes>> {
            SequentialStore::read(&self.0, key).await
        }

        async fn write(&self, _key: &str, _value: Bytes) -> StorageResult<()> {
            Err(StorageError::Storage("disk full".to_string()))
        }
    }

    /// Register store where every compare-and-swap loses.
    struct AlwaysContended;

    #[async_trait]
    impl LinearizableStore for AlwaysContended {
        async fn read(&self, _key: &str) -> StorageResult<Option<Bytes>> {
            Ok(None)
        }

        async fn compare_and_swap(
            &self,
            key: &str,
            _expected: Bytes,
            _new: Bytes,
            _create_if_absent: bool,
        ) -> StorageResult<()> {
            Err(StorageError::PreconditionFailed {
                key: key.to_string(),
            })
        }
    }

    #[tokio::test]
    async fn should_open_log_with_in_memory_config() {
        // given
        let config = test_config();

        // when
        let result = Log::open(config).await;

        // then
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn should_reject_zero_poll_limit() {
        // given
        let config = Config {
            max_poll_messages: 0,
            ..test_config()
        };

        // when
        let result = Log::open(config).await;

        // then
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn should_run_end_to_end_scenario() {
        // given
        let log = Log::open(test_config()).await.unwrap();

        // when
        let first = log.append("t", Bytes::from("42")).await.unwrap();
        let second = log.append("t", Bytes::from("43")).await.unwrap();
        let polled = log.poll(topics(&[("t", 0)])).await.unwrap();
        log.commit_offsets(topics(&[("t", 1)])).await.unwrap();
        let committed = log
            .list_committed_offsets(vec!["t".to_string()])
            .await
            .unwrap();

        // then
        assert_eq!(first, 0);
        assert_eq!(second, 1);
        let entries = &polled["t"];
        assert_eq!(offsets_of(entries), vec![0, 1]);
        assert_eq!(entries[0].value, Bytes::from("42"));
        assert_eq!(entries[1].value, Bytes::from("43"));
        assert_eq!(committed, topics(&[("t", 1)]));
    }

    #[tokio::test]
    async fn should_assign_distinct_offsets_to_identical_payloads() {
        // given
        let log = Log::open(test_config()).await.unwrap();

        // when
        let first = log.append("t", Bytes::from("same")).await.unwrap();
        let second = log.append("t", Bytes::from("same")).await.unwrap();

        // then
        assert!(second > first);
    }

    #[tokio::test]
    async fn should_number_topics_independently() {
        // given
        let log = Log::open(test_config()).await.unwrap();

        // when
        let a0 = log.append("a", Bytes::from("x")).await.unwrap();
        let b0 = log.append("b", Bytes::from("y")).await.unwrap();
        let a1 = log.append("a", Bytes::from("z")).await.unwrap();

        // then
        assert_eq!((a0, b0, a1), (0, 0, 1));
    }

    #[tokio::test]
    async fn should_store_entries_under_derived_keys() {
        // given
        let (log, storage) = with_storage();

        // when
        log.append("orders", Bytes::from("7")).await.unwrap();

        // then
        let counter = LinearizableStore::read(storage.as_ref(), "offsets/orders")
            .await
            .unwrap();
        let entry = SequentialStore::read(storage.as_ref(), "logs/orders/0")
            .await
            .unwrap();
        assert_eq!(counter, Some(Bytes::from("1")));
        assert_eq!(entry, Some(Bytes::from("7")));
    }

    #[tokio::test]
    async fn should_return_empty_poll_for_unknown_topic() {
        // given
        let log = Log::open(test_config()).await.unwrap();

        // when
        let polled = log.poll(topics(&[("missing", 0)])).await.unwrap();

        // then
        assert_eq!(polled.len(), 1);
        assert!(polled["missing"].is_empty());
    }

    #[tokio::test]
    async fn should_poll_from_start_offset() {
        // given
        let log = Log::open(test_config()).await.unwrap();
        for i in 0..5 {
            log.append("t", Bytes::from(i.to_string())).await.unwrap();
        }

        // when
        let polled = log.poll(topics(&[("t", 3)])).await.unwrap();

        // then
        assert_eq!(offsets_of(&polled["t"]), vec![3, 4]);
    }

    #[tokio::test]
    async fn should_cap_poll_at_ten_entries_per_topic() {
        // given
        let log = Log::open(test_config()).await.unwrap();
        for i in 0..25 {
            log.append("t", Bytes::from(i.to_string())).await.unwrap();
        }

        // when
        let polled = log.poll(topics(&[("t", 2)])).await.unwrap();

        // then
        assert_eq!(offsets_of(&polled["t"]), (2..12).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn should_return_empty_poll_past_end_of_log() {
        // given
        let log = Log::open(test_config()).await.unwrap();
        log.append("t", Bytes::from("only")).await.unwrap();

        // when
        let polled = log.poll(topics(&[("t", 5)])).await.unwrap();

        // then
        assert!(polled["t"].is_empty());
    }

    #[tokio::test]
    async fn should_skip_gap_left_by_lost_write() {
        // given
        let (log, storage) = with_storage();
        log.append("t", Bytes::from("zero")).await.unwrap();
        // offset 1 is assigned but its entry never lands
        storage
            .compare_and_swap("offsets/t", Bytes::from("1"), Bytes::from("2"), false)
            .await
            .unwrap();
        log.append("t", Bytes::from("two")).await.unwrap();

        // when
        let polled = log.poll(topics(&[("t", 0)])).await.unwrap();

        // then
        assert_eq!(offsets_of(&polled["t"]), vec![0, 2]);
    }

    #[tokio::test]
    async fn should_not_read_entries_beyond_counter() {
        // given
        let (log, storage) = with_storage();
        log.append("t", Bytes::from("zero")).await.unwrap();
        // an entry whose offset was never handed out must stay invisible
        storage
            .write("logs/t/1", Bytes::from("stray"))
            .await
            .unwrap();

        // when
        let polled = log.poll(topics(&[("t", 0)])).await.unwrap();

        // then
        assert_eq!(offsets_of(&polled["t"]), vec![0]);
    }

    #[tokio::test]
    async fn should_poll_multiple_topics_in_one_call() {
        // given
        let log = Log::open(test_config()).await.unwrap();
        log.append("a", Bytes::from("a0")).await.unwrap();
        log.append("b", Bytes::from("b0")).await.unwrap();
        log.append("b", Bytes::from("b1")).await.unwrap();

        // when
        let polled = log.poll(topics(&[("a", 0), ("b", 1)])).await.unwrap();

        // then
        assert_eq!(offsets_of(&polled["a"]), vec![0]);
        assert_eq!(offsets_of(&polled["b"]), vec![1]);
        assert_eq!(polled["b"][0].value, Bytes::from("b1"));
    }

    #[tokio::test]
    async fn should_report_zero_for_uncommitted_topic() {
        // given
        let log = Log::open(test_config()).await.unwrap();

        // when
        let committed = log
            .list_committed_offsets(vec!["t".to_string()])
            .await
            .unwrap();

        // then
        assert_eq!(committed, topics(&[("t", 0)]));
    }

    #[tokio::test]
    async fn should_keep_highest_committed_offset() {
        // given
        let log = Log::open(test_config()).await.unwrap();

        // when
        for offset in [4, 9, 2, 9, 7] {
            log.commit_offsets(topics(&[("t", offset)])).await.unwrap();
        }

        // then
        let committed = log
            .list_committed_offsets(vec!["t".to_string()])
            .await
            .unwrap();
        assert_eq!(committed["t"], 9);
    }

    #[tokio::test]
    async fn should_commit_several_topics_at_once() {
        // given
        let log = Log::open(test_config()).await.unwrap();

        // when
        log.commit_offsets(topics(&[("a", 3), ("b", 5)]))
            .await
            .unwrap();

        // then
        let committed = log
            .list_committed_offsets(vec!["a".to_string(), "b".to_string(), "c".to_string()])
            .await
            .unwrap();
        assert_eq!(committed, topics(&[("a", 3), ("b", 5), ("c", 0)]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn should_keep_maximum_under_concurrent_commits() {
        // given
        let log = Arc::new(Log::open(test_config()).await.unwrap());

        // when
        let tasks: Vec<_> = [5, 3, 8]
            .into_iter()
            .map(|offset| {
                let log = log.clone();
                tokio::spawn(async move { log.commit_offsets(topics(&[("t", offset)])).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        // then
        let committed = log
            .list_committed_offsets(vec!["t".to_string()])
            .await
            .unwrap();
        assert_eq!(committed["t"], 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn should_assign_unique_offsets_to_concurrent_appends() {
        // given
        let log = Arc::new(Log::open(test_config()).await.unwrap());

        // when
        let tasks: Vec<_> = (0..40)
            .map(|i| {
                let log = log.clone();
                tokio::spawn(async move { log.append("t", Bytes::from(i.to_string())).await })
            })
            .collect();
        let mut offsets = HashSet::new();
        for task in tasks {
            offsets.insert(task.await.unwrap().unwrap());
        }

        // then
        assert_eq!(offsets.len(), 40);
        assert_eq!(offsets, (0..40).collect::<HashSet<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn should_assign_unique_offsets_across_logs_sharing_stores() {
        // given
        let storage = Arc::new(InMemoryStorage::new());
        let first = Arc::new(
            Log::with_stores(Stores::shared(storage.clone()), &test_config()).unwrap(),
        );
        let second =
            Arc::new(Log::with_stores(Stores::shared(storage), &test_config()).unwrap());

        // when
        let tasks: Vec<_> = (0..30)
            .map(|i| {
                let log = if i % 2 == 0 { first.clone() } else { second.clone() };
                tokio::spawn(async move { log.append("t", Bytes::from("x")).await })
            })
            .collect();
        let mut offsets = HashSet::new();
        for task in tasks {
            offsets.insert(task.await.unwrap().unwrap());
        }

        // then
        assert_eq!(offsets.len(), 30);
    }

    #[tokio::test]
    async fn should_fail_append_without_offset_when_counter_contended() {
        // given
        let storage = Arc::new(InMemoryStorage::new());
        let stores = Stores {
            linearizable: Arc::new(AlwaysContended),
            sequential: storage.clone(),
        };
        let config = Config {
            retry: RetryConfig {
                max_attempts: 3,
                base_delay_ms: 0,
                max_jitter_ms: 0,
            },
            ..test_config()
        };
        let log = Log::with_stores(stores, &config).unwrap();

        // when
        let result = log.append("t", Bytes::from("x")).await;

        // then
        assert!(matches!(
            result,
            Err(Error::RetryExhausted { attempts: 3, .. })
        ));
        assert!(
            SequentialStore::read(storage.as_ref(), "logs/t/0")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn should_fail_commit_when_retries_exhausted() {
        // given
        let stores = Stores {
            linearizable: Arc::new(AlwaysContended),
            sequential: Arc::new(InMemoryStorage::new()),
        };
        let log = Log::with_stores(stores, &test_config()).unwrap();

        // when
        let result = log.commit_offsets(topics(&[("t", 1)])).await;

        // then
        assert!(matches!(result, Err(Error::RetryExhausted { .. })));
    }

    #[tokio::test]
    async fn should_leave_gap_when_entry_write_fails() {
        // given
        let registers = Arc::new(InMemoryStorage::new());
        let broken = Log::with_stores(
            Stores {
                linearizable: registers.clone(),
                sequential: Arc::new(BrokenWrites(InMemoryStorage::new())),
            },
            &test_config(),
        )
        .unwrap();
        let healthy = Log::with_stores(Stores::shared(registers), &test_config()).unwrap();

        // when
        let failed = broken.append("t", Bytes::from("lost")).await;
        let next = healthy.append("t", Bytes::from("kept")).await.unwrap();
        let polled = healthy.poll(topics(&[("t", 0)])).await.unwrap();

        // then
        assert!(matches!(failed, Err(Error::Storage(_))));
        assert_eq!(next, 1);
        assert_eq!(offsets_of(&polled["t"]), vec![1]);
    }

    #[tokio::test]
    async fn should_back_off_between_attempts() {
        // given
        let stores = Stores {
            linearizable: Arc::new(AlwaysContended),
            sequential: Arc::new(InMemoryStorage::new()),
        };
        let config = Config {
            retry: RetryConfig {
                max_attempts: 3,
                base_delay_ms: 20,
                max_jitter_ms: 0,
            },
            ..test_config()
        };
        let log = Log::with_stores(stores, &config).unwrap();

        // when
        let started = std::time::Instant::now();
        let _ = log.commit_offsets(topics(&[("t", 1)])).await;

        // then
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    /// Register store that cannot be reached.
    struct Unreachable;

    #[async_trait]
    impl LinearizableStore for Unreachable {
        async fn read(&self, _key: &str) -> StorageResult<Option<Bytes>> {
            Err(StorageError::Storage("connection refused".to_string()))
        }

        async fn compare_and_swap(
            &self,
            _key: &str,
            _expected: Bytes,
            _new: Bytes,
            _create_if_absent: bool,
        ) -> StorageResult<()> {
            Err(StorageError::Storage("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn should_pass_storage_check_on_healthy_store() {
        // given
        let (log, _) = with_storage();

        // when
        let result = log.check_storage().await;

        // then
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn should_fail_storage_check_when_store_unreachable() {
        // given
        let stores = Stores {
            linearizable: Arc::new(Unreachable),
            sequential: Arc::new(InMemoryStorage::new()),
        };
        let log = Log::with_stores(stores, &test_config()).unwrap();

        // when
        let result = log.check_storage().await;

        // then
        assert!(matches!(result, Err(Error::Storage(_))));
    }
}
