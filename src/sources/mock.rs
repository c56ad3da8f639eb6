//! Mock source for testing the fallback chain.
//!
//! Deterministic, queue-based: each call consumes the next scripted
//! outcome, and an empty queue answers `NotFound`. An optional artificial
//! latency exercises timeout enforcement without touching the network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{FetchError, Result};
use crate::record::{PartialRecord, Query, SourceKind};
use crate::sources::Source;

/// One scripted outcome for a mock fetch.
#[derive(Debug, Clone)]
pub enum MockOutcome {
    /// Return this record.
    Record(PartialRecord),

    /// Answer "product unknown".
    NotFound,

    /// Fail with a timeout immediately.
    Timeout,

    /// Fail with a transport error.
    Transport(String),

    /// Sleep through the entire caller-supplied budget, then time out.
    /// Exercises the orchestrator's timeout enforcement path.
    Hang,
}

/// Scripted source for unit and integration tests.
#[derive(Debug, Clone)]
pub struct MockSource {
    name: String,
    kind: SourceKind,
    outcomes: Arc<Mutex<Vec<MockOutcome>>>,
    call_count: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl MockSource {
    /// Create a mock with structured-database authority.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_kind(name, SourceKind::StructuredDatabase)
    }

    /// Create a mock with a specific source kind.
    pub fn with_kind(name: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            name: name.into(),
            kind,
            outcomes: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(AtomicUsize::new(0)),
            delay: None,
        }
    }

    /// Add a fixed latency before every answer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue an outcome. The lock is never held across an await, so this
    /// cannot lose a scripted outcome under contention.
    pub fn push(&self, outcome: MockOutcome) {
        self.lock_outcomes().push(outcome);
    }

    /// Queue a successful record.
    pub fn push_record(&self, record: PartialRecord) {
        self.push(MockOutcome::Record(record));
    }

    /// Queue a "product unknown" answer.
    pub fn push_not_found(&self) {
        self.push(MockOutcome::NotFound);
    }

    /// Queue an immediate timeout.
    pub fn push_timeout(&self) {
        self.push(MockOutcome::Timeout);
    }

    /// Queue a transport failure.
    pub fn push_transport(&self, message: impl Into<String>) {
        self.push(MockOutcome::Transport(message.into()));
    }

    /// Number of fetches served so far.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Whether every scripted outcome has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.lock_outcomes().is_empty()
    }

    fn next_outcome(&self) -> MockOutcome {
        let mut outcomes = self.lock_outcomes();
        if outcomes.is_empty() {
            MockOutcome::NotFound
        } else {
            outcomes.remove(0)
        }
    }

    fn lock_outcomes(&self) -> MutexGuard<'_, Vec<MockOutcome>> {
        match self.outcomes.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl Source for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch(&self, _query: &Query, timeout: Duration) -> Result<PartialRecord> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.next_outcome() {
            MockOutcome::Record(record) => Ok(record),
            MockOutcome::NotFound => Err(FetchError::NotFound),
            MockOutcome::Timeout => Err(FetchError::Timeout),
            MockOutcome::Transport(message) => Err(FetchError::Transport(message)),
            MockOutcome::Hang => {
                tokio::time::sleep(timeout).await;
                Err(FetchError::Timeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::NutrientField;
    use std::time::SystemTime;

    fn sample_record(name: &str) -> PartialRecord {
        PartialRecord::new().with_field(
            NutrientField::ProductName,
            name,
            "mock",
            0.9,
            SystemTime::UNIX_EPOCH,
        )
    }

    #[tokio::test]
    async fn test_outcomes_consumed_in_order() {
        let source = MockSource::new("mock");
        source.push_record(sample_record("first"));
        source.push_not_found();

        let query = Query::free_text("anything");
        let budget = Duration::from_millis(100);

        let first = source.fetch(&query, budget).await.unwrap();
        assert_eq!(
            first.get(NutrientField::ProductName).unwrap().value.as_text(),
            Some("first")
        );

        let second = source.fetch(&query, budget).await;
        assert!(matches!(second, Err(FetchError::NotFound)));
        assert_eq!(source.call_count(), 2);
        assert!(source.is_exhausted());
    }

    #[tokio::test]
    async fn test_empty_queue_defaults_to_not_found() {
        let source = MockSource::new("mock");
        let result = source
            .fetch(&Query::barcode("123"), Duration::from_millis(10))
            .await;
        assert!(matches!(result, Err(FetchError::NotFound)));
    }

    #[tokio::test]
    async fn test_scripted_failures() {
        let source = MockSource::new("mock");
        source.push_timeout();
        source.push_transport("connection refused");

        let query = Query::barcode("123");
        let budget = Duration::from_millis(10);
        assert!(matches!(
            source.fetch(&query, budget).await,
            Err(FetchError::Timeout)
        ));
        assert!(matches!(
            source.fetch(&query, budget).await,
            Err(FetchError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_contended_pushes_are_never_lost() {
        let source = MockSource::new("mock");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let source = source.clone();
                std::thread::spawn(move || {
                    for i in 0..10 {
                        source.push_record(sample_record(&format!("item-{}", i)));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let query = Query::free_text("anything");
        let budget = Duration::from_millis(10);
        for _ in 0..80 {
            assert!(source.fetch(&query, budget).await.is_ok());
        }
        assert!(source.is_exhausted());
    }

    #[tokio::test]
    async fn test_hang_respects_budget() {
        let source = MockSource::new("mock");
        source.push(MockOutcome::Hang);

        let started = tokio::time::Instant::now();
        let result = source
            .fetch(&Query::barcode("123"), Duration::from_millis(20))
            .await;
        assert!(matches!(result, Err(FetchError::Timeout)));
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
