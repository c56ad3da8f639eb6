//! Tracing decorator for source clients.
//!
//! Wraps any [`Source`] and emits one event per fetch attempt with the
//! source name, latency, and outcome label. Extracted field values never
//! appear in trace output: observability must not leak product or user
//! content into logs.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, info_span, Instrument};

use crate::error::Result;
use crate::record::{PartialRecord, Query, SourceKind};
use crate::sources::Source;

/// A wrapper that adds per-attempt trace events to any source.
///
/// # Example
///
/// ```ignore
/// use nutrifetch::sources::{MockSource, TracedSource};
///
/// let source = TracedSource::new(MockSource::new("off-barcode"));
/// // Every fetch now emits a `source.fetch` event.
/// ```
pub struct TracedSource<S: Source> {
    inner: S,
}

impl<S: Source> TracedSource<S> {
    /// Wrap a source.
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Get a reference to the inner source.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Consume the wrapper and return the inner source.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[async_trait]
impl<S: Source> Source for TracedSource<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn kind(&self) -> SourceKind {
        self.inner.kind()
    }

    async fn fetch(&self, query: &Query, timeout: Duration) -> Result<PartialRecord> {
        let span = info_span!(
            "source.fetch",
            source = self.inner.name(),
            kind = ?self.inner.kind(),
        );

        let started = std::time::Instant::now();
        let result = self.inner.fetch(query, timeout).instrument(span).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        // Outcome and field count only; never the extracted values.
        match &result {
            Ok(record) => info!(
                source = self.inner.name(),
                latency_ms,
                outcome = "ok",
                fields = record.len(),
                "source attempt finished"
            ),
            Err(err) => info!(
                source = self.inner.name(),
                latency_ms,
                outcome = err.outcome_label(),
                "source attempt finished"
            ),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MockSource;
    use crate::FetchError;

    #[tokio::test]
    async fn test_decorator_is_transparent() {
        let inner = MockSource::new("off-barcode");
        inner.push_not_found();
        let traced = TracedSource::new(inner);

        assert_eq!(traced.name(), "off-barcode");
        assert_eq!(traced.kind(), SourceKind::StructuredDatabase);

        let result = traced
            .fetch(&Query::barcode("123"), Duration::from_millis(10))
            .await;
        assert!(matches!(result, Err(FetchError::NotFound)));
        assert_eq!(traced.inner().call_count(), 1);
    }
}
