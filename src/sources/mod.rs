//! Source client implementations.
//!
//! One adapter per data source, all behind the [`Source`] trait so the
//! orchestrator, tests, and the tracing decorator are interchangeable over
//! any chain composition.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::record::{PartialRecord, Query, SourceKind};

pub mod mock;
pub use mock::MockSource;

pub mod openfoodfacts;
pub use openfoodfacts::{BarcodeLookupSource, OpenFoodFactsClient, TextSearchSource};

pub mod websearch;
pub use websearch::WebSearchSource;

pub mod trace;
pub use trace::TracedSource;

/// One external data provider consulted by the fallback chain.
///
/// # Contract
///
/// - `fetch` must respect the caller-supplied timeout; on expiry it returns
///   [`FetchError::Timeout`](crate::FetchError::Timeout) and never blocks
///   past the budget.
/// - "Product unknown" is a normal outcome
///   ([`FetchError::NotFound`](crate::FetchError::NotFound)), distinct from
///   transport failure and from timeout; callers branch on all three.
/// - Implementations hold no mutable state across calls; concurrent
///   retrievals share sources freely.
#[async_trait]
pub trait Source: Send + Sync {
    /// Stable name used in field attribution and trace events.
    fn name(&self) -> &str;

    /// Source kind, determining base authority and time budget.
    fn kind(&self) -> SourceKind;

    /// Look up the query, returning a normalized partial record.
    async fn fetch(&self, query: &Query, timeout: Duration) -> Result<PartialRecord>;
}
