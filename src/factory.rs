//! Source chain construction.
//!
//! Builds the ordered source list the orchestrator is constructed with.
//! The chain is always explicit data flowing into
//! [`FallbackOrchestrator::new`](crate::FallbackOrchestrator::new); this
//! module only assembles the common compositions.
//!
//! # Environment Variables
//!
//! - `NUTRIFETCH_SOURCE`: `default` (production chain) or `mock`
//! - Per-source configuration: see
//!   [`sources::openfoodfacts`](crate::sources::openfoodfacts) and
//!   [`sources::websearch`](crate::sources::websearch)

use std::sync::Arc;

use tracing::warn;

use crate::error::{FetchError, Result};
use crate::sources::{
    BarcodeLookupSource, MockSource, OpenFoodFactsClient, Source, TextSearchSource, TracedSource,
    WebSearchSource,
};

/// Assembles source chains in priority order.
pub struct SourceFactory;

impl SourceFactory {
    /// The production chain: barcode lookup, then database text search,
    /// then web search. Every source is wrapped for per-attempt tracing.
    pub fn production_chain() -> Result<Vec<Arc<dyn Source>>> {
        let client = OpenFoodFactsClient::from_env()?;
        Ok(vec![
            Arc::new(TracedSource::new(BarcodeLookupSource::new(client.clone()))),
            Arc::new(TracedSource::new(TextSearchSource::new(client))),
            Arc::new(TracedSource::new(WebSearchSource::from_env()?)),
        ])
    }

    /// A single scripted mock source, for tests and offline development.
    pub fn mock_chain() -> Vec<Arc<dyn Source>> {
        vec![Arc::new(TracedSource::new(MockSource::new("mock")))]
    }

    /// Select a chain from `NUTRIFETCH_SOURCE`, defaulting to the
    /// production chain.
    pub fn from_env() -> Result<Vec<Arc<dyn Source>>> {
        match std::env::var("NUTRIFETCH_SOURCE") {
            Ok(value) => match value.to_lowercase().as_str() {
                "mock" => Ok(Self::mock_chain()),
                "default" | "" => Self::production_chain(),
                other => Err(FetchError::Config(format!(
                    "unknown source selection '{}'. Valid options: default, mock",
                    other
                ))),
            },
            Err(_) => Self::production_chain(),
        }
    }

    /// Like [`from_env`](Self::from_env), but falls back to the mock chain
    /// with a warning instead of failing, for tooling that must start
    /// regardless of configuration.
    pub fn from_env_or_mock() -> Vec<Arc<dyn Source>> {
        match Self::from_env() {
            Ok(chain) => chain,
            Err(err) => {
                warn!(error = %err, "source configuration invalid, using mock chain");
                Self::mock_chain()
            }
        }
    }
}
