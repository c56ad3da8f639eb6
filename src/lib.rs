//! nutrifetch - Multi-Source Nutrition Data Retrieval
//!
//! Acquires a nutrition record for a scanned product through an ordered
//! chain of heterogeneous data sources and reconciles their partial
//! results into one confidence-scored record.
//!
//! This crate provides:
//! - Source client adapters behind a common trait
//! - Normalization of raw responses into canonical units
//! - Fallback orchestration with per-source time budgets
//! - Field-level conflict resolution by source authority and recency
//! - Deterministic confidence scoring
//!
//! # Sources
//!
//! | Source | Kind | Authority | Notes |
//! |--------|------|-----------|-------|
//! | `off-barcode` | Structured database | 0.9 | Exact GTIN lookup |
//! | `off-search` | Structured database | 0.9 | Free-text product search |
//! | `websearch` | Web search | 0.5 | SearXNG snippet extraction, last resort |
//! | `mock` | Configurable | — | Testing (no network) |
//!
//! # Architecture
//!
//! ```text
//! Query ──▶ Source 1 ──▶ normalize ──▶ sufficient? ──no──▶ Source 2 ──▶ ...
//!                                          │ yes
//!                                          ▼
//!                                    merge/resolve ──▶ confidence ──▶ MergedRecord
//! ```
//!
//! Per-source failures (`NotFound`, `Timeout`, transport errors) never
//! surface to the caller; the orchestrator always produces a record, down
//! to the empty zero-confidence sentinel when every source fails.
//!
//! # Example
//!
//! ```ignore
//! use nutrifetch::{FallbackOrchestrator, Query, RetrievalConfig, SourceFactory};
//!
//! let orchestrator = FallbackOrchestrator::new(
//!     SourceFactory::from_env()?,
//!     RetrievalConfig::from_env(),
//! )?;
//!
//! let record = orchestrator.fetch(&Query::barcode("3017620422003")).await?;
//! println!("{} fields at confidence {:.2}", record.fields.len(), record.confidence);
//! ```
//!
//! # See Also
//!
//! - [`crate::sources`] for source adapter implementations
//! - [`crate::orchestrator`] for the fallback state machine
//! - [`crate::merge`] for conflict resolution rules

pub mod config;
pub mod error;
pub mod factory;
pub mod merge;
pub mod normalize;
pub mod orchestrator;
pub mod record;
pub mod score;
pub mod sources;

pub use config::RetrievalConfig;
pub use error::{ChainAction, FetchError, Result};
pub use factory::SourceFactory;
pub use merge::merge;
pub use orchestrator::{ChainState, FallbackOrchestrator};
pub use record::{
    ChainOutcome, Conflict, FieldValue, MergedRecord, NutrientField, Observation, PartialRecord,
    QualityFlag, Query, ResolvedField, SourceKind,
};
pub use score::{confidence, conflict_penalty, coverage_fraction};
pub use sources::{
    BarcodeLookupSource, MockSource, OpenFoodFactsClient, Source, TextSearchSource, TracedSource,
    WebSearchSource,
};
