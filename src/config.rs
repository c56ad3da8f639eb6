//! Retrieval configuration.
//!
//! All fallback policy lives here and is injected into the orchestrator:
//! per-kind time budgets, the sufficiency predicate parameters, and the
//! numeric conflict tolerance. Nothing in the chain reads global state.
//!
//! # Environment Variables
//!
//! - `NUTRIFETCH_STRUCTURED_TIMEOUT_MS`: budget per structured lookup (default 3000)
//! - `NUTRIFETCH_SEARCH_TIMEOUT_MS`: budget per web search (default 5000)
//! - `NUTRIFETCH_SUFFICIENCY_THRESHOLD`: required-field coverage to stop early (default 0.6)
//! - `NUTRIFETCH_NUMERIC_TOLERANCE`: relative difference before numeric values conflict (default 0.05)
//! - `NUTRIFETCH_OVERALL_BUDGET_MS`: optional wall-clock cap for the whole chain

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{FetchError, Result};
use crate::record::{NutrientField, SourceKind};

/// Default budget for structured database lookups.
const DEFAULT_STRUCTURED_TIMEOUT: Duration = Duration::from_secs(3);

/// Default budget for unstructured web search.
const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Default required-field coverage to declare sufficiency.
const DEFAULT_SUFFICIENCY_THRESHOLD: f64 = 0.6;

/// Default relative tolerance before two numeric values conflict.
const DEFAULT_NUMERIC_TOLERANCE: f64 = 0.05;

/// Policy configuration for one fallback chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Time budget per structured-lookup attempt.
    pub structured_timeout: Duration,

    /// Time budget per web-search attempt. Longer than structured lookups:
    /// search engines are slower and consulted last.
    pub search_timeout: Duration,

    /// Required-field coverage in [0, 1] above which the chain stops
    /// consulting further sources.
    pub sufficiency_threshold: f64,

    /// The field set the sufficiency predicate is evaluated against.
    /// Product name and calories are mandatory regardless of coverage.
    pub required_fields: Vec<NutrientField>,

    /// Relative difference beyond which two numeric values are flagged
    /// as conflicting.
    pub numeric_tolerance: f64,

    /// Optional wall-clock cap for the whole chain; expiry is treated as
    /// chain exhaustion, not an error.
    pub overall_budget: Option<Duration>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            structured_timeout: DEFAULT_STRUCTURED_TIMEOUT,
            search_timeout: DEFAULT_SEARCH_TIMEOUT,
            sufficiency_threshold: DEFAULT_SUFFICIENCY_THRESHOLD,
            required_fields: vec![
                NutrientField::ProductName,
                NutrientField::CaloriesKcal,
                NutrientField::ProteinG,
                NutrientField::CarbsG,
                NutrientField::FatG,
            ],
            numeric_tolerance: DEFAULT_NUMERIC_TOLERANCE,
            overall_budget: None,
        }
    }
}

impl RetrievalConfig {
    /// Build a configuration from `NUTRIFETCH_*` environment variables,
    /// with defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(ms) = env_u64("NUTRIFETCH_STRUCTURED_TIMEOUT_MS") {
            config.structured_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_u64("NUTRIFETCH_SEARCH_TIMEOUT_MS") {
            config.search_timeout = Duration::from_millis(ms);
        }
        if let Some(threshold) = env_f64("NUTRIFETCH_SUFFICIENCY_THRESHOLD") {
            config.sufficiency_threshold = threshold;
        }
        if let Some(tolerance) = env_f64("NUTRIFETCH_NUMERIC_TOLERANCE") {
            config.numeric_tolerance = tolerance;
        }
        if let Some(ms) = env_u64("NUTRIFETCH_OVERALL_BUDGET_MS") {
            config.overall_budget = Some(Duration::from_millis(ms));
        }

        config
    }

    /// The time budget for one attempt against a source of this kind.
    pub fn timeout_for(&self, kind: SourceKind) -> Duration {
        match kind {
            SourceKind::StructuredDatabase | SourceKind::CuratedGuideline => {
                self.structured_timeout
            }
            SourceKind::WebSearch => self.search_timeout,
        }
    }

    /// Reject configurations that would make the chain misbehave.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.sufficiency_threshold) {
            return Err(FetchError::Config(format!(
                "sufficiency threshold must be in [0, 1], got {}",
                self.sufficiency_threshold
            )));
        }
        if self.numeric_tolerance < 0.0 {
            return Err(FetchError::Config(format!(
                "numeric tolerance must be non-negative, got {}",
                self.numeric_tolerance
            )));
        }
        if self.required_fields.is_empty() {
            return Err(FetchError::Config(
                "required field set must not be empty".to_string(),
            ));
        }
        if self.structured_timeout.is_zero() || self.search_timeout.is_zero() {
            return Err(FetchError::Config(
                "per-source timeouts must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

fn env_f64(name: &str) -> Option<f64> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}
