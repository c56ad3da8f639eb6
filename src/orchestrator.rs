//! Fallback orchestrator: sequences sources, decides when to stop, and
//! hands the accumulated partial records to the merge step.
//!
//! # State machine
//!
//! ```text
//! PENDING ──start──▶ TRYING(0) ──sufficient──▶ SUFFICIENT ─┐
//!                      │  ▲                                 ├──▶ merge
//!        insufficient/ │  │ next source                     │
//!        failure       ▼  │                                 │
//!                    TRYING(i+1) ──no more──▶ EXHAUSTED ────┘
//! ```
//!
//! Both terminal states produce a merged record. Exhaustion is not an
//! error: the best available partial data is returned with a
//! correspondingly low confidence, because "no nutrition data found" is
//! itself a valid, displayable outcome.
//!
//! # Isolation and cancellation
//!
//! Each orchestration run owns its accumulating list of partial records
//! and nothing else; concurrent runs share only the source clients, which
//! hold no mutable state. A failure in one source can therefore never
//! poison the next attempt. Cancelling the caller simply drops the future
//! mid-await; the in-flight source call is dropped with it and no merge
//! occurs.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::RetrievalConfig;
use crate::error::{ChainAction, FetchError, Result};
use crate::merge::merge;
use crate::record::{ChainOutcome, MergedRecord, NutrientField, PartialRecord, Query};
use crate::sources::Source;

/// Progress of one fallback chain run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    /// Not started.
    Pending,

    /// Currently consulting source `i`.
    Trying(usize),

    /// Stopped early: accumulated coverage met the sufficiency predicate.
    Sufficient,

    /// Ran out of sources (or out of the overall budget).
    Exhausted,
}

/// Sequences an injected, ordered list of sources for one query at a time.
///
/// The source list is explicit constructor input rather than module state,
/// so tests and per-request overrides can swap in any chain composition.
///
/// # Example
///
/// ```ignore
/// use nutrifetch::{FallbackOrchestrator, Query, RetrievalConfig, SourceFactory};
///
/// let sources = SourceFactory::from_env()?;
/// let orchestrator = FallbackOrchestrator::new(sources, RetrievalConfig::default())?;
/// let record = orchestrator.fetch(&Query::barcode("3017620422003")).await?;
/// println!("confidence {:.2}", record.confidence);
/// ```
pub struct FallbackOrchestrator {
    sources: Vec<Arc<dyn Source>>,
    config: RetrievalConfig,
}

impl FallbackOrchestrator {
    /// Create an orchestrator over an ordered source chain.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Config`] for an empty chain or an invalid
    /// configuration.
    pub fn new(sources: Vec<Arc<dyn Source>>, config: RetrievalConfig) -> Result<Self> {
        if sources.is_empty() {
            return Err(FetchError::Config(
                "fallback chain needs at least one source".to_string(),
            ));
        }
        config.validate()?;
        Ok(Self { sources, config })
    }

    /// The configured source chain, in priority order.
    pub fn sources(&self) -> &[Arc<dyn Source>] {
        &self.sources
    }

    /// Retrieve a merged nutrition record for a query.
    ///
    /// Always resolves to a record when the input is well-formed: every
    /// per-source failure falls through to the next source, and a fully
    /// failed chain yields the empty zero-confidence record. The only
    /// error is [`FetchError::InvalidQuery`].
    ///
    /// Bounded by the sum of per-source timeouts, or by the configured
    /// overall budget if one is set.
    pub async fn fetch(&self, query: &Query) -> Result<MergedRecord> {
        query.validate()?;

        let deadline = self.config.overall_budget.map(|b| Instant::now() + b);
        let mut partials: Vec<PartialRecord> = Vec::new();
        let mut state = ChainState::Pending;

        for (attempt, source) in self.sources.iter().enumerate() {
            state = ChainState::Trying(attempt);

            let mut budget = self.config.timeout_for(source.kind());
            if let Some(deadline) = deadline {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    debug!(attempt, "overall budget spent, treating as exhausted");
                    state = ChainState::Exhausted;
                    break;
                }
                budget = budget.min(remaining);
            }

            debug!(
                attempt,
                source = source.name(),
                budget_ms = budget.as_millis() as u64,
                "trying source"
            );

            match self.attempt(source.as_ref(), query, budget).await {
                Ok(record) => {
                    // Retain even sparse results; they may fill extra
                    // fields at merge time.
                    partials.push(record);
                    if self.is_sufficient(&partials) {
                        state = ChainState::Sufficient;
                        break;
                    }
                }
                Err(err) => match err.chain_action() {
                    ChainAction::Continue => {
                        debug!(
                            attempt,
                            source = source.name(),
                            outcome = err.outcome_label(),
                            "source failed, falling through"
                        );
                    }
                    ChainAction::Abort => return Err(err),
                },
            }
        }

        let outcome = match state {
            ChainState::Sufficient => ChainOutcome::Sufficient,
            _ => ChainOutcome::Exhausted,
        };

        let record = merge(partials, &self.config, outcome);
        info!(
            outcome = ?record.outcome,
            fields = record.fields.len(),
            conflicts = record.conflicts.len(),
            confidence = record.confidence,
            "retrieval finished"
        );
        Ok(record)
    }

    /// One isolated source attempt, never exceeding `budget` even if the
    /// client misbehaves.
    async fn attempt(
        &self,
        source: &dyn Source,
        query: &Query,
        budget: Duration,
    ) -> Result<PartialRecord> {
        match tokio::time::timeout(budget, source.fetch(query, budget)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout),
        }
    }

    /// Sufficiency predicate over the accumulated union of partials.
    ///
    /// Product name and calories are mandatory; beyond that, coverage of
    /// the configured required field set must reach the threshold.
    fn is_sufficient(&self, partials: &[PartialRecord]) -> bool {
        let present = |field: NutrientField| partials.iter().any(|p| p.contains(field));

        if !present(NutrientField::ProductName) || !present(NutrientField::CaloriesKcal) {
            return false;
        }

        let required = &self.config.required_fields;
        let covered = required.iter().filter(|f| present(**f)).count();
        covered as f64 / required.len() as f64 >= self.config.sufficiency_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FieldValue, SourceKind};
    use crate::sources::mock::{MockOutcome, MockSource};
    use std::time::SystemTime;

    fn record_with(source: &str, authority: f64, fields: &[(NutrientField, FieldValue)]) -> PartialRecord {
        let mut record = PartialRecord::new();
        for (field, value) in fields {
            record.insert(*field, value.clone(), source, authority, SystemTime::UNIX_EPOCH);
        }
        record
    }

    fn sufficient_record(source: &str) -> PartialRecord {
        record_with(
            source,
            0.9,
            &[
                (NutrientField::ProductName, "Granola".into()),
                (NutrientField::CaloriesKcal, 450.0.into()),
                (NutrientField::ProteinG, 9.0.into()),
                (NutrientField::CarbsG, 60.0.into()),
                (NutrientField::FatG, 16.0.into()),
            ],
        )
    }

    fn chain(sources: Vec<MockSource>) -> FallbackOrchestrator {
        let sources: Vec<Arc<dyn Source>> = sources
            .into_iter()
            .map(|s| Arc::new(s) as Arc<dyn Source>)
            .collect();
        FallbackOrchestrator::new(sources, RetrievalConfig::default()).unwrap()
    }

    #[test]
    fn test_constructor_rejects_empty_chain() {
        let result = FallbackOrchestrator::new(Vec::new(), RetrievalConfig::default());
        assert!(matches!(result, Err(FetchError::Config(_))));
    }

    #[test]
    fn test_constructor_rejects_invalid_config() {
        let config = RetrievalConfig {
            sufficiency_threshold: 2.0,
            ..Default::default()
        };
        let sources: Vec<Arc<dyn Source>> = vec![Arc::new(MockSource::new("a"))];
        assert!(FallbackOrchestrator::new(sources, config).is_err());
    }

    #[tokio::test]
    async fn test_invalid_query_is_the_only_caller_error() {
        let orchestrator = chain(vec![MockSource::new("a")]);
        let result = orchestrator.fetch(&Query::barcode("")).await;
        assert!(matches!(result, Err(FetchError::InvalidQuery(_))));
    }

    #[tokio::test]
    async fn test_first_source_sufficient_stops_chain() {
        let first = MockSource::new("first");
        first.push_record(sufficient_record("first"));
        let second = MockSource::new("second");
        let second_handle = second.clone();

        let orchestrator = chain(vec![first, second]);
        let record = orchestrator
            .fetch(&Query::barcode("123"))
            .await
            .unwrap();

        assert_eq!(record.outcome, ChainOutcome::Sufficient);
        assert_eq!(second_handle.call_count(), 0);
    }

    #[tokio::test]
    async fn test_not_found_falls_through_to_next_source() {
        let first = MockSource::new("first");
        first.push_not_found();
        let second = MockSource::new("second");
        second.push_record(sufficient_record("second"));

        let orchestrator = chain(vec![first, second]);
        let record = orchestrator
            .fetch(&Query::free_text("granola"))
            .await
            .unwrap();

        assert_eq!(record.outcome, ChainOutcome::Sufficient);
        assert_eq!(
            record.get(NutrientField::ProductName).unwrap().source,
            "second"
        );
    }

    #[tokio::test]
    async fn test_sufficiency_over_accumulated_union() {
        // Neither source alone is sufficient; together they are.
        let first = MockSource::new("first");
        first.push_record(record_with(
            "first",
            0.9,
            &[
                (NutrientField::ProductName, "Granola".into()),
                (NutrientField::CaloriesKcal, 450.0.into()),
            ],
        ));
        let second = MockSource::new("second");
        second.push_record(record_with(
            "second",
            0.5,
            &[
                (NutrientField::ProteinG, 9.0.into()),
                (NutrientField::FatG, 16.0.into()),
            ],
        ));
        let third = MockSource::new("third");
        let third_handle = third.clone();

        let orchestrator = chain(vec![first, second, third]);
        let record = orchestrator
            .fetch(&Query::free_text("granola"))
            .await
            .unwrap();

        // 4 of 5 required fields covered after the second source.
        assert_eq!(record.outcome, ChainOutcome::Sufficient);
        assert_eq!(third_handle.call_count(), 0);
        assert_eq!(record.fields.len(), 4);
    }

    #[tokio::test]
    async fn test_all_failures_yield_empty_zero_confidence_record() {
        let first = MockSource::new("first");
        first.push_timeout();
        let second = MockSource::new("second");
        second.push_transport("dns failure");

        let orchestrator = chain(vec![first, second]);
        let record = orchestrator
            .fetch(&Query::barcode("123"))
            .await
            .unwrap();

        assert!(record.is_empty());
        assert_eq!(record.confidence, 0.0);
        assert_eq!(record.outcome, ChainOutcome::Exhausted);
    }

    #[tokio::test]
    async fn test_insufficient_data_still_returned_on_exhaustion() {
        let only = MockSource::new("only");
        only.push_record(record_with(
            "only",
            0.9,
            &[(NutrientField::SodiumMg, 600.0.into())],
        ));

        let orchestrator = chain(vec![only]);
        let record = orchestrator
            .fetch(&Query::free_text("crackers"))
            .await
            .unwrap();

        assert_eq!(record.outcome, ChainOutcome::Exhausted);
        assert_eq!(
            record.get(NutrientField::SodiumMg).unwrap().value.as_number(),
            Some(600.0)
        );
        assert!(record.confidence > 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_source_is_cut_off_at_its_budget() {
        let hanging = MockSource::with_kind("hanging", SourceKind::StructuredDatabase);
        hanging.push(MockOutcome::Hang);
        let rescue = MockSource::new("rescue");
        rescue.push_record(sufficient_record("rescue"));

        let orchestrator = chain(vec![hanging, rescue]);
        let started = Instant::now();
        let record = orchestrator
            .fetch(&Query::barcode("123"))
            .await
            .unwrap();

        assert_eq!(record.outcome, ChainOutcome::Sufficient);
        // Structured budget is 3s; the hang consumed no more than that.
        assert!(started.elapsed() <= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overall_budget_expiry_treated_as_exhausted() {
        let slow = MockSource::new("slow").with_delay(Duration::from_millis(500));
        slow.push_not_found();
        let never_reached = MockSource::new("never");
        let never_handle = never_reached.clone();

        let config = RetrievalConfig {
            overall_budget: Some(Duration::from_millis(400)),
            ..Default::default()
        };
        let sources: Vec<Arc<dyn Source>> = vec![
            Arc::new(slow) as Arc<dyn Source>,
            Arc::new(never_reached) as Arc<dyn Source>,
        ];
        let orchestrator = FallbackOrchestrator::new(sources, config).unwrap();

        let record = orchestrator
            .fetch(&Query::barcode("123"))
            .await
            .unwrap();
        assert_eq!(record.outcome, ChainOutcome::Exhausted);
        assert_eq!(never_handle.call_count(), 0);
    }
}
