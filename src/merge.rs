//! Merge/conflict resolver: many partial records into one merged record.
//!
//! For each field appearing anywhere, the winning observation is the one
//! with the highest source authority, then the most recent `retrieved_at`,
//! then the lexically smallest source name so that ties resolve the same
//! way regardless of arrival order. Losing values that disagree beyond
//! tolerance are kept in the `conflicts` list for citation display; losers
//! within tolerance are agreement, not conflict.

use std::collections::BTreeMap;

use crate::config::RetrievalConfig;
use crate::record::{
    ChainOutcome, Conflict, MergedRecord, NutrientField, Observation, PartialRecord, ResolvedField,
};
use crate::score;

/// Combine partial records for one query into a single merged record.
///
/// Commutative over non-conflicting inputs: merging `[a, b]` and `[b, a]`
/// yields identical field values.
pub fn merge(
    partials: Vec<PartialRecord>,
    config: &RetrievalConfig,
    outcome: ChainOutcome,
) -> MergedRecord {
    let mut by_field: BTreeMap<NutrientField, Vec<Observation>> = BTreeMap::new();
    for partial in &partials {
        for (field, observation) in partial.iter() {
            by_field.entry(*field).or_default().push(observation.clone());
        }
    }

    if by_field.is_empty() {
        return MergedRecord::empty(outcome);
    }

    let mut record = MergedRecord::empty(outcome);
    for (field, observations) in by_field {
        let Some(winner) = observations
            .iter()
            .max_by(|a, b| {
                a.authority
                    .total_cmp(&b.authority)
                    .then(a.retrieved_at.cmp(&b.retrieved_at))
                    // Reversed: on full ties the lexically smallest source wins.
                    .then(b.source.cmp(&a.source))
            })
            .cloned()
        else {
            continue;
        };

        for loser in &observations {
            if loser.source == winner.source && loser.value == winner.value {
                continue;
            }
            if loser.value.agrees_with(&winner.value, config.numeric_tolerance) {
                continue;
            }
            record.conflicts.push(Conflict {
                field,
                kept_source: winner.source.clone(),
                kept_value: winner.value.clone(),
                discarded_source: loser.source.clone(),
                discarded_value: loser.value.clone(),
            });
        }

        record.fields.insert(
            field,
            ResolvedField {
                value: winner.value,
                source: winner.source,
                authority: winner.authority,
                retrieved_at: winner.retrieved_at,
            },
        );
    }

    let mean_authority = record.fields.values().map(|f| f.authority).sum::<f64>()
        / record.fields.len() as f64;
    record.confidence = score::confidence(
        record.coverage(),
        mean_authority,
        record.conflicts.len(),
        NutrientField::EXPECTED.len(),
    );
    record
}
