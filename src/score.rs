//! Confidence scorer.
//!
//! Pure, deterministic functions: the same inputs always produce the same
//! score, which is what makes the pipeline testable end to end.
//!
//! `confidence = coverage × mean_authority × (1 − conflict_penalty)` with
//! `conflict_penalty = min(1, conflicts / expected_fields)`. The score is
//! non-decreasing in coverage and non-increasing in conflict count by
//! construction.

/// Fraction of expected fields populated, clamped to [0, 1].
pub fn coverage_fraction(populated: usize, expected: usize) -> f64 {
    if expected == 0 {
        return 0.0;
    }
    (populated as f64 / expected as f64).min(1.0)
}

/// Penalty for unresolved conflicts, `min(1, conflicts / expected)`.
pub fn conflict_penalty(conflicts: usize, expected: usize) -> f64 {
    if expected == 0 {
        return 1.0;
    }
    (conflicts as f64 / expected as f64).min(1.0)
}

/// Overall confidence in [0, 1].
pub fn confidence(
    coverage: f64,
    mean_authority: f64,
    conflicts: usize,
    expected_fields: usize,
) -> f64 {
    let raw = coverage.clamp(0.0, 1.0)
        * mean_authority.clamp(0.0, 1.0)
        * (1.0 - conflict_penalty(conflicts, expected_fields));
    raw.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coverage_fraction() {
        assert_eq!(coverage_fraction(0, 11), 0.0);
        assert!((coverage_fraction(2, 10) - 0.2).abs() < 1e-9);
        assert_eq!(coverage_fraction(11, 11), 1.0);
        // Clamped: more populated than expected never exceeds 1.
        assert_eq!(coverage_fraction(20, 11), 1.0);
        assert_eq!(coverage_fraction(5, 0), 0.0);
    }

    #[test]
    fn test_conflict_penalty_caps_at_one() {
        assert_eq!(conflict_penalty(0, 11), 0.0);
        assert!((conflict_penalty(5, 10) - 0.5).abs() < 1e-9);
        assert_eq!(conflict_penalty(50, 11), 1.0);
    }

    #[test]
    fn test_confidence_is_deterministic() {
        let a = confidence(0.6, 0.9, 2, 11);
        let b = confidence(0.6, 0.9, 2, 11);
        assert_eq!(a, b);
    }

    #[test]
    fn test_confidence_bounds() {
        assert_eq!(confidence(0.0, 0.9, 0, 11), 0.0);
        assert_eq!(confidence(1.0, 1.0, 0, 11), 1.0);
        assert_eq!(confidence(1.0, 1.0, 100, 11), 0.0);
        // Out-of-range inputs are clamped, not propagated.
        assert!(confidence(2.0, 2.0, 0, 11) <= 1.0);
    }

    #[test]
    fn test_confidence_non_increasing_in_conflicts() {
        let mut last = f64::INFINITY;
        for conflicts in 0..=15 {
            let score = confidence(0.8, 0.9, conflicts, 11);
            assert!(score <= last, "conflicts={} raised the score", conflicts);
            last = score;
        }
    }

    #[test]
    fn test_confidence_non_decreasing_in_coverage() {
        let mut last = -1.0;
        for populated in 0..=11 {
            let coverage = coverage_fraction(populated, 11);
            let score = confidence(coverage, 0.9, 2, 11);
            assert!(score >= last, "coverage={} lowered the score", coverage);
            last = score;
        }
    }

    #[test]
    fn test_partial_coverage_scenario() {
        // Two of ten expected fields populated at full authority, clean.
        let score = confidence(coverage_fraction(2, 10), 0.9, 0, 10);
        assert!((score - 0.2 * 0.9).abs() < 1e-9);
    }
}
