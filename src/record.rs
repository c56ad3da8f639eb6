//! Core data model: queries, partial records, and merged records.
//!
//! A retrieval starts from a [`Query`], produces one [`PartialRecord`] per
//! consulted source, and ends with a single [`MergedRecord`]. Partial
//! records are sparse by design: a field a source does not report is absent
//! from the map, never present as zero or null, so downstream consumers can
//! not confuse "no data" with "value is zero".
//!
//! Every observation carries the authority of the source that produced it
//! and the time it was retrieved; both drive conflict resolution in the
//! merge step.

use std::collections::BTreeMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

// ============================================================================
// Query
// ============================================================================

/// The product identifier or description driving a retrieval.
///
/// Immutable once issued; validation is the only caller-visible failure
/// point of the whole pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Query {
    /// Exact identifier, e.g. an EAN-13 barcode.
    Barcode(String),

    /// Free-text product description, e.g. from OCR.
    FreeText(String),
}

impl Query {
    /// Create a barcode query.
    pub fn barcode(code: impl Into<String>) -> Self {
        Self::Barcode(code.into())
    }

    /// Create a free-text query.
    pub fn free_text(text: impl Into<String>) -> Self {
        Self::FreeText(text.into())
    }

    /// The raw query text.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Barcode(s) | Self::FreeText(s) => s,
        }
    }

    /// Check the input contract: non-blank text, and barcodes must be
    /// numeric (GTIN family codes are digit strings).
    pub fn validate(&self) -> crate::error::Result<()> {
        match self {
            Self::Barcode(code) => {
                let code = code.trim();
                if code.is_empty() {
                    return Err(crate::error::FetchError::InvalidQuery(
                        "empty barcode".to_string(),
                    ));
                }
                if !code.chars().all(|c| c.is_ascii_digit()) {
                    return Err(crate::error::FetchError::InvalidQuery(format!(
                        "barcode must be numeric, got '{}'",
                        code
                    )));
                }
                Ok(())
            }
            Self::FreeText(text) => {
                if text.trim().is_empty() {
                    return Err(crate::error::FetchError::InvalidQuery(
                        "empty product description".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

// ============================================================================
// Fields and values
// ============================================================================

/// Canonical nutrition fields.
///
/// Units are fixed by the normalizer: energy in kilocalories, macronutrient
/// masses in grams, sodium in milligrams.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum NutrientField {
    ProductName,
    Brand,
    ServingSize,
    CaloriesKcal,
    ProteinG,
    CarbsG,
    FatG,
    SaturatedFatG,
    SugarG,
    SodiumMg,
    FiberG,
}

impl NutrientField {
    /// Every field a complete record is expected to carry. Coverage
    /// fractions are computed against this set.
    pub const EXPECTED: [NutrientField; 11] = [
        Self::ProductName,
        Self::Brand,
        Self::ServingSize,
        Self::CaloriesKcal,
        Self::ProteinG,
        Self::CarbsG,
        Self::FatG,
        Self::SaturatedFatG,
        Self::SugarG,
        Self::SodiumMg,
        Self::FiberG,
    ];

    /// Stable snake_case name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProductName => "product_name",
            Self::Brand => "brand",
            Self::ServingSize => "serving_size",
            Self::CaloriesKcal => "calories_kcal",
            Self::ProteinG => "protein_g",
            Self::CarbsG => "carbs_g",
            Self::FatG => "fat_g",
            Self::SaturatedFatG => "saturated_fat_g",
            Self::SugarG => "sugar_g",
            Self::SodiumMg => "sodium_mg",
            Self::FiberG => "fiber_g",
        }
    }

    /// Whether values of this field are numeric quantities.
    pub fn is_numeric(&self) -> bool {
        !matches!(self, Self::ProductName | Self::Brand | Self::ServingSize)
    }
}

/// A single field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Numeric value, if this is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    /// Text value, if this is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Number(_) => None,
        }
    }

    /// Whether two values agree within tolerance.
    ///
    /// Numbers agree when their relative difference (against the larger
    /// magnitude) is within `rel_tolerance`; text agrees case-insensitively
    /// after trimming. Mismatched variants never agree.
    pub fn agrees_with(&self, other: &FieldValue, rel_tolerance: f64) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => {
                let scale = a.abs().max(b.abs());
                if scale == 0.0 {
                    return true;
                }
                (a - b).abs() / scale <= rel_tolerance
            }
            (Self::Text(a), Self::Text(b)) => {
                a.trim().eq_ignore_ascii_case(b.trim())
            }
            _ => false,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

// ============================================================================
// Source authority
// ============================================================================

/// Kind of data source, ordered by credibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Structured product database (barcode or text lookup).
    StructuredDatabase,

    /// Curated guideline source (e.g. official dietary references).
    CuratedGuideline,

    /// Unstructured web search.
    WebSearch,
}

impl SourceKind {
    /// Static authority ranking: structured database > curated guideline >
    /// web search. Primary tie-break for field conflicts.
    pub fn base_authority(&self) -> f64 {
        match self {
            Self::StructuredDatabase => 0.9,
            Self::CuratedGuideline => 0.7,
            Self::WebSearch => 0.5,
        }
    }
}

/// Source-level quality flag, where the source reports one.
///
/// Structured databases distinguish manufacturer-verified entries from
/// user-submitted ones; the flag docks the base authority accordingly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    ManufacturerVerified,
    UserSubmitted,
    Unverified,
}

impl QualityFlag {
    /// Adjust a base authority for this flag, clamped to [0, 1].
    pub fn adjust(&self, base: f64) -> f64 {
        let adjusted = match self {
            Self::ManufacturerVerified => base,
            Self::UserSubmitted => base - 0.2,
            Self::Unverified => base - 0.1,
        };
        adjusted.clamp(0.0, 1.0)
    }
}

// ============================================================================
// Partial record
// ============================================================================

/// One field observation from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub value: FieldValue,

    /// Name of the source that produced this value.
    pub source: String,

    /// Authority in [0, 1], from the static kind table adjusted by the
    /// source's quality flag.
    pub authority: f64,

    pub retrieved_at: SystemTime,
}

/// Sparse, source-attributed nutrition data produced by one source attempt.
///
/// Absent fields mean "no data". Partial records are created and discarded
/// per retrieval; only the merged record outlives the orchestration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialRecord {
    fields: BTreeMap<NutrientField, Observation>,
}

impl PartialRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observation for a field, replacing any previous one.
    pub fn insert(
        &mut self,
        field: NutrientField,
        value: impl Into<FieldValue>,
        source: impl Into<String>,
        authority: f64,
        retrieved_at: SystemTime,
    ) {
        self.fields.insert(
            field,
            Observation {
                value: value.into(),
                source: source.into(),
                authority,
                retrieved_at,
            },
        );
    }

    /// Builder-style insert, for construction in tests and normalizers.
    pub fn with_field(
        mut self,
        field: NutrientField,
        value: impl Into<FieldValue>,
        source: impl Into<String>,
        authority: f64,
        retrieved_at: SystemTime,
    ) -> Self {
        self.insert(field, value, source, authority, retrieved_at);
        self
    }

    /// Observation for a field, if present.
    pub fn get(&self, field: NutrientField) -> Option<&Observation> {
        self.fields.get(&field)
    }

    /// Whether a field is present.
    pub fn contains(&self, field: NutrientField) -> bool {
        self.fields.contains_key(&field)
    }

    /// Iterate over all observations.
    pub fn iter(&self) -> impl Iterator<Item = (&NutrientField, &Observation)> {
        self.fields.iter()
    }

    /// Number of populated fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when no fields are populated.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ============================================================================
// Merged record
// ============================================================================

/// Terminal state of the fallback chain that produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainOutcome {
    /// The sufficiency predicate was met before the chain ran out.
    Sufficient,

    /// Every configured source was tried; the best available partial data
    /// is returned with a correspondingly low confidence.
    Exhausted,
}

/// The value that won a field after conflict resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedField {
    pub value: FieldValue,

    /// Source the winning value came from, for citation display.
    pub source: String,

    pub authority: f64,
    pub retrieved_at: SystemTime,
}

/// A discarded value kept for transparency.
///
/// Downstream consumers (e.g. a citation panel) may surface these; the
/// confidence scorer counts them as a penalty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub field: NutrientField,
    pub kept_source: String,
    pub kept_value: FieldValue,
    pub discarded_source: String,
    pub discarded_value: FieldValue,
}

/// The single reconciled output of a retrieval.
///
/// Always produced, even when every source failed: "no nutrition data
/// found" is a valid, displayable outcome, rendered as an empty record
/// with zero confidence rather than an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
    pub fields: BTreeMap<NutrientField, ResolvedField>,

    /// Unresolved disagreements between sources, losers only.
    pub conflicts: Vec<Conflict>,

    /// Overall confidence in [0, 1]. Non-increasing in conflict count,
    /// non-decreasing in field coverage.
    pub confidence: f64,

    /// How the fallback chain terminated.
    pub outcome: ChainOutcome,
}

impl MergedRecord {
    /// The zero-confidence sentinel returned when no source yielded data.
    pub fn empty(outcome: ChainOutcome) -> Self {
        Self {
            fields: BTreeMap::new(),
            conflicts: Vec::new(),
            confidence: 0.0,
            outcome,
        }
    }

    /// Final value for a field, if any source supplied one.
    pub fn get(&self, field: NutrientField) -> Option<&ResolvedField> {
        self.fields.get(&field)
    }

    /// Fraction of expected fields populated.
    pub fn coverage(&self) -> f64 {
        self.fields.len() as f64 / NutrientField::EXPECTED.len() as f64
    }

    /// Distinct sources that contributed at least one winning field.
    pub fn contributing_sources(&self) -> Vec<&str> {
        let mut sources: Vec<&str> = self.fields.values().map(|f| f.source.as_str()).collect();
        sources.sort_unstable();
        sources.dedup();
        sources
    }

    /// True when no source yielded any data.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
