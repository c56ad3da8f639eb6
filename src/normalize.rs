//! Result normalizer: typed raw source responses into [`PartialRecord`]s.
//!
//! Each source deserializes its wire format into one variant of
//! [`RawResponse`] and hands it here. The mapping from variant to canonical
//! fields is explicit, so a schema change in a source shows up as a compile
//! error instead of silently drifting through an untyped map.
//!
//! # Units
//!
//! Conversion is a pure function with fixed ratios and no rounding;
//! formatting belongs to display code.
//!
//! | Canonical unit | Ratio |
//! |----------------|-------|
//! | mass in grams | 1 oz = 28.35 g |
//! | energy in kilocalories | 1 kJ = 0.239006 kcal |
//! | sodium in milligrams | 1 g = 1000 mg |
//!
//! Missing fields are absent from the output map, never zero.

use std::time::SystemTime;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::record::{NutrientField, PartialRecord, QualityFlag, SourceKind};

/// Grams per avoirdupois ounce.
pub const GRAMS_PER_OUNCE: f64 = 28.35;

/// Kilocalories per kilojoule.
pub const KCAL_PER_KJ: f64 = 0.239006;

/// Milligrams per gram.
pub const MG_PER_GRAM: f64 = 1000.0;

/// Convert ounces to grams.
pub fn ounces_to_grams(oz: f64) -> f64 {
    oz * GRAMS_PER_OUNCE
}

/// Convert kilojoules to kilocalories.
pub fn kilojoules_to_kcal(kj: f64) -> f64 {
    kj * KCAL_PER_KJ
}

/// Convert grams to milligrams.
pub fn grams_to_milligrams(g: f64) -> f64 {
    g * MG_PER_GRAM
}

// ============================================================================
// Raw response shapes
// ============================================================================

/// Raw response from a source, one variant per source shape.
#[derive(Debug, Clone)]
pub enum RawResponse {
    /// A structured product entry from a database lookup.
    Product(StructuredProduct),

    /// Unstructured search hits from a web search.
    Snippets(Vec<Snippet>),
}

/// Structured product entry in the source's native units.
///
/// Field names follow what structured databases actually report: energy in
/// kcal when available with a kJ fallback, sodium in grams per 100 g.
#[derive(Debug, Clone, Default)]
pub struct StructuredProduct {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub serving_size: Option<String>,
    pub energy_kcal: Option<f64>,
    pub energy_kj: Option<f64>,
    pub protein_g: Option<f64>,
    pub carbs_g: Option<f64>,
    pub fat_g: Option<f64>,
    pub saturated_fat_g: Option<f64>,
    pub sugar_g: Option<f64>,
    pub fiber_g: Option<f64>,
    pub sodium_g: Option<f64>,
    pub quality: Option<QualityFlag>,
}

/// One web search hit.
#[derive(Debug, Clone)]
pub struct Snippet {
    pub title: String,
    pub url: String,
    pub content: String,
}

// ============================================================================
// Normalization
// ============================================================================

/// Convert a raw response into a partial record.
///
/// Every output field is tagged with an authority derived from the static
/// kind table, adjusted by the source's quality flag where one is reported.
pub fn normalize(
    raw: RawResponse,
    kind: SourceKind,
    source: &str,
    retrieved_at: SystemTime,
) -> PartialRecord {
    match raw {
        RawResponse::Product(product) => normalize_product(product, kind, source, retrieved_at),
        RawResponse::Snippets(snippets) => normalize_snippets(&snippets, kind, source, retrieved_at),
    }
}

fn normalize_product(
    product: StructuredProduct,
    kind: SourceKind,
    source: &str,
    retrieved_at: SystemTime,
) -> PartialRecord {
    let authority = product
        .quality
        .map(|q| q.adjust(kind.base_authority()))
        .unwrap_or_else(|| kind.base_authority());

    let mut record = PartialRecord::new();
    let put_text = |record: &mut PartialRecord, field, value: Option<String>| {
        if let Some(v) = value {
            let v = v.trim();
            if !v.is_empty() {
                record.insert(field, v, source, authority, retrieved_at);
            }
        }
    };
    put_text(&mut record, NutrientField::ProductName, product.name);
    put_text(&mut record, NutrientField::Brand, product.brand);
    put_text(&mut record, NutrientField::ServingSize, product.serving_size);

    // Energy: prefer native kcal, fall back to converting the kJ figure.
    let kcal = product
        .energy_kcal
        .or(product.energy_kj.map(kilojoules_to_kcal));
    let put_number = |record: &mut PartialRecord, field, value: Option<f64>| {
        if let Some(v) = value {
            if v.is_finite() && v >= 0.0 {
                record.insert(field, v, source, authority, retrieved_at);
            }
        }
    };
    put_number(&mut record, NutrientField::CaloriesKcal, kcal);
    put_number(&mut record, NutrientField::ProteinG, product.protein_g);
    put_number(&mut record, NutrientField::CarbsG, product.carbs_g);
    put_number(&mut record, NutrientField::FatG, product.fat_g);
    put_number(
        &mut record,
        NutrientField::SaturatedFatG,
        product.saturated_fat_g,
    );
    put_number(&mut record, NutrientField::SugarG, product.sugar_g);
    put_number(&mut record, NutrientField::FiberG, product.fiber_g);
    put_number(
        &mut record,
        NutrientField::SodiumMg,
        product.sodium_g.map(grams_to_milligrams),
    );

    record
}

static CALORIES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:kcal|calories)").unwrap());
static PROTEIN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)protein[:\s]+(\d+(?:\.\d+)?)\s*g\b").unwrap());
static CARBS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)carb(?:ohydrate)?s?[:\s]+(\d+(?:\.\d+)?)\s*g\b").unwrap());
static FAT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bfat[:\s]+(\d+(?:\.\d+)?)\s*g\b").unwrap());
static SATURATED_FAT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)saturated\s+fat[:\s]+(\d+(?:\.\d+)?)\s*g\b").unwrap());
static SUGAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)sugars?[:\s]+(\d+(?:\.\d+)?)\s*g\b").unwrap());
static FIBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)fib(?:er|re)[:\s]+(\d+(?:\.\d+)?)\s*g\b").unwrap());
static SODIUM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)sodium[:\s]+(\d+(?:\.\d+)?)\s*(mg|g)\b").unwrap());

fn normalize_snippets(
    snippets: &[Snippet],
    kind: SourceKind,
    source: &str,
    retrieved_at: SystemTime,
) -> PartialRecord {
    let authority = kind.base_authority();
    let mut record = PartialRecord::new();

    if let Some(first) = snippets.first() {
        let name = clean_title(&first.title);
        if !name.is_empty() {
            record.insert(
                NutrientField::ProductName,
                name,
                source,
                authority,
                retrieved_at,
            );
        }
    }

    // First match across hits wins; hits arrive ranked by relevance.
    let text: String = snippets
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let numeric: [(NutrientField, &Regex); 5] = [
        (NutrientField::CaloriesKcal, &CALORIES_RE),
        (NutrientField::ProteinG, &PROTEIN_RE),
        (NutrientField::CarbsG, &CARBS_RE),
        (NutrientField::SugarG, &SUGAR_RE),
        (NutrientField::FiberG, &FIBER_RE),
    ];
    for (field, re) in numeric {
        if let Some(value) = extract_number(re, &text) {
            record.insert(field, value, source, authority, retrieved_at);
        }
    }

    if let Some(value) = extract_number(&SATURATED_FAT_RE, &text) {
        record.insert(
            NutrientField::SaturatedFatG,
            value,
            source,
            authority,
            retrieved_at,
        );
    }
    // Total fat is matched with the saturated-fat phrases blanked out so
    // the bare "fat" pattern cannot land inside "saturated fat".
    let without_saturated = SATURATED_FAT_RE.replace_all(&text, " ");
    if let Some(value) = extract_number(&FAT_RE, &without_saturated) {
        record.insert(NutrientField::FatG, value, source, authority, retrieved_at);
    }

    if let Some(caps) = SODIUM_RE.captures(&text) {
        if let Ok(value) = caps[1].parse::<f64>() {
            let mg = match &caps[2].to_ascii_lowercase()[..] {
                "g" => grams_to_milligrams(value),
                _ => value,
            };
            record.insert(NutrientField::SodiumMg, mg, source, authority, retrieved_at);
        }
    }

    record
}

fn extract_number(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

/// Strip the site suffix search engines append to page titles.
fn clean_title(title: &str) -> String {
    let cut = title
        .split(" - ")
        .next()
        .unwrap_or(title)
        .split(" | ")
        .next()
        .unwrap_or(title);
    cut.trim().to_string()
}
