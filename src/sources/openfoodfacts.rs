//! OpenFoodFacts source adapters.
//!
//! Two adapters share one HTTP client: [`BarcodeLookupSource`] resolves an
//! exact barcode via `/api/v2/product/{code}.json`, and
//! [`TextSearchSource`] runs a free-text search via `/cgi/search.pl`. Both
//! carry structured-database authority; entries still flagged for review by
//! the database are docked as user-submitted.
//!
//! # Default Configuration
//!
//! - Base URL: `https://world.openfoodfacts.org`
//!
//! # Environment Variables
//!
//! - `OPENFOODFACTS_BASE_URL`: override the API base (e.g. a staging mirror)

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::{FetchError, Result};
use crate::normalize::{normalize, RawResponse, StructuredProduct};
use crate::record::{PartialRecord, QualityFlag, Query, SourceKind};
use crate::sources::Source;

/// Default OpenFoodFacts API base URL.
const DEFAULT_BASE_URL: &str = "https://world.openfoodfacts.org";

/// Results requested per text search; only the best hit is used.
const SEARCH_PAGE_SIZE: u32 = 5;

/// Shared HTTP client for the OpenFoodFacts API.
#[derive(Debug, Clone)]
pub struct OpenFoodFactsClient {
    http: Client,
    base_url: String,
}

impl OpenFoodFactsClient {
    /// Create a client against the public API.
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a client against a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("nutrifetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Config(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create a client from `OPENFOODFACTS_BASE_URL`, falling back to the
    /// public API.
    pub fn from_env() -> Result<Self> {
        match std::env::var("OPENFOODFACTS_BASE_URL") {
            Ok(url) if !url.is_empty() => Self::with_base_url(url),
            _ => Self::new(),
        }
    }

    async fn get_by_barcode(&self, code: &str, timeout: Duration) -> Result<WireProduct> {
        let url = format!("{}/api/v2/product/{}.json", self.base_url, code);
        let response = self.http.get(&url).timeout(timeout).send().await?;

        let status = response.status();
        if !status.is_success() && status.as_u16() != 404 {
            return Err(FetchError::Api(format!("HTTP {} from {}", status, url)));
        }

        let body = response.text().await?;
        let envelope: ProductEnvelope = serde_json::from_str(&body)?;
        match envelope {
            ProductEnvelope {
                status: 1,
                product: Some(product),
            } => Ok(product),
            _ => Err(FetchError::NotFound),
        }
    }

    async fn search(&self, terms: &str, timeout: Duration) -> Result<WireProduct> {
        let url = format!("{}/cgi/search.pl", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("search_terms", terms),
                ("search_simple", "1"),
                ("action", "process"),
                ("json", "1"),
                ("page_size", &SEARCH_PAGE_SIZE.to_string()),
            ])
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Api(format!("HTTP {} from {}", status, url)));
        }

        let body = response.text().await?;
        let envelope: SearchEnvelope = serde_json::from_str(&body)?;
        envelope
            .products
            .into_iter()
            .next()
            .ok_or(FetchError::NotFound)
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Deserialize)]
struct ProductEnvelope {
    #[serde(default)]
    status: i64,
    product: Option<WireProduct>,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    products: Vec<WireProduct>,
}

#[derive(Debug, Default, Deserialize)]
struct WireProduct {
    product_name: Option<String>,
    product_name_en: Option<String>,
    brands: Option<String>,
    serving_size: Option<String>,
    #[serde(default)]
    nutriments: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    states_tags: Vec<String>,
}

impl WireProduct {
    /// Nutrient value per 100 g, tolerating the API's habit of reporting
    /// numbers as strings.
    fn nutrient(&self, key: &str) -> Option<f64> {
        let value = self
            .nutriments
            .get(&format!("{}_100g", key))
            .or_else(|| self.nutriments.get(key))?;
        match value {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Completion state of the database entry.
    ///
    /// `en:checked` entries went through moderator review; `en:to-be-checked`
    /// entries are raw user submissions.
    fn quality(&self) -> QualityFlag {
        if self.states_tags.iter().any(|t| t == "en:checked") {
            QualityFlag::ManufacturerVerified
        } else if self.states_tags.iter().any(|t| t == "en:to-be-checked") {
            QualityFlag::UserSubmitted
        } else {
            QualityFlag::Unverified
        }
    }

    fn into_structured(self) -> StructuredProduct {
        StructuredProduct {
            quality: Some(self.quality()),
            energy_kcal: self.nutrient("energy-kcal"),
            energy_kj: self.nutrient("energy"),
            protein_g: self.nutrient("proteins"),
            carbs_g: self.nutrient("carbohydrates"),
            fat_g: self.nutrient("fat"),
            saturated_fat_g: self.nutrient("saturated-fat"),
            sugar_g: self.nutrient("sugars"),
            fiber_g: self.nutrient("fiber"),
            sodium_g: self.nutrient("sodium"),
            name: self.product_name.or(self.product_name_en),
            brand: self.brands,
            serving_size: self.serving_size,
        }
    }
}

// ============================================================================
// Adapters
// ============================================================================

/// Exact-identifier lookup against the OpenFoodFacts product database.
#[derive(Debug, Clone)]
pub struct BarcodeLookupSource {
    client: OpenFoodFactsClient,
}

impl BarcodeLookupSource {
    pub fn new(client: OpenFoodFactsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Source for BarcodeLookupSource {
    fn name(&self) -> &str {
        "off-barcode"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::StructuredDatabase
    }

    async fn fetch(&self, query: &Query, timeout: Duration) -> Result<PartialRecord> {
        let code = match query {
            Query::Barcode(code) => code,
            // A free-text query carries no identifier this source can use.
            Query::FreeText(_) => return Err(FetchError::NotFound),
        };

        // Identifier and search text stay out of logs, same rule as the
        // tracing decorator.
        debug!(code_len = code.len(), "openfoodfacts barcode lookup");
        let product = self.client.get_by_barcode(code, timeout).await?;
        let retrieved_at = SystemTime::now();
        Ok(normalize(
            RawResponse::Product(product.into_structured()),
            self.kind(),
            self.name(),
            retrieved_at,
        ))
    }
}

/// Free-text search against the OpenFoodFacts product database.
///
/// Also answers barcode queries by searching the code as text; some
/// retailers index products under their GTIN.
#[derive(Debug, Clone)]
pub struct TextSearchSource {
    client: OpenFoodFactsClient,
}

impl TextSearchSource {
    pub fn new(client: OpenFoodFactsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Source for TextSearchSource {
    fn name(&self) -> &str {
        "off-search"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::StructuredDatabase
    }

    async fn fetch(&self, query: &Query, timeout: Duration) -> Result<PartialRecord> {
        let terms = query.as_str();
        debug!(terms_len = terms.len(), "openfoodfacts text search");
        let product = self.client.search(terms, timeout).await?;
        let retrieved_at = SystemTime::now();
        Ok(normalize(
            RawResponse::Product(product.into_structured()),
            self.kind(),
            self.name(),
            retrieved_at,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::NutrientField;

    fn parse_product(json: &str) -> WireProduct {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_wire_product_nutrient_lookup() {
        let product = parse_product(
            r#"{
                "product_name": "Nutella",
                "nutriments": {
                    "energy-kcal_100g": 539,
                    "proteins_100g": "6.3",
                    "sodium_100g": 0.0428
                }
            }"#,
        );
        assert_eq!(product.nutrient("energy-kcal"), Some(539.0));
        assert_eq!(product.nutrient("proteins"), Some(6.3));
        assert_eq!(product.nutrient("sodium"), Some(0.0428));
        assert_eq!(product.nutrient("fiber"), None);
    }

    #[test]
    fn test_wire_product_nutrient_plain_key_fallback() {
        let product = parse_product(r#"{"nutriments": {"sugars": 12.0}}"#);
        assert_eq!(product.nutrient("sugars"), Some(12.0));
    }

    #[test]
    fn test_quality_from_states_tags() {
        let checked = parse_product(r#"{"states_tags": ["en:complete", "en:checked"]}"#);
        assert_eq!(checked.quality(), QualityFlag::ManufacturerVerified);

        let pending = parse_product(r#"{"states_tags": ["en:to-be-checked"]}"#);
        assert_eq!(pending.quality(), QualityFlag::UserSubmitted);

        let unknown = parse_product(r#"{}"#);
        assert_eq!(unknown.quality(), QualityFlag::Unverified);
    }

    #[test]
    fn test_into_structured_converts_units_downstream() {
        let product = parse_product(
            r#"{
                "product_name": "Salted Peanuts",
                "brands": "Acme",
                "nutriments": {
                    "energy_100g": 2538,
                    "sodium_100g": 0.4
                },
                "states_tags": ["en:checked"]
            }"#,
        );
        let record = normalize(
            RawResponse::Product(product.into_structured()),
            SourceKind::StructuredDatabase,
            "off-barcode",
            SystemTime::UNIX_EPOCH,
        );

        // kJ converted to kcal, sodium grams to milligrams.
        let kcal = record
            .get(NutrientField::CaloriesKcal)
            .unwrap()
            .value
            .as_number()
            .unwrap();
        assert!((kcal - 2538.0 * crate::normalize::KCAL_PER_KJ).abs() < 1e-6);
        assert_eq!(
            record.get(NutrientField::SodiumMg).unwrap().value.as_number(),
            Some(400.0)
        );
        assert_eq!(
            record.get(NutrientField::Brand).unwrap().value.as_text(),
            Some("Acme")
        );
    }

    #[test]
    fn test_not_found_envelope_shapes() {
        let missing: ProductEnvelope =
            serde_json::from_str(r#"{"status": 0, "status_verbose": "product not found"}"#)
                .unwrap();
        assert_eq!(missing.status, 0);
        assert!(missing.product.is_none());

        let empty_search: SearchEnvelope = serde_json::from_str(r#"{"products": []}"#).unwrap();
        assert!(empty_search.products.is_empty());
    }

    #[tokio::test]
    async fn test_barcode_source_rejects_free_text() {
        let client = OpenFoodFactsClient::new().unwrap();
        let source = BarcodeLookupSource::new(client);
        let result = source
            .fetch(&Query::free_text("granola"), Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(FetchError::NotFound)));
    }
}
