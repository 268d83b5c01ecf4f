//! GBIF occurrence-search backend.
//!
//! Provides the `OccurrenceSource` trait and its GBIF implementation.
//! Pagination is strictly sequential: each page is awaited before the next
//! is requested, never in parallel.

use patriflora_model::OccurrenceRecord;
use serde::Deserialize;
use std::future::Future;
use thiserror::Error;

/// GBIF taxonKey for the plant kingdom.
pub const PLANT_KINGDOM_KEY: u64 = 6;

/// GBIF taxonKey for vascular plants (Tracheophyta).
pub const TRACHEOPHYTA_TAXON_KEY: u64 = 7707728;

/// Errors from occurrence retrieval.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("occurrence API request failed: {0}")]
    Connection(#[from] reqwest::Error),

    #[error("occurrence API returned HTTP {0}")]
    Status(u16),
}

/// One page of the occurrence-search response.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OccurrencePage {
    pub results: Vec<OccurrenceRecord>,
    pub end_of_records: bool,
}

/// Trait for occurrence sources.
///
/// Keeps the survey pipeline source-agnostic; tests drive it with counting
/// fakes instead of HTTP.
pub trait OccurrenceSource {
    /// Full inventory of plant occurrences inside the polygon.
    ///
    /// All-or-nothing: any failed page discards the partial inventory; a
    /// truncated inventory must never be classified.
    fn inventory(
        &self,
        polygon_wkt: &str,
    ) -> impl Future<Output = Result<Vec<OccurrenceRecord>, BackendError>> + Send;

    /// Every occurrence of one taxon inside the polygon.
    ///
    /// Degradable: a failed page keeps what was already fetched for this
    /// taxon.
    fn species_occurrences(
        &self,
        polygon_wkt: &str,
        taxon_key: i64,
    ) -> impl Future<Output = Result<Vec<OccurrenceRecord>, BackendError>> + Send;

    /// Check if the source is reachable.
    fn health_check(&self) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Source name for logging.
    fn name(&self) -> &'static str;
}

/// GBIF backend configuration.
#[derive(Debug, Clone)]
pub struct GbifConfig {
    /// Base URL for the GBIF API
    pub base_url: String,
    /// Records per page
    pub page_size: usize,
    /// Safety bound on inventory pagination
    pub max_inventory_pages: usize,
    /// Safety bound on per-species pagination
    pub max_species_pages: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GbifConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.gbif.org/v1".to_string(),
            page_size: 1000,
            max_inventory_pages: 12,
            max_species_pages: 10,
            timeout_secs: 30,
        }
    }
}

/// GBIF occurrence-search backend.
pub struct GbifBackend {
    config: GbifConfig,
    client: reqwest::Client,
}

impl GbifBackend {
    pub fn new(config: GbifConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    async fn fetch_page(
        &self,
        polygon_wkt: &str,
        taxon_filter: (&str, String),
        page: usize,
    ) -> Result<OccurrencePage, BackendError> {
        let offset = page * self.config.page_size;
        tracing::debug!(page, offset, "Fetching occurrence page");

        let response = self
            .client
            .get(format!("{}/occurrence/search", self.config.base_url))
            .query(&[
                ("limit", self.config.page_size.to_string()),
                ("offset", offset.to_string()),
                ("geometry", polygon_wkt.to_string()),
                (taxon_filter.0, taxon_filter.1),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BackendError::Status(response.status().as_u16()));
        }

        Ok(response.json().await?)
    }

    /// One-shot exploratory query around a point, vascular plants only.
    pub async fn observations(
        &self,
        polygon_wkt: &str,
        limit: usize,
    ) -> Result<Vec<OccurrenceRecord>, BackendError> {
        let response = self
            .client
            .get(format!("{}/occurrence/search", self.config.base_url))
            .query(&[
                ("limit", limit.to_string()),
                ("geometry", polygon_wkt.to_string()),
                ("taxonKey", TRACHEOPHYTA_TAXON_KEY.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BackendError::Status(response.status().as_u16()));
        }

        let page: OccurrencePage = response.json().await?;
        Ok(page.results)
    }
}

impl OccurrenceSource for GbifBackend {
    async fn inventory(&self, polygon_wkt: &str) -> Result<Vec<OccurrenceRecord>, BackendError> {
        paginate(self.config.max_inventory_pages, |page| {
            self.fetch_page(
                polygon_wkt,
                ("kingdomKey", PLANT_KINGDOM_KEY.to_string()),
                page,
            )
        })
        .await
    }

    async fn species_occurrences(
        &self,
        polygon_wkt: &str,
        taxon_key: i64,
    ) -> Result<Vec<OccurrenceRecord>, BackendError> {
        let mut collected = Vec::new();
        for page in 0..self.config.max_species_pages {
            match self
                .fetch_page(polygon_wkt, ("taxonKey", taxon_key.to_string()), page)
                .await
            {
                Ok(data) => {
                    let end = data.end_of_records;
                    collected.extend(data.results);
                    if end {
                        break;
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        taxon_key,
                        page,
                        error = %err,
                        "Detailed collection truncated"
                    );
                    break;
                }
            }
        }
        Ok(collected)
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        let response = self
            .client
            .get(format!("{}/occurrence/search", self.config.base_url))
            .query(&[("limit", "1")])
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(BackendError::Status(response.status().as_u16()))
        }
    }

    fn name(&self) -> &'static str {
        "gbif"
    }
}

/// Sequential pagination: request page N+1 only after page N arrived, stop
/// at `endOfRecords` or the page ceiling. Any page error aborts the whole
/// collection.
async fn paginate<F, Fut>(
    max_pages: usize,
    mut fetch: F,
) -> Result<Vec<OccurrenceRecord>, BackendError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<OccurrencePage, BackendError>>,
{
    let mut all = Vec::new();
    for page in 0..max_pages {
        let data = fetch(page).await?;
        let end = data.end_of_records;
        all.extend(data.results);
        if end {
            break;
        }
    }
    Ok(all)
}

/// True if the record is vascular flora (or at least plant kingdom).
pub fn is_flora(record: &OccurrenceRecord) -> bool {
    let matches_ci = |field: &Option<String>, needle: &str| {
        field
            .as_deref()
            .is_some_and(|value| value.to_lowercase().contains(needle))
    };
    matches_ci(&record.phylum, "tracheophyta") || matches_ci(&record.kingdom, "plantae")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn page_of(count: usize, end_of_records: bool) -> OccurrencePage {
        OccurrencePage {
            results: vec![OccurrenceRecord::default(); count],
            end_of_records,
        }
    }

    #[tokio::test]
    async fn test_end_of_records_stops_pagination() {
        let calls = Cell::new(0usize);
        let collected = paginate(12, |_page| {
            calls.set(calls.get() + 1);
            async { Ok(page_of(3, true)) }
        })
        .await
        .unwrap();
        assert_eq!(calls.get(), 1);
        assert_eq!(collected.len(), 3);
    }

    #[tokio::test]
    async fn test_page_ceiling_bounds_pagination() {
        let calls = Cell::new(0usize);
        let collected = paginate(12, |_page| {
            calls.set(calls.get() + 1);
            async { Ok(page_of(2, false)) }
        })
        .await
        .unwrap();
        assert_eq!(calls.get(), 12);
        assert_eq!(collected.len(), 24);
    }

    #[tokio::test]
    async fn test_failed_page_discards_partial_inventory() {
        let calls = Cell::new(0usize);
        let result = paginate(12, |page| {
            calls.set(calls.get() + 1);
            async move {
                if page == 1 {
                    Err(BackendError::Status(503))
                } else {
                    Ok(page_of(5, false))
                }
            }
        })
        .await;
        assert!(matches!(result, Err(BackendError::Status(503))));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_page_deserialization() {
        let json = r#"{
            "offset": 0,
            "limit": 1000,
            "endOfRecords": true,
            "count": 1,
            "results": [{"species": "Gentiana lutea", "decimalLatitude": 48.5, "decimalLongitude": 7.7}]
        }"#;
        let page: OccurrencePage = serde_json::from_str(json).unwrap();
        assert!(page.end_of_records);
        assert_eq!(page.results.len(), 1);
        assert_eq!(page.results[0].species.as_deref(), Some("Gentiana lutea"));
    }

    #[test]
    fn test_is_flora() {
        let tracheophyte = OccurrenceRecord {
            phylum: Some("Tracheophyta".to_string()),
            ..Default::default()
        };
        let plant = OccurrenceRecord {
            kingdom: Some("Plantae".to_string()),
            ..Default::default()
        };
        let bird = OccurrenceRecord {
            kingdom: Some("Animalia".to_string()),
            phylum: Some("Chordata".to_string()),
            ..Default::default()
        };
        assert!(is_flora(&tracheophyte));
        assert!(is_flora(&plant));
        assert!(!is_flora(&bird));
    }
}
