//! Analysis orchestration.
//!
//! Runs one survey end to end: build the search polygon, inventory the
//! local flora, resolve the administrative context, narrow the reference
//! table to the applicable rules, classify, then re-query each confirmed
//! species for detailed mapping and aggregate by location.
//!
//! All external calls are awaited sequentially; any failure before the
//! classification step aborts the run with a single typed error, and no
//! partial result is returned alongside one. Empty inventories and empty
//! patrimonial sets are informational outcomes, not errors.

use std::collections::{HashMap, HashSet};

use patriflora_aggregate::{
    bucket_by_location, color_for, export_features, DetailedOccurrence, FeatureCollection,
    LocationBucket,
};
use patriflora_backend_gbif::{BackendError, OccurrenceSource};
use patriflora_classify::{classify, ClassifyError, InferenceClient};
use patriflora_geo::{circle_wkt, AdminNames, AdminResolver, LookupError};
use patriflora_model::{AdministrativeContext, OccurrenceRecord, PatrimonialMap};
use patriflora_rules::{relevant_rules, RuleIndex, RuleTableError};
use serde::Serialize;
use thiserror::Error;

/// Default search radius around the query point, in kilometers.
pub const SEARCH_RADIUS_KM: f64 = 2.0;

/// Default radius for exploratory observation queries, in kilometers.
pub const OBSERVATION_RADIUS_KM: f64 = 0.2;

/// Any failure that aborts a survey run.
#[derive(Debug, Error)]
pub enum SurveyError {
    #[error(transparent)]
    RuleTable(#[from] RuleTableError),

    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Classify(#[from] ClassifyError),
}

/// Process-lifetime survey configuration: the raw reference table and the
/// administrative name tables. Built once, shared by every run.
pub struct SurveyContext {
    pub rule_table: String,
    pub names: AdminNames,
}

impl SurveyContext {
    pub fn new(rule_table: String) -> Self {
        let names = AdminNames::new();
        for issue in names.validate() {
            tracing::warn!(issue = %issue, "Administrative name table collision");
        }
        Self { rule_table, names }
    }
}

/// Result of one survey run.
#[derive(Debug)]
pub enum SurveyOutcome {
    /// The inventory returned no plant occurrences at all.
    EmptyInventory,
    /// Plants were observed but none classified patrimonial.
    NoPatrimonialSpecies { observed_species: usize },
    Report(Box<SurveyReport>),
}

/// Full result of a survey that found patrimonial species.
#[derive(Debug, Serialize)]
pub struct SurveyReport {
    pub context: AdministrativeContext,
    pub statuses: PatrimonialMap,
    pub observed_species: usize,
    pub buckets: Vec<LocationBucket>,
    pub features: FeatureCollection,
}

/// Run one survey around a point.
pub async fn run_survey<S: OccurrenceSource + Sync>(
    source: &S,
    resolver: &AdminResolver,
    inference: &InferenceClient,
    survey: &SurveyContext,
    latitude: f64,
    longitude: f64,
    radius_km: f64,
) -> Result<SurveyOutcome, SurveyError> {
    let polygon = circle_wkt(latitude, longitude, radius_km);

    tracing::info!(latitude, longitude, radius_km, source = source.name(), "Inventorying local flora");
    let inventory = source.inventory(&polygon).await?;
    if inventory.is_empty() {
        return Ok(SurveyOutcome::EmptyInventory);
    }

    let observed = unique_species(&inventory);
    tracing::info!(
        occurrences = inventory.len(),
        species = observed.len(),
        "Inventory collected"
    );

    let context = resolver.resolve(latitude, longitude).await?;
    tracing::debug!(
        department = %context.department_code,
        region = %context.region_code,
        "Administrative context resolved"
    );

    let observed_set: HashSet<String> = observed.iter().cloned().collect();
    let index = RuleIndex::parse_restricted(&survey.rule_table, &observed_set)?;
    let relevant = relevant_rules(&observed, &index, &context, &survey.names);
    tracing::debug!(rules = relevant.len(), "Applicable rules filtered");

    let statuses = classify(&observed, &relevant, &context, inference).await?;
    if statuses.is_empty() {
        return Ok(SurveyOutcome::NoPatrimonialSpecies {
            observed_species: observed.len(),
        });
    }

    let detailed = collect_detailed(source, &polygon, &statuses, &inventory).await;
    let buckets = bucket_by_location(&detailed);
    let features = export_features(&buckets);

    Ok(SurveyOutcome::Report(Box::new(SurveyReport {
        context,
        observed_species: observed.len(),
        statuses,
        buckets,
        features,
    })))
}

/// Distinct non-empty species names from the inventory, sorted.
pub fn unique_species(inventory: &[OccurrenceRecord]) -> Vec<String> {
    let mut names: Vec<String> = inventory
        .iter()
        .filter_map(|record| record.species.as_deref())
        .map(|species| species.trim().to_string())
        .filter(|species| !species.is_empty())
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    names.sort();
    names
}

/// First-seen species-level taxon key per species name.
pub fn taxon_keys(inventory: &[OccurrenceRecord]) -> HashMap<String, i64> {
    let mut keys = HashMap::new();
    for record in inventory {
        if let (Some(species), Some(key)) =
            (record.species.as_deref(), record.effective_taxon_key())
        {
            keys.entry(species.to_string()).or_insert(key);
        }
    }
    keys
}

/// Per-species detailed collection, sequential, warn-and-continue.
///
/// A failed species only degrades map detail; it never fails the run.
async fn collect_detailed<S: OccurrenceSource + Sync>(
    source: &S,
    polygon: &str,
    statuses: &PatrimonialMap,
    inventory: &[OccurrenceRecord],
) -> Vec<DetailedOccurrence> {
    let keys = taxon_keys(inventory);
    let mut detailed = Vec::new();

    for (ordinal, species) in statuses.keys().enumerate() {
        let color = color_for(ordinal);
        let Some(taxon_key) = keys.get(species) else {
            tracing::warn!(species = %species, "No taxon key in inventory, skipping detail pass");
            continue;
        };
        match source.species_occurrences(polygon, *taxon_key).await {
            Ok(records) => {
                tracing::debug!(species = %species, records = records.len(), "Detailed pass");
                detailed.extend(records.into_iter().map(|record| DetailedOccurrence {
                    record,
                    species: species.clone(),
                    color: color.to_string(),
                }));
            }
            Err(err) => {
                tracing::warn!(species = %species, error = %err, "Detailed pass failed, keeping summary only");
            }
        }
    }

    detailed
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(species: Option<&str>, key: Option<i64>) -> OccurrenceRecord {
        OccurrenceRecord {
            species: species.map(str::to_string),
            species_key: key,
            ..Default::default()
        }
    }

    #[test]
    fn test_unique_species_sorted_and_trimmed() {
        let inventory = vec![
            record(Some("Gentiana lutea"), Some(1)),
            record(Some("  Adonis aestivalis "), Some(2)),
            record(Some("Gentiana lutea"), Some(1)),
            record(Some(""), None),
            record(None, None),
        ];
        assert_eq!(
            unique_species(&inventory),
            vec!["Adonis aestivalis".to_string(), "Gentiana lutea".to_string()]
        );
    }

    #[test]
    fn test_taxon_keys_first_seen_wins() {
        let inventory = vec![
            record(Some("Gentiana lutea"), Some(10)),
            record(Some("Gentiana lutea"), Some(99)),
            record(Some("Adonis aestivalis"), None),
        ];
        let keys = taxon_keys(&inventory);
        assert_eq!(keys.get("Gentiana lutea"), Some(&10));
        assert!(!keys.contains_key("Adonis aestivalis"));
    }

    #[test]
    fn test_taxon_key_falls_back_to_record_key() {
        let inventory = vec![OccurrenceRecord {
            species: Some("Gentiana lutea".to_string()),
            species_key: None,
            taxon_key: Some(42),
            ..Default::default()
        }];
        let keys = taxon_keys(&inventory);
        assert_eq!(keys.get("Gentiana lutea"), Some(&42));
    }
}
