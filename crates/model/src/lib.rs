//! Core domain model for patriflora botanical surveys.
//!
//! This crate defines the fundamental types used throughout the pipeline:
//! - `RuleRow`: one line of the regulatory reference table
//! - `RelevantRule`: a rule confirmed applicable at the query point
//! - `AdministrativeContext`: department/region resolved for the point
//! - `OccurrenceRecord`: an occurrence as returned by the GBIF API
//! - `SpeciesStatus` / `PatrimonialMap`: the final classification output

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One row of the regulatory reference table (BDCstatut).
///
/// Fields carry the table's values as published, trimmed but not normalized:
/// administrative scopes use historical names, taxon names keep their author
/// citations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRow {
    /// Region/department/country name as published (`LB_ADM_TR`)
    pub administrative_scope: String,

    /// Scientific name as published (`LB_NOM`)
    pub taxon_name: String,

    /// Short status code, possibly empty (`CODE_STATUT`, e.g. "VU")
    pub status_code: String,

    /// Classification label (`LB_TYPE_STATUT`, e.g. "Liste rouge régionale")
    pub status_type: String,

    /// Full regulatory citation (`LABEL_STATUT`)
    pub status_label: String,
}

/// Department and region codes resolved for one query point.
///
/// Derived once per analysis from a single administrative lookup and
/// immutable afterward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdministrativeContext {
    /// 2-character department code (e.g. "2A" for Corse-du-Sud)
    pub department_code: String,

    /// Numeric region code as a string (e.g. "44" for Grand Est)
    pub region_code: String,
}

/// A filtered, deduplicated rule that applies at the query point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelevantRule {
    /// Taxon name the rule protects
    pub species: String,

    /// Rendering-ready status string
    pub descriptive_status: String,
}

/// How a species ended up in the patrimonial map.
///
/// Rule-derived entries are deterministic facts; inference-derived entries
/// are model output and must stay distinguishable downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Matched at least one reference-table rule directly
    Rule,
    /// Returned by the inference fallback (synonym/variant adjudication)
    Inference,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rule => "rule",
            Self::Inference => "inference",
        }
    }
}

/// Classification result for one observed species.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesStatus {
    /// Human-readable status strings, always a list (singletons included)
    pub statuses: Vec<String>,

    /// Rule-derived or inference-derived
    pub provenance: Provenance,
}

/// Final classifier output: observed species name to its statuses.
///
/// A species appears here only if it matched a rule or the inference
/// fallback explicitly returned it.
pub type PatrimonialMap = BTreeMap<String, SpeciesStatus>;

/// One occurrence from the GBIF occurrence-search API.
///
/// All fields are optional on the wire; records without coordinates or a
/// species name are skipped by the consumers that need them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OccurrenceRecord {
    /// Interpreted species name
    pub species: Option<String>,

    /// Stable species-level taxon identifier
    pub species_key: Option<i64>,

    /// Taxon identifier of the record itself (may be infraspecific)
    pub taxon_key: Option<i64>,

    pub decimal_latitude: Option<f64>,
    pub decimal_longitude: Option<f64>,

    /// Taxonomic rank fields used for client-side flora filtering
    pub kingdom: Option<String>,
    pub phylum: Option<String>,
}

impl OccurrenceRecord {
    /// Coordinates, if the record carries both.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.decimal_latitude, self.decimal_longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }

    /// Species-level key, falling back to the record's own taxon key.
    pub fn effective_taxon_key(&self) -> Option<i64> {
        self.species_key.or(self.taxon_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occurrence_from_gbif_json() {
        let json = r#"{
            "species": "Gentiana lutea",
            "speciesKey": 5414226,
            "taxonKey": 5414226,
            "decimalLatitude": 48.58392,
            "decimalLongitude": 7.74553,
            "kingdom": "Plantae",
            "phylum": "Tracheophyta",
            "basisOfRecord": "HUMAN_OBSERVATION"
        }"#;
        let record: OccurrenceRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.species.as_deref(), Some("Gentiana lutea"));
        assert_eq!(record.effective_taxon_key(), Some(5414226));
        assert_eq!(record.coordinates(), Some((48.58392, 7.74553)));
    }

    #[test]
    fn test_occurrence_missing_fields() {
        let record: OccurrenceRecord = serde_json::from_str("{}").unwrap();
        assert!(record.species.is_none());
        assert!(record.coordinates().is_none());
        assert!(record.effective_taxon_key().is_none());
    }

    #[test]
    fn test_species_status_serialization() {
        let status = SpeciesStatus {
            statuses: vec!["Liste rouge régionale (VU) (Alsace)".to_string()],
            provenance: Provenance::Rule,
        };
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"provenance\":\"rule\""));
        let parsed: SpeciesStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, status);
    }

    #[test]
    fn test_patrimonial_map_is_sorted() {
        let mut map = PatrimonialMap::new();
        for name in ["Carex halleriana", "Adonis aestivalis", "Gentiana lutea"] {
            map.insert(
                name.to_string(),
                SpeciesStatus {
                    statuses: vec![],
                    provenance: Provenance::Rule,
                },
            );
        }
        let keys: Vec<_> = map.keys().cloned().collect();
        assert_eq!(
            keys,
            vec!["Adonis aestivalis", "Carex halleriana", "Gentiana lutea"]
        );
    }
}
