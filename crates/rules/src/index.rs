//! Reference-table parsing and per-taxon indexing.

use patriflora_model::RuleRow;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

const COLUMN_SCOPE: &str = "LB_ADM_TR";
const COLUMN_TAXON: &str = "LB_NOM";
const COLUMN_CODE: &str = "CODE_STATUT";
const COLUMN_TYPE: &str = "LB_TYPE_STATUT";
const COLUMN_LABEL: &str = "LABEL_STATUT";

/// Errors while loading the reference table.
#[derive(Debug, Error)]
pub enum RuleTableError {
    /// The table is malformed; no analysis can proceed.
    #[error("reference table is missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("reference table could not be read: {0}")]
    Csv(#[from] csv::Error),
}

/// Mapping from taxon name (exact string, as published) to its rule rows,
/// first-seen order preserved.
#[derive(Debug, Default)]
pub struct RuleIndex {
    by_taxon: HashMap<String, Vec<RuleRow>>,
}

impl RuleIndex {
    /// Parse the full table.
    ///
    /// Rows are indexed iff taxon name and status type are both non-empty.
    pub fn parse(raw: &str) -> Result<Self, RuleTableError> {
        Self::parse_inner(raw, None)
    }

    /// Streaming variant that retains only rows for the observed species.
    ///
    /// Functionally the full parse projected onto `observed`, without
    /// holding unrelated rows in memory.
    pub fn parse_restricted(
        raw: &str,
        observed: &HashSet<String>,
    ) -> Result<Self, RuleTableError> {
        Self::parse_inner(raw, Some(observed))
    }

    fn parse_inner(raw: &str, observed: Option<&HashSet<String>>) -> Result<Self, RuleTableError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(raw.as_bytes());

        let headers = reader.headers()?.clone();
        let column = |name: &'static str| -> Result<usize, RuleTableError> {
            headers
                .iter()
                .position(|header| header == name)
                .ok_or(RuleTableError::MissingColumn(name))
        };
        let scope_at = column(COLUMN_SCOPE)?;
        let taxon_at = column(COLUMN_TAXON)?;
        let code_at = column(COLUMN_CODE)?;
        let type_at = column(COLUMN_TYPE)?;
        let label_at = column(COLUMN_LABEL)?;

        let mut by_taxon: HashMap<String, Vec<RuleRow>> = HashMap::new();
        for record in reader.records() {
            let record = record?;
            let cell = |at: usize| record.get(at).unwrap_or("").trim();

            let taxon_name = cell(taxon_at);
            let status_type = cell(type_at);
            if taxon_name.is_empty() || status_type.is_empty() {
                continue;
            }
            if let Some(observed) = observed {
                if !observed.contains(taxon_name) {
                    continue;
                }
            }

            by_taxon
                .entry(taxon_name.to_string())
                .or_default()
                .push(RuleRow {
                    administrative_scope: cell(scope_at).to_string(),
                    taxon_name: taxon_name.to_string(),
                    status_code: cell(code_at).to_string(),
                    status_type: status_type.to_string(),
                    status_label: cell(label_at).to_string(),
                });
        }

        tracing::debug!(taxa = by_taxon.len(), "Reference table indexed");
        Ok(Self { by_taxon })
    }

    /// Rule rows for a taxon, in table order. Absent taxa return `None`.
    pub fn rules_for(&self, taxon_name: &str) -> Option<&[RuleRow]> {
        self.by_taxon.get(taxon_name).map(Vec::as_slice)
    }

    /// Number of distinct taxa indexed.
    pub fn taxon_count(&self) -> usize {
        self.by_taxon.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_taxon.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TABLE: &str = "\
LB_ADM_TR;LB_NOM;CODE_STATUT;LB_TYPE_STATUT;LABEL_STATUT
\"Alsace\";\"Gentiana lutea\";\"VU\";\"Liste rouge régionale\";\"Liste rouge d'Alsace\"
France;Gentiana lutea;;Protection nationale;Arrêté du 20 janvier 1982 : Article 1
Alsace;Carex halleriana;LC;Liste rouge régionale;Liste rouge d'Alsace
Bas-Rhin;;VU;Liste rouge régionale;ignorée, pas de taxon
Alsace;Sans Type;VU;;ignorée, pas de type
";

    #[test]
    fn test_header_binding_and_row_gate() {
        let index = RuleIndex::parse(TABLE).unwrap();
        assert_eq!(index.taxon_count(), 2);
        let rules = index.rules_for("Gentiana lutea").unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].administrative_scope, "Alsace");
        assert_eq!(rules[0].status_code, "VU");
        assert_eq!(rules[1].administrative_scope, "France");
        assert_eq!(rules[1].status_code, "");
        assert!(index.rules_for("Sans Type").is_none());
    }

    #[test]
    fn test_quoted_fields_are_stripped() {
        let index = RuleIndex::parse(TABLE).unwrap();
        let rule = &index.rules_for("Gentiana lutea").unwrap()[0];
        assert_eq!(rule.status_label, "Liste rouge d'Alsace");
        assert!(!rule.status_label.contains('"'));
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let truncated = "LB_ADM_TR;LB_NOM;CODE_STATUT;LB_TYPE_STATUT\nAlsace;X;VU;Liste rouge";
        match RuleIndex::parse(truncated) {
            Err(RuleTableError::MissingColumn(name)) => assert_eq!(name, "LABEL_STATUT"),
            other => panic!("expected MissingColumn, got {:?}", other),
        }
    }

    #[test]
    fn test_indexing_is_idempotent() {
        let first = RuleIndex::parse(TABLE).unwrap();
        let second = RuleIndex::parse(TABLE).unwrap();
        assert_eq!(first.taxon_count(), second.taxon_count());
        assert_eq!(
            first.rules_for("Gentiana lutea").unwrap(),
            second.rules_for("Gentiana lutea").unwrap()
        );
        assert_eq!(
            first.rules_for("Carex halleriana").unwrap(),
            second.rules_for("Carex halleriana").unwrap()
        );
    }

    #[test]
    fn test_restricted_parse_matches_projection() {
        let observed: HashSet<String> = ["Gentiana lutea".to_string()].into_iter().collect();
        let restricted = RuleIndex::parse_restricted(TABLE, &observed).unwrap();
        let full = RuleIndex::parse(TABLE).unwrap();
        assert_eq!(restricted.taxon_count(), 1);
        assert_eq!(
            restricted.rules_for("Gentiana lutea").unwrap(),
            full.rules_for("Gentiana lutea").unwrap()
        );
        assert!(restricted.rules_for("Carex halleriana").is_none());
    }

    #[test]
    fn test_semicolon_inside_quoted_label() {
        let table = "\
LB_ADM_TR;LB_NOM;CODE_STATUT;LB_TYPE_STATUT;LABEL_STATUT
France;Ophrys apifera;;Protection nationale;\"Arrêté du 20 janvier 1982 ; Article 1\"
";
        let index = RuleIndex::parse(table).unwrap();
        let rule = &index.rules_for("Ophrys apifera").unwrap()[0];
        assert_eq!(rule.status_label, "Arrêté du 20 janvier 1982 ; Article 1");
    }
}
