//! Geographic and semantic rule applicability.

use patriflora_geo::{AdminNames, NATIONAL_SCOPE};
use patriflora_model::{AdministrativeContext, RelevantRule, RuleRow};
use std::collections::HashSet;

use crate::RuleIndex;

/// Red-list codes that are explicitly not patrimonial.
const NON_THREATENED_CODES: &[&str] = &["LC", "DD", "NA", "NE"];

/// Habitats-directive annex codes (annexes II, IV, V); listed species are
/// protected EU-wide, regardless of the rule's administrative scope.
const HABITATS_DIRECTIVE_CODES: &[&str] = &["CDH2", "CDH4", "CDH5"];

/// Administrative boilerplate, not a protection status.
const OVERSEAS_PREFECTURE_LABEL: &str = "Liste des espèces végétales sauvages pouvant faire \
l'objet d'une réglementation préfectorale dans les départements d'outre-mer : Article 1";

const RED_LIST_MARKER: &str = "liste rouge";
const NATIONAL_MARKER: &str = "nationale";
const ZNIEFF_MARKER: &str = "déterminante znieff";
const HABITATS_DIRECTIVE_MARKER: &str = "directive habitat";

/// Narrow each candidate species' rules down to those applicable at the
/// resolved department/region, excluding non-patrimonial entries, and
/// deduplicate by (taxon, status type, scope) with first occurrence winning.
///
/// A species absent from the index contributes nothing; it is deferred to
/// the classifier's inference fallback, not declared non-patrimonial here.
pub fn relevant_rules(
    candidate_species: &[String],
    index: &RuleIndex,
    ctx: &AdministrativeContext,
    names: &AdminNames,
) -> Vec<RelevantRule> {
    let mut seen: HashSet<(String, String, String)> = HashSet::new();
    let mut relevant = Vec::new();

    for species in candidate_species {
        let Some(rows) = index.rules_for(species) else {
            continue;
        };
        for row in rows {
            if !rule_applies(row, ctx, names) {
                continue;
            }
            let status_type = row.status_type.to_lowercase();
            if row.status_label == OVERSEAS_PREFECTURE_LABEL
                || status_type.contains(ZNIEFF_MARKER)
            {
                continue;
            }
            let is_red_list = status_type.contains(RED_LIST_MARKER);
            if is_red_list && NON_THREATENED_CODES.contains(&row.status_code.as_str()) {
                continue;
            }

            let key = (
                row.taxon_name.clone(),
                row.status_type.clone(),
                row.administrative_scope.clone(),
            );
            if !seen.insert(key) {
                continue;
            }

            let descriptive_status = if is_red_list {
                format!(
                    "{} ({}) ({})",
                    row.status_type, row.status_code, row.administrative_scope
                )
            } else {
                row.status_label.clone()
            };
            relevant.push(RelevantRule {
                species: row.taxon_name.clone(),
                descriptive_status,
            });
        }
    }

    relevant
}

/// Scope test, in priority order: habitats-directive listing pre-empts
/// geography entirely; then national scope, historical-region containment,
/// and exact department/region code equality.
fn rule_applies(row: &RuleRow, ctx: &AdministrativeContext, names: &AdminNames) -> bool {
    let status_type = row.status_type.to_lowercase();

    if status_type.contains(HABITATS_DIRECTIVE_MARKER)
        && HABITATS_DIRECTIVE_CODES.contains(&row.status_code.as_str())
    {
        return true;
    }

    let scope_code = names.code_for(&row.administrative_scope);
    if scope_code == Some(NATIONAL_SCOPE) || status_type.contains(NATIONAL_MARKER) {
        return true;
    }
    if names.historical_region_contains(&row.administrative_scope, &ctx.department_code) {
        return true;
    }
    matches!(scope_code, Some(code) if code == ctx.department_code || code == ctx.region_code)
}
