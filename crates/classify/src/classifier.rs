//! Deterministic classification and inference-fallback merge.

use patriflora_model::{
    AdministrativeContext, PatrimonialMap, Provenance, RelevantRule, SpeciesStatus,
};
use patriflora_taxon::matching_key;
use serde::Deserialize;
use std::collections::HashMap;

use crate::inference::{strip_code_fences, ClassifyError, InferenceClient};

/// Classify every observed species as patrimonial or not.
///
/// Rule-matched species are deterministic and win over anything the model
/// says about them; only species with zero relevant rules are submitted for
/// synonym adjudication. If nothing is left to adjudicate the inference
/// call is skipped. Species with neither a rule nor a model answer are
/// absent from the result.
pub async fn classify(
    observed_species: &[String],
    relevant_rules: &[RelevantRule],
    ctx: &AdministrativeContext,
    inference: &InferenceClient,
) -> Result<PatrimonialMap, ClassifyError> {
    let mut map = deterministic_map(relevant_rules);

    let unmatched: Vec<&String> = observed_species
        .iter()
        .filter(|species| !map.contains_key(*species))
        .collect();
    if unmatched.is_empty() {
        tracing::debug!("All observed species rule-matched, skipping inference");
        return Ok(map);
    }

    let prompt = build_prompt(ctx, relevant_rules, observed_species);
    let reply = inference.generate(&prompt).await?;
    let inferred = parse_inference_reply(&reply)?;
    merge_inferred(&mut map, inferred, observed_species);

    Ok(map)
}

/// Rule-derived part of the patrimonial map.
pub fn deterministic_map(relevant_rules: &[RelevantRule]) -> PatrimonialMap {
    let mut map = PatrimonialMap::new();
    for rule in relevant_rules {
        let entry = map
            .entry(rule.species.clone())
            .or_insert_with(|| SpeciesStatus {
                statuses: Vec::new(),
                provenance: Provenance::Rule,
            });
        if !entry.statuses.contains(&rule.descriptive_status) {
            entry.statuses.push(rule.descriptive_status.clone());
        }
    }
    map
}

/// Fold model answers into the map.
///
/// Model keys must resolve to an observed species (exactly, or through name
/// normalization); anything else is dropped. Rule-classified species are
/// never overwritten.
pub fn merge_inferred(
    map: &mut PatrimonialMap,
    inferred: HashMap<String, Vec<String>>,
    observed_species: &[String],
) {
    let observed_by_key: HashMap<String, &String> = observed_species
        .iter()
        .map(|species| (matching_key(species), species))
        .collect();

    for (name, statuses) in inferred {
        let resolved = if observed_species.contains(&name) {
            Some(&name)
        } else {
            observed_by_key.get(&matching_key(&name)).copied()
        };
        let Some(species) = resolved else {
            tracing::warn!(name = %name, "Inference returned a species that was not observed");
            continue;
        };
        if map.contains_key(species) {
            continue;
        }
        if statuses.is_empty() {
            continue;
        }
        map.insert(
            species.clone(),
            SpeciesStatus {
                statuses,
                provenance: Provenance::Inference,
            },
        );
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StatusValue {
    One(String),
    Many(Vec<String>),
}

impl From<StatusValue> for Vec<String> {
    fn from(value: StatusValue) -> Self {
        match value {
            StatusValue::One(status) => vec![status],
            StatusValue::Many(statuses) => statuses,
        }
    }
}

/// Parse the model reply into species → status list.
///
/// Accepts both value schemas seen in the wild (bare string and array) and
/// normalizes to the array form.
pub fn parse_inference_reply(raw: &str) -> Result<HashMap<String, Vec<String>>, ClassifyError> {
    let cleaned = strip_code_fences(raw);
    let parsed: HashMap<String, StatusValue> = serde_json::from_str(&cleaned)
        .map_err(|err| ClassifyError::InferenceFormat(err.to_string()))?;
    Ok(parsed
        .into_iter()
        .map(|(species, value)| (species, value.into()))
        .collect())
}

/// Instruction contract for the synonym-adjudication call.
pub fn build_prompt(
    ctx: &AdministrativeContext,
    relevant_rules: &[RelevantRule],
    observed_species: &[String],
) -> String {
    let direct_rules = if relevant_rules.is_empty() {
        "Aucune règle par correspondance directe.".to_string()
    } else {
        relevant_rules
            .iter()
            .map(|rule| format!("- {}: {}", rule.species, rule.descriptive_status))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Tu es un expert botaniste pour la zone administrative française \
(département {department}, région {region}). Ta mission est d'analyser une liste \
d'espèces observées et de déterminer lesquelles sont patrimoniales.

**Règles Impératives d'Analyse :**
1. **Précision Taxonomique :** Un statut s'applique UNIQUEMENT au taxon exact. \
Le statut d'une sous-espèce/variété ne s'applique pas à l'espèce parente.
2. **Définition de Patrimonialité :** Une espèce est patrimoniale si elle est \
protégée par la loi, ou menacée (NT, VU, EN, CR). Les statuts ZNIEFF, LC, DD, NA, \
NE ne sont PAS patrimoniaux.
3. **Gestion des Conflits :** Si pour un taxon, une règle 'LC' et une règle de \
menace coexistent pour la même liste, 'LC' a priorité.

**1. Analyse par Correspondance Directe :**
Règles pré-filtrées pour les espèces observées :
{rules}

**2. Analyse Complémentaire par Synonymie (si nécessaire) :**
Pour les espèces observées sans correspondance directe ci-dessus, utilise tes \
connaissances pour vérifier si elles sont des synonymes bien connus d'un taxon \
avec un statut patrimonial en France.

**Tâche Finale :**
Synthétise les résultats. Retourne UNIQUEMENT un objet JSON valide des espèces \
**effectivement patrimoniales**.
Format: {{ \"Nom de l'espèce\": [\"Statut 1\", \"Statut 2\", ...] }}.
La valeur est un TABLEAU. Si aucune espèce n'est patrimoniale, retourne {{}}.

**Liste des espèces observées :**
{species}",
        department = ctx.department_code,
        region = ctx.region_code,
        rules = direct_rules,
        species = observed_species.join(", "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ctx() -> AdministrativeContext {
        AdministrativeContext {
            department_code: "67".to_string(),
            region_code: "44".to_string(),
        }
    }

    fn rule(species: &str, status: &str) -> RelevantRule {
        RelevantRule {
            species: species.to_string(),
            descriptive_status: status.to_string(),
        }
    }

    #[test]
    fn test_deterministic_map_groups_statuses() {
        let rules = vec![
            rule("Gentiana lutea", "Liste rouge régionale (VU) (Alsace)"),
            rule("Gentiana lutea", "Arrêté du 20 janvier 1982 : Article 1"),
            rule("Adonis aestivalis", "Liste rouge régionale (EN) (Alsace)"),
        ];
        let map = deterministic_map(&rules);
        assert_eq!(map.len(), 2);
        let gentiana = &map["Gentiana lutea"];
        assert_eq!(gentiana.statuses.len(), 2);
        assert_eq!(gentiana.provenance, Provenance::Rule);
    }

    #[test]
    fn test_deterministic_map_deduplicates_identical_statuses() {
        let rules = vec![
            rule("Gentiana lutea", "Arrêté du 20 janvier 1982 : Article 1"),
            rule("Gentiana lutea", "Arrêté du 20 janvier 1982 : Article 1"),
        ];
        let map = deterministic_map(&rules);
        assert_eq!(map["Gentiana lutea"].statuses.len(), 1);
    }

    #[test]
    fn test_parse_accepts_both_value_schemas() {
        let reply = r#"```json
{"Gentiana lutea": ["Protection nationale"], "Orchis militaris": "Liste rouge (VU)"}
```"#;
        let parsed = parse_inference_reply(reply).unwrap();
        assert_eq!(
            parsed["Gentiana lutea"],
            vec!["Protection nationale".to_string()]
        );
        assert_eq!(
            parsed["Orchis militaris"],
            vec!["Liste rouge (VU)".to_string()]
        );
    }

    #[test]
    fn test_parse_rejects_malformed_reply() {
        let err = parse_inference_reply("Désolé, je ne peux pas répondre.").unwrap_err();
        assert!(matches!(err, ClassifyError::InferenceFormat(_)));
    }

    #[test]
    fn test_parse_empty_object() {
        let parsed = parse_inference_reply("```json\n{}\n```").unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_merge_keeps_rule_provenance() {
        let rules = vec![rule("Gentiana lutea", "Liste rouge régionale (VU) (Alsace)")];
        let mut map = deterministic_map(&rules);
        let observed = vec!["Gentiana lutea".to_string(), "Orchis militaris".to_string()];
        let inferred: HashMap<String, Vec<String>> = [
            (
                "Gentiana lutea".to_string(),
                vec!["autre chose".to_string()],
            ),
            (
                "Orchis militaris".to_string(),
                vec!["Protection nationale (synonyme)".to_string()],
            ),
        ]
        .into_iter()
        .collect();

        merge_inferred(&mut map, inferred, &observed);

        // deterministic entry untouched
        assert_eq!(
            map["Gentiana lutea"].statuses,
            vec!["Liste rouge régionale (VU) (Alsace)".to_string()]
        );
        assert_eq!(map["Gentiana lutea"].provenance, Provenance::Rule);
        // inferred entry tagged as such
        assert_eq!(map["Orchis militaris"].provenance, Provenance::Inference);
    }

    #[test]
    fn test_species_without_rule_or_answer_is_absent() {
        let rules = vec![rule("Gentiana lutea", "Liste rouge régionale (VU) (Alsace)")];
        let mut map = deterministic_map(&rules);
        let observed = vec![
            "Gentiana lutea".to_string(),
            "Taxus baccata".to_string(),
            "Orchis militaris".to_string(),
        ];
        let inferred: HashMap<String, Vec<String>> = [(
            "Orchis militaris".to_string(),
            vec!["Protection régionale".to_string()],
        )]
        .into_iter()
        .collect();
        merge_inferred(&mut map, inferred, &observed);
        assert!(map.contains_key("Gentiana lutea"));
        assert!(map.contains_key("Orchis militaris"));
        assert!(!map.contains_key("Taxus baccata"));
    }

    #[test]
    fn test_merge_drops_unobserved_species() {
        let mut map = PatrimonialMap::new();
        let observed = vec!["Gentiana lutea".to_string()];
        let inferred: HashMap<String, Vec<String>> =
            [("Taxon halluciné".to_string(), vec!["statut".to_string()])]
                .into_iter()
                .collect();
        merge_inferred(&mut map, inferred, &observed);
        assert!(map.is_empty());
    }

    #[test]
    fn test_merge_resolves_author_citation_variants() {
        let mut map = PatrimonialMap::new();
        let observed = vec!["Gentiana lutea".to_string()];
        let inferred: HashMap<String, Vec<String>> = [(
            "Gentiana lutea L.".to_string(),
            vec!["Protection nationale".to_string()],
        )]
        .into_iter()
        .collect();
        merge_inferred(&mut map, inferred, &observed);
        assert_eq!(map["Gentiana lutea"].provenance, Provenance::Inference);
    }

    #[test]
    fn test_prompt_carries_context_rules_and_species() {
        let rules = vec![rule("Gentiana lutea", "Liste rouge régionale (VU) (Alsace)")];
        let observed = vec!["Gentiana lutea".to_string(), "Orchis militaris".to_string()];
        let prompt = build_prompt(&ctx(), &rules, &observed);
        assert!(prompt.contains("département 67"));
        assert!(prompt.contains("région 44"));
        assert!(prompt.contains("- Gentiana lutea: Liste rouge régionale (VU) (Alsace)"));
        assert!(prompt.contains("Gentiana lutea, Orchis militaris"));
        assert!(prompt.contains("retourne {}"));
    }

    #[test]
    fn test_prompt_without_direct_rules() {
        let prompt = build_prompt(&ctx(), &[], &["Orchis militaris".to_string()]);
        assert!(prompt.contains("Aucune règle par correspondance directe."));
    }
}
