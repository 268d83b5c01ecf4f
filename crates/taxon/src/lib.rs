//! Scientific-name normalization for taxon matching.
//!
//! Provides pure functions for comparing taxon names from different sources
//! (occurrence records, the reference table, inference replies) that disagree
//! on author citations, rank abbreviations or whitespace:
//! - Author-citation stripping
//! - Infraspecific rank handling (subsp./var./f.)
//! - Case-insensitive matching keys
//!
//! Normalization never collapses ranks: "Festuca ovina" and
//! "Festuca ovina subsp. guestfalica" stay distinct taxa.

/// Rank abbreviations that introduce an infraspecific epithet.
const RANK_MARKERS: &[&str] = &["subsp.", "ssp.", "var.", "subvar.", "f.", "fo."];

/// True if the token is an infraspecific rank marker.
pub fn is_rank_marker(token: &str) -> bool {
    RANK_MARKERS.contains(&token.to_lowercase().as_str())
}

/// Normalize a scientific name to genus + epithet, keeping infraspecific
/// rank markers and their epithets, dropping author citations.
///
/// "Festuca ovina subsp. guestfalica (Rchb.) K.Richt." becomes
/// "Festuca ovina subsp. guestfalica"; "Gentiana lutea L." becomes
/// "Gentiana lutea". Names with fewer than two tokens pass through with
/// whitespace collapsed.
pub fn normalize_name(name: &str) -> String {
    let tokens: Vec<&str> = name.split_whitespace().collect();
    if tokens.len() < 2 {
        return tokens.join(" ");
    }

    let mut kept = vec![tokens[0], tokens[1]];
    let mut rest = tokens[2..].iter();
    while let Some(token) = rest.next() {
        if is_rank_marker(token) {
            if let Some(epithet) = rest.next() {
                kept.push(token);
                kept.push(epithet);
            }
        }
        // anything else after the epithet is an author citation
    }
    kept.join(" ")
}

/// Lowercased normalized form, for order- and case-insensitive lookups.
pub fn matching_key(name: &str) -> String {
    normalize_name(name).to_lowercase()
}

/// True if two names refer to the same taxon after normalization.
pub fn same_taxon(a: &str, b: &str) -> bool {
    matching_key(a) == matching_key(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strips_author_citation() {
        assert_eq!(normalize_name("Gentiana lutea L."), "Gentiana lutea");
        assert_eq!(normalize_name("Carex halleriana Asso"), "Carex halleriana");
        assert_eq!(
            normalize_name("Ophrys apifera Huds., 1762"),
            "Ophrys apifera"
        );
    }

    #[test]
    fn test_keeps_infraspecific_rank() {
        assert_eq!(
            normalize_name("Festuca ovina subsp. guestfalica (Rchb.) K.Richt."),
            "Festuca ovina subsp. guestfalica"
        );
        assert_eq!(
            normalize_name("Thymus serpyllum var. serpyllum Auct."),
            "Thymus serpyllum var. serpyllum"
        );
    }

    #[test]
    fn test_rank_not_collapsed_to_parent() {
        assert!(!same_taxon(
            "Festuca ovina",
            "Festuca ovina subsp. guestfalica"
        ));
    }

    #[test]
    fn test_whitespace_collapse() {
        assert_eq!(normalize_name("  Gentiana   lutea  "), "Gentiana lutea");
        assert_eq!(normalize_name("Gentiana"), "Gentiana");
        assert_eq!(normalize_name(""), "");
    }

    #[test]
    fn test_matching_key_case_insensitive() {
        assert!(same_taxon("GENTIANA LUTEA", "Gentiana lutea L."));
        assert_eq!(matching_key("Gentiana lutea L."), "gentiana lutea");
    }
}
