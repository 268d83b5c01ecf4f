//! Administrative name tables.
//!
//! The reference table was assembled over decades and cites administrative
//! units under names the current geographic API no longer returns: pre-2016
//! regions, department display names, "France". These tables bridge old
//! nomenclature to current codes. An unmapped name silently makes its rules
//! unreachable, so the tables must stay complete; `validate` surfaces the
//! known code collisions in the published data.

use std::collections::HashMap;

/// Sentinel code for nationally-scoped rules.
pub const NATIONAL_SCOPE: &str = "FR";

/// Pre-2016 regions and the departments they contained.
const HISTORICAL_REGIONS: &[(&str, &[&str])] = &[
    ("Alsace", &["67", "68"]),
    ("Aquitaine", &["24", "33", "40", "47", "64"]),
    ("Auvergne", &["03", "15", "43", "63"]),
    ("Basse-Normandie", &["14", "50", "61"]),
    ("Bourgogne", &["21", "58", "71", "89"]),
    ("Champagne-Ardenne", &["08", "10", "51", "52"]),
    ("Franche-Comté", &["25", "39", "70", "90"]),
    ("Haute-Normandie", &["27", "76"]),
    ("Languedoc-Roussillon", &["11", "30", "34", "48", "66"]),
    ("Limousin", &["19", "23", "87"]),
    ("Lorraine", &["54", "55", "57", "88"]),
    ("Midi-Pyrénées", &["09", "12", "31", "32", "46", "65", "81", "82"]),
    ("Nord-Pas-de-Calais", &["59", "62"]),
    ("Picardie", &["02", "60", "80"]),
    ("Poitou-Charentes", &["16", "17", "79", "86"]),
    ("Rhône-Alpes", &["01", "07", "26", "38", "42", "69", "73", "74"]),
];

/// Administrative display name to department/region code, plus the national
/// sentinel. Department and region codes are distinct INSEE namespaces that
/// happen to share numbers.
const NAME_TO_CODE: &[(&str, &str)] = &[
    ("France", NATIONAL_SCOPE),
    // Departments
    ("Ain", "01"),
    ("Aisne", "02"),
    ("Allier", "03"),
    ("Alpes-de-Haute-Provence", "04"),
    ("Hautes-Alpes", "05"),
    ("Alpes-Maritimes", "06"),
    ("Ardèche", "07"),
    ("Ardennes", "08"),
    ("Ariège", "09"),
    ("Aube", "10"),
    ("Aude", "11"),
    ("Aveyron", "12"),
    ("Bouches-du-Rhône", "13"),
    ("Calvados", "14"),
    ("Cantal", "15"),
    ("Charente", "16"),
    ("Charente-Maritime", "17"),
    ("Cher", "18"),
    ("Corrèze", "19"),
    ("Corse-du-Sud", "2A"),
    ("Haute-Corse", "2B"),
    ("Côte-d'Or", "21"),
    ("Côtes-d'Armor", "22"),
    ("Creuse", "23"),
    ("Dordogne", "24"),
    ("Doubs", "25"),
    ("Drôme", "26"),
    ("Eure", "27"),
    ("Eure-et-Loir", "28"),
    ("Finistère", "29"),
    ("Gard", "30"),
    ("Haute-Garonne", "31"),
    ("Gers", "32"),
    ("Gironde", "33"),
    ("Hérault", "34"),
    ("Ille-et-Vilaine", "35"),
    ("Indre", "36"),
    ("Indre-et-Loire", "37"),
    ("Isère", "38"),
    ("Jura", "39"),
    ("Landes", "40"),
    ("Loir-et-Cher", "41"),
    ("Loire", "42"),
    ("Haute-Loire", "43"),
    ("Loire-Atlantique", "44"),
    ("Loiret", "45"),
    ("Lot", "46"),
    ("Lot-et-Garonne", "47"),
    ("Lozère", "48"),
    ("Maine-et-Loire", "49"),
    ("Manche", "50"),
    ("Marne", "51"),
    ("Haute-Marne", "52"),
    ("Mayenne", "53"),
    ("Meurthe-et-Moselle", "54"),
    ("Meuse", "55"),
    ("Morbihan", "56"),
    ("Moselle", "57"),
    ("Nièvre", "58"),
    ("Nord", "59"),
    ("Oise", "60"),
    ("Orne", "61"),
    ("Pas-de-Calais", "62"),
    ("Puy-de-Dôme", "63"),
    ("Pyrénées-Atlantiques", "64"),
    ("Hautes-Pyrénées", "65"),
    ("Pyrénées-Orientales", "66"),
    ("Bas-Rhin", "67"),
    ("Haut-Rhin", "68"),
    ("Rhône", "69"),
    ("Haute-Saône", "70"),
    ("Saône-et-Loire", "71"),
    ("Sarthe", "72"),
    ("Savoie", "73"),
    ("Haute-Savoie", "74"),
    ("Paris", "75"),
    ("Seine-Maritime", "76"),
    ("Seine-et-Marne", "77"),
    ("Yvelines", "78"),
    ("Deux-Sèvres", "79"),
    ("Somme", "80"),
    ("Tarn", "81"),
    ("Tarn-et-Garonne", "82"),
    ("Var", "83"),
    ("Vaucluse", "84"),
    ("Vendée", "85"),
    ("Vienne", "86"),
    ("Haute-Vienne", "87"),
    ("Vosges", "88"),
    ("Yonne", "89"),
    ("Territoire de Belfort", "90"),
    ("Essonne", "91"),
    ("Hauts-de-Seine", "92"),
    ("Seine-Saint-Denis", "93"),
    ("Val-de-Marne", "94"),
    ("Val-d'Oise", "95"),
    // Current regions (post-2016)
    ("Auvergne-Rhône-Alpes", "84"),
    ("Bourgogne-Franche-Comté", "27"),
    ("Bretagne", "53"),
    ("Centre-Val de Loire", "24"),
    ("Corse", "94"),
    ("Grand Est", "44"),
    ("Hauts-de-France", "32"),
    ("Île-de-France", "11"),
    ("Normandie", "28"),
    ("Nouvelle-Aquitaine", "75"),
    ("Occitanie", "76"),
    ("Pays de la Loire", "52"),
    ("Provence-Alpes-Côte d'Azur", "93"),
    // Overseas, as published (codes collide with metropolitan departments)
    ("Guadeloupe", "01"),
    ("Martinique", "02"),
    ("Guyane", "03"),
    ("La Réunion", "04"),
    ("Mayotte", "06"),
];

/// Immutable administrative name tables, built once per process and passed
/// by reference into each analysis.
#[derive(Debug)]
pub struct AdminNames {
    code_by_name: HashMap<&'static str, &'static str>,
    departments_by_historical_region: HashMap<&'static str, &'static [&'static str]>,
}

impl Default for AdminNames {
    fn default() -> Self {
        Self::new()
    }
}

impl AdminNames {
    pub fn new() -> Self {
        Self {
            code_by_name: NAME_TO_CODE.iter().copied().collect(),
            departments_by_historical_region: HISTORICAL_REGIONS.iter().copied().collect(),
        }
    }

    /// Canonical code for an administrative name as it appears in the
    /// reference table, if known.
    pub fn code_for(&self, name: &str) -> Option<&'static str> {
        self.code_by_name.get(name).copied()
    }

    /// Department codes a pre-2016 region used to contain.
    pub fn historical_departments(&self, name: &str) -> Option<&'static [&'static str]> {
        self.departments_by_historical_region.get(name).copied()
    }

    /// True if the historical region contained the department.
    pub fn historical_region_contains(&self, region_name: &str, department_code: &str) -> bool {
        self.historical_departments(region_name)
            .is_some_and(|departments| departments.contains(&department_code))
    }

    /// Report codes mapped from more than one name.
    ///
    /// The published table reuses metropolitan department numbers for
    /// overseas units, and region codes share numbers with departments by
    /// INSEE construction. Callers log these; rules scoped to colliding
    /// names still resolve through exact-code comparison.
    pub fn validate(&self) -> Vec<String> {
        let mut names_by_code: HashMap<&str, Vec<&str>> = HashMap::new();
        for (name, code) in NAME_TO_CODE {
            names_by_code.entry(code).or_default().push(name);
        }
        let mut issues: Vec<String> = names_by_code
            .into_iter()
            .filter(|(_, names)| names.len() > 1)
            .map(|(code, mut names)| {
                names.sort_unstable();
                format!("code {} is shared by: {}", code, names.join(", "))
            })
            .collect();
        issues.sort();
        issues
    }
}
