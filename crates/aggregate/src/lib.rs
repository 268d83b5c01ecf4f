//! Per-location aggregation of detailed occurrences.
//!
//! Groups occurrence records by coordinate rounded to 5 decimals, merges the
//! patrimonial species observed at each point, and assigns each species a
//! stable display color. Also shapes the point-feature collection handed to
//! the vector-file export sink (coordinates stay WGS84; reprojection is the
//! sink's concern).

use patriflora_model::OccurrenceRecord;
use serde::Serialize;
use std::collections::HashMap;

/// Fixed display palette, cycled when species outnumber entries.
pub const SPECIES_COLORS: &[&str] = &[
    "#E6194B", "#3CB44B", "#FFE119", "#4363D8", "#F58231", "#911EB4", "#46F0F0",
    "#F032E6", "#BCF60C", "#FABEBE", "#800000", "#AA6E28", "#000075", "#A9A9A9",
];

/// Color for the species at this ordinal position.
pub fn color_for(ordinal: usize) -> &'static str {
    SPECIES_COLORS[ordinal % SPECIES_COLORS.len()]
}

/// An occurrence annotated with the confirmed species it belongs to and its
/// display color.
#[derive(Debug, Clone, Serialize)]
pub struct DetailedOccurrence {
    pub record: OccurrenceRecord,
    pub species: String,
    pub color: String,
}

/// One species observed at a bucketed location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeciesMarker {
    pub name: String,
    pub color: String,
}

/// All patrimonial species observed at one rounded coordinate.
#[derive(Debug, Clone, Serialize)]
pub struct LocationBucket {
    pub latitude: f64,
    pub longitude: f64,
    pub species: Vec<SpeciesMarker>,
}

/// Group detailed occurrences by coordinate rounded to 5 decimal places.
///
/// Records lacking coordinates are skipped. Within a bucket a species
/// appears once, first-seen order; the bucket keeps the coordinates of the
/// first record that created it. Rounding deliberately merges nearby
/// sub-meter records.
pub fn bucket_by_location(occurrences: &[DetailedOccurrence]) -> Vec<LocationBucket> {
    let mut buckets: Vec<LocationBucket> = Vec::new();
    let mut index_by_key: HashMap<String, usize> = HashMap::new();

    for occurrence in occurrences {
        let Some((latitude, longitude)) = occurrence.record.coordinates() else {
            continue;
        };
        let key = format!("{:.5},{:.5}", latitude, longitude);
        let at = *index_by_key.entry(key).or_insert_with(|| {
            buckets.push(LocationBucket {
                latitude,
                longitude,
                species: Vec::new(),
            });
            buckets.len() - 1
        });
        let bucket = &mut buckets[at];
        if !bucket
            .species
            .iter()
            .any(|marker| marker.name == occurrence.species)
        {
            bucket.species.push(SpeciesMarker {
                name: occurrence.species.clone(),
                color: occurrence.color.clone(),
            });
        }
    }

    buckets
}

/// A GeoJSON-style point feature for the export sink.
#[derive(Debug, Clone, Serialize)]
pub struct PointFeature {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub properties: FeatureProperties,
    pub geometry: PointGeometry,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureProperties {
    /// Species names at this point, joined with "; "
    pub species: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PointGeometry {
    #[serde(rename = "type")]
    pub kind: &'static str,
    /// (longitude, latitude), WGS84
    pub coordinates: [f64; 2],
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub features: Vec<PointFeature>,
}

/// One point feature per bucket.
pub fn export_features(buckets: &[LocationBucket]) -> FeatureCollection {
    let features = buckets
        .iter()
        .map(|bucket| PointFeature {
            kind: "Feature",
            properties: FeatureProperties {
                species: bucket
                    .species
                    .iter()
                    .map(|marker| marker.name.as_str())
                    .collect::<Vec<_>>()
                    .join("; "),
            },
            geometry: PointGeometry {
                kind: "Point",
                coordinates: [bucket.longitude, bucket.latitude],
            },
        })
        .collect();
    FeatureCollection {
        kind: "FeatureCollection",
        features,
    }
}
