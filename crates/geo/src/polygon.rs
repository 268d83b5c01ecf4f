//! Search polygon construction.

use std::f64::consts::PI;

const SEGMENTS: usize = 32;

/// Kilometers per degree of latitude.
const KM_PER_LAT_DEGREE: f64 = 111.132;

/// Kilometers per degree of longitude at the equator.
const KM_PER_LON_DEGREE: f64 = 111.32;

/// Approximate a circle around (latitude, longitude) as a closed 32-sided
/// WKT polygon, coordinates rounded to 5 decimals.
///
/// Longitude steps shrink with the cosine of the latitude so the ring stays
/// roughly circular on the ground.
pub fn circle_wkt(latitude: f64, longitude: f64, radius_km: f64) -> String {
    let lon_km_per_degree = KM_PER_LON_DEGREE * latitude.to_radians().cos();
    let ring: Vec<String> = (0..=SEGMENTS)
        .map(|i| {
            let angle = i as f64 * 2.0 * PI / SEGMENTS as f64;
            let lon = longitude + radius_km / lon_km_per_degree * angle.cos();
            let lat = latitude + radius_km / KM_PER_LAT_DEGREE * angle.sin();
            format!("{:.5} {:.5}", lon, lat)
        })
        .collect();
    format!("POLYGON(({}))", ring.join(", "))
}
