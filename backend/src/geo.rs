//! Geographic helpers used by provider, emergency and volunteer matching.

use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6371.0;
const KM_PER_DEGREE_LAT: f64 = 111.0;

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    /// Build a point, rejecting out-of-range coordinates
    pub fn new(lat: f64, lon: f64) -> Result<Self, String> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(format!("Invalid latitude: {}", lat));
        }
        if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
            return Err(format!("Invalid longitude: {}", lon));
        }
        Ok(Self { lat, lon })
    }

    /// Great-circle distance to another point in kilometres
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        haversine_km(self.lat, self.lon, other.lat, other.lon)
    }

    /// Bounding box `(min_lat, max_lat, min_lon, max_lon)` enclosing a radius.
    /// Used as a cheap SQL prefilter before the exact haversine check.
    ///
    /// A box that would wrap across the antimeridian or a pole spans every
    /// longitude instead, so no candidate is lost to the prefilter.
    pub fn bounding_box(&self, radius_km: f64) -> (f64, f64, f64, f64) {
        let lat_change = radius_km / KM_PER_DEGREE_LAT;
        let cos_lat = self.lat.to_radians().cos().abs().max(0.01);
        let lon_change = radius_km / KM_PER_DEGREE_LAT / cos_lat;

        let min_lat = self.lat - lat_change;
        let max_lat = self.lat + lat_change;
        let min_lon = self.lon - lon_change;
        let max_lon = self.lon + lon_change;

        let wraps = min_lat < -90.0 || max_lat > 90.0 || min_lon < -180.0 || max_lon > 180.0;
        let (min_lon, max_lon) = if wraps {
            (-180.0, 180.0)
        } else {
            (min_lon, max_lon)
        };

        (min_lat.max(-90.0), max_lat.min(90.0), min_lon, max_lon)
    }
}

pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}

/// Keep items within `radius_km` of `origin`, nearest first, at most `limit`.
///
/// `locate` returns the item's coordinates; items without a location are dropped.
pub fn nearest_within<T, F>(
    items: Vec<T>,
    origin: &GeoPoint,
    radius_km: f64,
    limit: usize,
    locate: F,
) -> Vec<(T, f64)>
where
    F: Fn(&T) -> Option<GeoPoint>,
{
    let mut ranked: Vec<(T, f64)> = items
        .into_iter()
        .filter_map(|item| {
            let point = locate(&item)?;
            let dist = origin.distance_km(&point);
            (dist <= radius_km).then_some((item, dist))
        })
        .collect();

    ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_known_distance() {
        // Delhi to Mumbai is roughly 1150 km
        let d = haversine_km(28.6139, 77.2090, 19.0760, 72.8777);
        assert!((d - 1150.0).abs() < 20.0, "got {}", d);
    }

    #[test]
    fn test_haversine_same_point() {
        assert!(haversine_km(12.97, 77.59, 12.97, 77.59) < 1e-9);
    }

    #[test]
    fn test_geo_point_rejects_out_of_range() {
        assert!(GeoPoint::new(91.0, 0.0).is_err());
        assert!(GeoPoint::new(0.0, -181.0).is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
        assert!(GeoPoint::new(12.9, 77.6).is_ok());
    }

    #[test]
    fn test_bounding_box_contains_origin() {
        let origin = GeoPoint::new(12.97, 77.59).unwrap();
        let (min_lat, max_lat, min_lon, max_lon) = origin.bounding_box(10.0);
        assert!(min_lat < origin.lat && origin.lat < max_lat);
        assert!(min_lon < origin.lon && origin.lon < max_lon);
    }

    #[test]
    fn test_bounding_box_across_antimeridian() {
        let origin = GeoPoint::new(-17.7, 179.95).unwrap();
        let across = GeoPoint::new(-17.7, -179.95).unwrap();
        assert!(origin.distance_km(&across) < 20.0);

        let (min_lat, max_lat, min_lon, max_lon) = origin.bounding_box(20.0);
        assert!(min_lat <= across.lat && across.lat <= max_lat);
        assert!(min_lon <= across.lon && across.lon <= max_lon);
    }

    #[test]
    fn test_nearest_within_sorts_and_limits() {
        let origin = GeoPoint::new(0.0, 0.0).unwrap();
        let items = vec![
            ("far", GeoPoint::new(0.0, 0.2).unwrap()),
            ("near", GeoPoint::new(0.0, 0.01).unwrap()),
            ("mid", GeoPoint::new(0.0, 0.05).unwrap()),
            ("out", GeoPoint::new(0.0, 5.0).unwrap()),
        ];

        let ranked = nearest_within(items, &origin, 50.0, 2, |(_, p)| Some(*p));
        let names: Vec<&str> = ranked.iter().map(|((n, _), _)| *n).collect();
        assert_eq!(names, vec!["near", "mid"]);
    }
}
