//! Distance between coordinates

use crate::types::Coordinate;

/// Earth's mean radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometers using the haversine formula
pub fn great_circle_distance_km(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Euclidean distance over raw latitude/longitude degrees.
///
/// Only meaningful for very small separations; perimeter radii are configured
/// in these units.
pub fn planar_distance(a: &Coordinate, b: &Coordinate) -> f64 {
    let dlat = a.latitude - b.latitude;
    let dlon = a.longitude - b.longitude;
    (dlat * dlat + dlon * dlon).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(latitude: f64, longitude: f64) -> Coordinate {
        Coordinate {
            latitude,
            longitude,
        }
    }

    #[test]
    fn test_identical_points_are_exactly_zero() {
        for point in [coord(0.0, 0.0), coord(51.5074, -0.1278), coord(-33.86, 151.21), coord(89.9, 179.9)] {
            assert_eq!(great_circle_distance_km(&point, &point), 0.0);
        }
    }

    #[test]
    fn test_symmetry() {
        let pairs = [
            (coord(51.5074, -0.1278), coord(48.8566, 2.3522)),
            (coord(40.7128, -74.0060), coord(-33.8688, 151.2093)),
            (coord(0.0, 179.5), coord(0.0, -179.5)),
            (coord(-89.0, 0.0), coord(89.0, 90.0)),
        ];
        for (a, b) in pairs {
            let ab = great_circle_distance_km(&a, &b);
            let ba = great_circle_distance_km(&b, &a);
            assert!((ab - ba).abs() < 1e-9, "{} != {}", ab, ba);
        }
    }

    #[test]
    fn test_known_distances() {
        // One degree of longitude on the equator
        let one_degree = great_circle_distance_km(&coord(0.0, 0.0), &coord(0.0, 1.0));
        assert!((one_degree - 111.195).abs() < 0.01);

        // London to Paris, roughly 344 km
        let london_paris =
            great_circle_distance_km(&coord(51.5074, -0.1278), &coord(48.8566, 2.3522));
        assert!((london_paris - 343.5).abs() < 1.0);

        // Crossing the antimeridian takes the short way round
        let across = great_circle_distance_km(&coord(0.0, 179.5), &coord(0.0, -179.5));
        assert!((across - 111.195).abs() < 0.01);
    }

    #[test]
    fn test_planar_distance() {
        assert_eq!(planar_distance(&coord(0.0, 0.0), &coord(3.0, 4.0)), 5.0);
        assert_eq!(planar_distance(&coord(1.0, 1.0), &coord(1.0, 1.0)), 0.0);
    }
}
