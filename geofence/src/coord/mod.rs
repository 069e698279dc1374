//! Coordinate module
//!
//! Provides the geographic [`Coordinate`] value type and great-circle
//! distance on a spherical Earth model.

mod types;

pub use types::{CoordError, Coordinate, MAX_LAT, MAX_LON, MIN_LAT, MIN_LON};

/// Mean Earth radius in meters used by the haversine formula.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two coordinates in meters.
///
/// Uses the haversine formula on a sphere of radius [`EARTH_RADIUS_M`].
/// Accurate to the spherical approximation (~0.5%). NaN or infinite
/// components propagate as NaN.
///
/// # Example
///
/// ```
/// use geofence::coord::{haversine_distance, Coordinate};
///
/// let a = Coordinate::new(37.5465, 126.9497);
/// assert_eq!(haversine_distance(&a, &a), 0.0);
/// ```
#[inline]
pub fn haversine_distance(a: &Coordinate, b: &Coordinate) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let sin_dlat = (d_lat / 2.0).sin();
    let sin_dlon = (d_lon / 2.0).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;

    // Rounding can push h fractionally above 1 for antipodal points.
    // Not f64::min, which would swallow NaN.
    let h = if h > 1.0 { 1.0 } else { h };
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Degrees of latitude spanning `meters` along a meridian.
    fn meridian_degrees(meters: f64) -> f64 {
        (meters / EARTH_RADIUS_M).to_degrees()
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let a = Coordinate::new(37.5465, 126.9497);
        assert_eq!(haversine_distance(&a, &a), 0.0);
    }

    #[test]
    fn test_hundred_meters_along_meridian() {
        let a = Coordinate::new(37.5465, 126.9497);
        let b = Coordinate::new(37.5465 + meridian_degrees(100.0), 126.9497);

        let d = haversine_distance(&a, &b);
        assert!((d - 100.0).abs() < 1.0, "Expected ~100m, got {}", d);
    }

    #[test]
    fn test_one_degree_latitude() {
        // ~111km per degree of latitude
        let a = Coordinate::new(35.0, 139.0);
        let b = Coordinate::new(36.0, 139.0);
        let d = haversine_distance(&a, &b);
        assert!((d - 111_195.0).abs() < 100.0, "Expected ~111.2km, got {}", d);
    }

    #[test]
    fn test_reference_sample_is_kilometers_away() {
        let center = Coordinate::new(37.5465, 126.9497);
        let sample = Coordinate::new(37.56, 126.97);
        let d = center.distance_to(&sample);
        assert!(d > 2_000.0 && d < 3_000.0, "Expected ~2.4km, got {}", d);
    }

    #[test]
    fn test_antipodal_points() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(0.0, 180.0);
        let d = haversine_distance(&a, &b);
        let half_circumference = std::f64::consts::PI * EARTH_RADIUS_M;
        assert!((d - half_circumference).abs() < 1.0);
    }

    #[test]
    fn test_nan_propagates() {
        let a = Coordinate::new(f64::NAN, 0.0);
        let b = Coordinate::new(0.0, 0.0);
        assert!(haversine_distance(&a, &b).is_nan());
    }

    #[test]
    fn test_infinite_input_propagates_nan() {
        let a = Coordinate::new(0.0, f64::INFINITY);
        let b = Coordinate::new(0.0, 0.0);
        assert!(haversine_distance(&a, &b).is_nan());
    }

    proptest! {
        #[test]
        fn prop_distance_is_symmetric(
            lat1 in -90.0f64..=90.0, lon1 in -180.0f64..=180.0,
            lat2 in -90.0f64..=90.0, lon2 in -180.0f64..=180.0,
        ) {
            let a = Coordinate::new(lat1, lon1);
            let b = Coordinate::new(lat2, lon2);
            let ab = haversine_distance(&a, &b);
            let ba = haversine_distance(&b, &a);
            prop_assert!((ab - ba).abs() < 1e-6, "ab={} ba={}", ab, ba);
        }

        #[test]
        fn prop_distance_is_bounded(
            lat1 in -90.0f64..=90.0, lon1 in -180.0f64..=180.0,
            lat2 in -90.0f64..=90.0, lon2 in -180.0f64..=180.0,
        ) {
            let d = haversine_distance(&Coordinate::new(lat1, lon1), &Coordinate::new(lat2, lon2));
            prop_assert!(d >= 0.0);
            prop_assert!(d <= std::f64::consts::PI * EARTH_RADIUS_M + 1e-6);
        }

        #[test]
        fn prop_distance_to_self_is_zero(lat in -90.0f64..=90.0, lon in -180.0f64..=180.0) {
            let a = Coordinate::new(lat, lon);
            prop_assert_eq!(haversine_distance(&a, &a), 0.0);
        }
    }
}
