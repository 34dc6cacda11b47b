use std::fmt;
use std::str::FromStr;

use crate::models::delivery::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceMetric {
    /// Euclidean distance over raw degrees. Good enough for short-range simulation.
    #[default]
    Planar,
    /// Great-circle distance in kilometres.
    Haversine,
}

impl DistanceMetric {
    pub fn distance(self, a: &GeoPoint, b: &GeoPoint) -> f64 {
        match self {
            DistanceMetric::Planar => planar_distance(a, b),
            DistanceMetric::Haversine => haversine_km(a, b),
        }
    }
}

impl FromStr for DistanceMetric {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "planar" | "euclidean" => Ok(DistanceMetric::Planar),
            "haversine" | "great_circle" => Ok(DistanceMetric::Haversine),
            other => Err(format!(
                "unknown distance metric: {other}, expected planar/haversine"
            )),
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceMetric::Planar => f.write_str("planar"),
            DistanceMetric::Haversine => f.write_str("haversine"),
        }
    }
}

pub fn planar_distance(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let dx = b.lng - a.lng;
    let dy = b.lat - a.lat;
    dx.hypot(dy)
}

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    // Rounding can push this a hair above 1.0 for antipodal points.
    let haversine = (sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng).min(1.0);
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

pub fn has_arrived(
    current: &GeoPoint,
    destination: &GeoPoint,
    threshold: f64,
    metric: DistanceMetric,
) -> bool {
    metric.distance(current, destination) < threshold
}

#[cfg(test)]
mod tests {
    use super::{haversine_km, has_arrived, planar_distance, DistanceMetric};
    use crate::models::delivery::GeoPoint;

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint::new(53.5511, 9.9937);
        assert!(haversine_km(&p, &p) < 1e-9);
        assert_eq!(planar_distance(&p, &p), 0.0);
    }

    #[test]
    fn london_to_paris_is_around_343_km() {
        let london = GeoPoint::new(51.5074, -0.1278);
        let paris = GeoPoint::new(48.8566, 2.3522);
        let distance = haversine_km(&london, &paris);
        assert!((distance - 343.0).abs() < 5.0);
    }

    #[test]
    fn planar_distance_is_euclidean_over_degrees() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(3.0, 4.0);
        assert!((planar_distance(&a, &b) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn both_metrics_are_symmetric() {
        let a = GeoPoint::new(52.52, 13.405);
        let b = GeoPoint::new(48.1351, 11.582);
        for metric in [DistanceMetric::Planar, DistanceMetric::Haversine] {
            assert_eq!(metric.distance(&a, &b), metric.distance(&b, &a));
        }
    }

    #[test]
    fn closer_points_yield_smaller_distances() {
        let destination = GeoPoint::new(1.0, 1.0);
        let far = GeoPoint::new(0.0, 0.0);
        let near = GeoPoint::new(0.5, 0.5);
        for metric in [DistanceMetric::Planar, DistanceMetric::Haversine] {
            assert!(metric.distance(&near, &destination) < metric.distance(&far, &destination));
        }
    }

    #[test]
    fn arrival_is_strictly_below_threshold() {
        let destination = GeoPoint::new(1.0, 1.0);
        let close = GeoPoint::new(1.0, 0.95);
        let edge = GeoPoint::new(1.0, 0.9);

        assert!(has_arrived(&close, &destination, 0.1, DistanceMetric::Planar));
        assert!(!has_arrived(&edge, &destination, 0.05, DistanceMetric::Planar));
        assert!(!has_arrived(
            &GeoPoint::new(0.0, 0.0),
            &destination,
            0.1,
            DistanceMetric::Planar
        ));
    }

    #[test]
    fn parses_metric_names() {
        assert_eq!("planar".parse::<DistanceMetric>(), Ok(DistanceMetric::Planar));
        assert_eq!(
            " Haversine ".parse::<DistanceMetric>(),
            Ok(DistanceMetric::Haversine)
        );
        assert!("manhattan".parse::<DistanceMetric>().is_err());
    }
}
