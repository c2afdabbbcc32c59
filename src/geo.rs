//! Great-circle bearing and distance between the observer and a point

use crate::math::shortest_arc;
use crate::types::{GeoPosition, PointOfInterest};

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Initial great-circle bearing from one coordinate to another.
///
/// Returns degrees in [0, 360), 0 being true north.
///
/// # Example
/// ```
/// use heads_up_compass::geo::bearing;
///
/// let east = bearing(0.0, 0.0, 0.0, 1.0);
/// assert!((east - 90.0).abs() < 1e-9);
/// ```
pub fn bearing(lat_from: f64, lon_from: f64, lat_to: f64, lon_to: f64) -> f64 {
    let lat_from = lat_from.to_radians();
    let lat_to = lat_to.to_radians();
    let delta_lon = (lon_to - lon_from).to_radians();

    let y = delta_lon.sin() * lat_to.cos();
    let x = lat_from.cos() * lat_to.sin() - lat_from.sin() * lat_to.cos() * delta_lon.cos();

    let degrees = y.atan2(x).to_degrees().rem_euclid(360.0);
    if degrees >= 360.0 { 0.0 } else { degrees }
}

/// Haversine distance in kilometers.
/// See <https://en.wikipedia.org/wiki/Haversine_formula>
pub fn distance_km(lat_from: f64, lon_from: f64, lat_to: f64, lon_to: f64) -> f64 {
    let phi_from = lat_from.to_radians();
    let phi_to = lat_to.to_radians();
    let delta_lat = (lat_to - lat_from).to_radians();
    let delta_lon = (lon_to - lon_from).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + phi_from.cos() * phi_to.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Bearing and distance from the observer to a point of interest.
pub fn bearing_and_distance(observer: &GeoPosition, point: &PointOfInterest) -> (f64, f64) {
    (
        bearing(
            observer.latitude,
            observer.longitude,
            point.latitude,
            point.longitude,
        ),
        distance_km(
            observer.latitude,
            observer.longitude,
            point.latitude,
            point.longitude,
        ),
    )
}

/// The point whose bearing from the observer is closest to `heading`.
///
/// Ties go to the earlier point. `None` for an empty slice.
pub fn facing_point<'a>(
    heading: f32,
    observer: &GeoPosition,
    points: &'a [PointOfInterest],
) -> Option<&'a PointOfInterest> {
    points
        .iter()
        .map(|point| {
            let (bearing, _) = bearing_and_distance(observer, point);
            (shortest_arc(heading, bearing as f32), point)
        })
        .fold(None, |best: Option<(f32, &PointOfInterest)>, (arc, point)| match best {
            Some((best_arc, _)) if best_arc <= arc => best,
            _ => Some((arc, point)),
        })
        .map(|(_, point)| point)
}

/// Formats a distance in kilometers with at most one fraction digit,
/// dropping a trailing `.0`.
///
/// ```
/// use heads_up_compass::geo::format_distance_km;
///
/// assert_eq!(format_distance_km(2.0), "2");
/// assert_eq!(format_distance_km(2.46), "2.5");
/// assert_eq!(format_distance_km(0.04), "0");
/// ```
pub fn format_distance_km(distance: f64) -> String {
    let tenths = (distance * 10.0).round() as i64;
    if tenths % 10 == 0 {
        format!("{}", tenths / 10)
    } else {
        format!("{}.{}", tenths / 10, (tenths % 10).abs())
    }
}

/// Label text for a point at the given distance.
pub fn label_text(name: &str, distance: f64) -> String {
    format!("{} ({} km)", name, format_distance_km(distance))
}
