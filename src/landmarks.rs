//! Sources of nearby points of interest

use tracing::debug;

use crate::geo::distance_km;
use crate::types::PointOfInterest;

/// Default search radius around the observer.
pub const DEFAULT_RADIUS_KM: f64 = 10.0;

/// Supplies the points of interest near a coordinate.
///
/// Called from the sensor callback thread whenever the position changes, so
/// implementations should answer quickly.
pub trait LandmarkProvider: Send + Sync {
    fn nearby(&self, latitude: f64, longitude: f64) -> Vec<PointOfInterest>;
}

/// Fixed list of places filtered by great-circle distance
///
/// # Example
/// ```
/// use heads_up_compass::{InMemoryLandmarks, LandmarkProvider, PointOfInterest};
///
/// let landmarks = InMemoryLandmarks::new(vec![
///     PointOfInterest::new(37.7955, -122.3937, "Ferry Building", "Farmers market"),
///     PointOfInterest::new(34.0522, -118.2437, "Los Angeles", "Far away"),
/// ]);
///
/// let nearby = landmarks.nearby(37.7749, -122.4194);
/// assert_eq!(nearby.len(), 1);
/// assert_eq!(nearby[0].name, "Ferry Building");
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryLandmarks {
    places: Vec<PointOfInterest>,
    radius_km: f64,
}

impl InMemoryLandmarks {
    pub fn new(places: Vec<PointOfInterest>) -> Self {
        Self::with_radius_km(places, DEFAULT_RADIUS_KM)
    }

    pub fn with_radius_km(places: Vec<PointOfInterest>, radius_km: f64) -> Self {
        Self { places, radius_km }
    }

    pub fn radius_km(&self) -> f64 {
        self.radius_km
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }
}

impl Default for InMemoryLandmarks {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl LandmarkProvider for InMemoryLandmarks {
    fn nearby(&self, latitude: f64, longitude: f64) -> Vec<PointOfInterest> {
        let nearby: Vec<_> = self
            .places
            .iter()
            .filter(|p| distance_km(latitude, longitude, p.latitude, p.longitude) <= self.radius_km)
            .cloned()
            .collect();
        debug!(
            total = self.places.len(),
            nearby = nearby.len(),
            radius_km = self.radius_km,
            "filtered landmarks"
        );
        nearby
    }
}
