//! Orientation tracking: sensor and location fusion into a true-north heading
//!
//! [`OrientationTracker`] owns the subscriptions to the sensor platform and
//! turns raw rotation-vector samples, magnetic-field accuracy reports and
//! location fixes into an [`OrientationSample`]. Every sample updates a
//! whole-value snapshot and fires exactly one listener callback, synchronously
//! on the thread that delivered it.
//!
//! # Example
//! ```
//! use std::sync::Arc;
//! use heads_up_compass::{
//!     GeoPosition, LocationRequest, OrientationTracker, Result, SensorKind, SensorPlatform,
//! };
//!
//! struct Headless;
//!
//! impl SensorPlatform for Headless {
//!     fn subscribe_sensor(&self, _kind: SensorKind) -> Result<()> { Ok(()) }
//!     fn unsubscribe_sensors(&self) {}
//!     fn subscribe_location(&self, _request: LocationRequest) -> Result<()> { Ok(()) }
//!     fn unsubscribe_location(&self) {}
//!     fn last_known_position(&self) -> Option<GeoPosition> { None }
//!     fn now_millis(&self) -> i64 { 0 }
//! }
//!
//! let tracker = OrientationTracker::new(Arc::new(Headless));
//! tracker.start();
//!
//! // A quarter turn about X holds the display upright, facing north.
//! let half = std::f32::consts::FRAC_PI_4.sin();
//! tracker.on_rotation_vector(&[half, 0.0, 0.0, half]);
//! assert!(tracker.pitch().abs() < 1e-3);
//! assert!(tracker.heading() > 353.0); // arm offset of 6 degrees
//! ```

use std::sync::Arc;

use nalgebra::UnitQuaternion;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};

use crate::axes::remap_coordinate_system;
use crate::declination::{DeclinationModel, GeomagneticCorrector, GeomagneticField, MainField};
use crate::error::Result;
use crate::math::{QuaternionExt, RAD_TO_DEG, normalize_degrees, orientation_angles};
use crate::types::{
    GeoPosition, LocationRequest, OrientationSample, SensorAccuracy, SensorKind, TrackerSettings,
};

/// Sensor and location services the tracker subscribes to.
///
/// Implementations deliver samples by calling back into
/// [`OrientationTracker::on_rotation_vector`],
/// [`OrientationTracker::on_magnetic_accuracy`] and
/// [`OrientationTracker::on_location`] from whatever thread they like.
pub trait SensorPlatform: Send + Sync {
    fn subscribe_sensor(&self, kind: SensorKind) -> Result<()>;
    fn unsubscribe_sensors(&self);
    fn subscribe_location(&self, request: LocationRequest) -> Result<()>;
    fn unsubscribe_location(&self);
    /// Best-effort cached fix from any provider.
    fn last_known_position(&self) -> Option<GeoPosition>;
    /// Wall-clock milliseconds since the Unix epoch, used to age cached fixes.
    fn now_millis(&self) -> i64;
}

/// Observer of tracker events
///
/// All methods default to no-ops so listeners implement only what they need.
pub trait OrientationListener: Send + Sync {
    fn on_orientation_changed(&self, _sample: &OrientationSample) {}
    fn on_location_changed(&self, _position: &GeoPosition) {}
    fn on_accuracy_changed(&self, _sample: &OrientationSample) {}
}

/// Everything the tracker publishes, replaced as a whole on every update.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrackerSnapshot {
    pub sample: OrientationSample,
    pub position: Option<GeoPosition>,
}

/// Fuses rotation, magnetic accuracy and location into a true-north heading
pub struct OrientationTracker {
    settings: TrackerSettings,
    platform: Arc<dyn SensorPlatform>,
    tracking: Mutex<bool>,
    snapshot: RwLock<TrackerSnapshot>,
    corrector: Mutex<GeomagneticCorrector>,
    listeners: RwLock<Vec<Arc<dyn OrientationListener>>>,
}

impl OrientationTracker {
    /// Tracker with default settings and the built-in field model.
    pub fn new(platform: Arc<dyn SensorPlatform>) -> Self {
        Self::build(
            platform,
            TrackerSettings::default(),
            Box::new(MainField::default()),
        )
    }

    /// Tracker with default settings and a custom declination model.
    pub fn with_model(platform: Arc<dyn SensorPlatform>, model: Box<dyn DeclinationModel>) -> Self {
        Self::build(platform, TrackerSettings::default(), model)
    }

    /// Tracker with custom settings and declination model.
    ///
    /// # Errors
    /// [`CompassError::DegenerateAxes`](crate::CompassError::DegenerateAxes)
    /// when the remap axes name the same device axis.
    pub fn with_settings(
        platform: Arc<dyn SensorPlatform>,
        settings: TrackerSettings,
        model: Box<dyn DeclinationModel>,
    ) -> Result<Self> {
        remap_coordinate_system(&nalgebra::Matrix3::identity(), settings.remap_x, settings.remap_y)?;
        Ok(Self::build(platform, settings, model))
    }

    fn build(
        platform: Arc<dyn SensorPlatform>,
        settings: TrackerSettings,
        model: Box<dyn DeclinationModel>,
    ) -> Self {
        Self {
            settings,
            platform,
            tracking: Mutex::new(false),
            snapshot: RwLock::new(TrackerSnapshot::default()),
            corrector: Mutex::new(GeomagneticCorrector::new(model)),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    /// Registers a listener. Adding the same listener twice has no effect.
    pub fn add_listener(&self, listener: Arc<dyn OrientationListener>) {
        let mut listeners = self.listeners.write();
        if !listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            listeners.push(listener);
        }
    }

    pub fn remove_listener(&self, listener: &Arc<dyn OrientationListener>) {
        self.listeners.write().retain(|l| !Arc::ptr_eq(l, listener));
    }

    /// Subscribes to the sensor and location streams.
    ///
    /// Idempotent. A stream the platform cannot supply is logged and left
    /// out; tracking proceeds with whatever is available. A cached fix younger
    /// than [`TrackerSettings::max_last_known_age`] seeds the position and the
    /// declination.
    pub fn start(&self) {
        let mut tracking = self.tracking.lock();
        if *tracking {
            debug!("orientation tracker already started");
            return;
        }

        for kind in [SensorKind::RotationVector, SensorKind::MagneticField] {
            if let Err(error) = self.platform.subscribe_sensor(kind) {
                warn!(error = %error, ?kind, "sensor subscription failed, continuing without it");
            }
        }

        if let Err(error) = self
            .platform
            .subscribe_location(self.settings.location_request())
        {
            warn!(error = %error, "location subscription failed, continuing without it");
        }

        if let Some(fix) = self.platform.last_known_position() {
            let age = fix.age_millis(self.platform.now_millis());
            let max_age = self.settings.max_last_known_age.as_millis() as i64;
            if age < max_age {
                debug!(age_millis = age, "seeding position from last known fix");
                self.replace_position(fix);
            } else {
                debug!(age_millis = age, "ignoring stale last known fix");
            }
        }

        *tracking = true;
        debug!("orientation tracker started");
    }

    /// Unsubscribes from every stream. Idempotent.
    ///
    /// The last heading, pitch and position stay readable.
    pub fn stop(&self) {
        let mut tracking = self.tracking.lock();
        if !*tracking {
            return;
        }
        self.platform.unsubscribe_sensors();
        self.platform.unsubscribe_location();
        *tracking = false;
        debug!("orientation tracker stopped");
    }

    pub fn is_tracking(&self) -> bool {
        *self.tracking.lock()
    }

    /// Handles one rotation-vector sample `[x, y, z]` or `[x, y, z, w]`.
    ///
    /// Malformed samples are logged and skipped.
    pub fn on_rotation_vector(&self, values: &[f32]) {
        let Some(orientation) = UnitQuaternion::from_rotation_sample(values) else {
            warn!(len = values.len(), "discarding malformed rotation sample");
            return;
        };

        let rotation = orientation.to_rotation_matrix().into_inner();
        let remapped =
            match remap_coordinate_system(&rotation, self.settings.remap_x, self.settings.remap_y) {
                Ok(remapped) => remapped,
                Err(error) => {
                    warn!(error = %error, "discarding rotation sample");
                    return;
                }
            };

        let (azimuth, pitch, _roll) = orientation_angles(&remapped);
        let magnetic_heading = normalize_degrees(azimuth * RAD_TO_DEG);
        let heading = self
            .corrector
            .lock()
            .correct(magnetic_heading, self.settings.arm_offset_degrees);

        let sample = {
            let mut snapshot = self.snapshot.write();
            let sample = OrientationSample {
                heading,
                pitch: (pitch * RAD_TO_DEG).clamp(-90.0, 90.0),
                has_interference: snapshot.sample.has_interference,
            };
            *snapshot = TrackerSnapshot {
                sample,
                position: snapshot.position,
            };
            sample
        };

        trace!(heading = sample.heading, pitch = sample.pitch, "orientation changed");
        for listener in self.listeners_snapshot() {
            listener.on_orientation_changed(&sample);
        }
    }

    /// Handles an accuracy report from the magnetic-field stream.
    pub fn on_magnetic_accuracy(&self, accuracy: SensorAccuracy) {
        let has_interference = accuracy.indicates_interference();
        let sample = {
            let mut snapshot = self.snapshot.write();
            let sample = OrientationSample {
                has_interference,
                ..snapshot.sample
            };
            *snapshot = TrackerSnapshot {
                sample,
                position: snapshot.position,
            };
            sample
        };

        debug!(?accuracy, has_interference, "magnetic accuracy changed");
        for listener in self.listeners_snapshot() {
            listener.on_accuracy_changed(&sample);
        }
    }

    /// Handles a location fix. Heading and pitch are left alone until the
    /// next rotation sample.
    pub fn on_location(&self, position: GeoPosition) {
        self.replace_position(position);
        debug!(
            latitude = position.latitude,
            longitude = position.longitude,
            "location changed"
        );
        for listener in self.listeners_snapshot() {
            listener.on_location_changed(&position);
        }
    }

    fn replace_position(&self, position: GeoPosition) {
        self.corrector.lock().update(&position);
        let mut snapshot = self.snapshot.write();
        *snapshot = TrackerSnapshot {
            sample: snapshot.sample,
            position: Some(position),
        };
    }

    fn listeners_snapshot(&self) -> Vec<Arc<dyn OrientationListener>> {
        self.listeners.read().clone()
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        *self.snapshot.read()
    }

    pub fn sample(&self) -> OrientationSample {
        self.snapshot.read().sample
    }

    /// True-north heading in degrees, [0, 360).
    pub fn heading(&self) -> f32 {
        self.sample().heading
    }

    /// Head tilt in degrees, [-90, 90].
    pub fn pitch(&self) -> f32 {
        self.sample().pitch
    }

    pub fn has_interference(&self) -> bool {
        self.sample().has_interference
    }

    pub fn position(&self) -> Option<GeoPosition> {
        self.snapshot.read().position
    }

    pub fn has_location(&self) -> bool {
        self.position().is_some()
    }

    /// Geomagnetic field at the current position, if one is known.
    pub fn geomagnetic_field(&self) -> Option<GeomagneticField> {
        self.corrector.lock().field()
    }
}

impl std::fmt::Debug for OrientationTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrientationTracker")
            .field("settings", &self.settings)
            .field("tracking", &*self.tracking.lock())
            .field("snapshot", &*self.snapshot.read())
            .finish_non_exhaustive()
    }
}
