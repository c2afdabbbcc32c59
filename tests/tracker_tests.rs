use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use heads_up_compass::{
    CompassError, FixedDeclination, GeoPosition, LocationRequest, OrientationListener,
    OrientationSample, OrientationTracker, Result, SensorAccuracy, SensorKind, SensorPlatform,
    TrackerSettings,
};
use nalgebra::{UnitQuaternion, Vector3};
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;

const NOW: i64 = 1_700_000_000_000;
const MINUTE: i64 = 60_000;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Sensor(SensorKind),
    UnsubscribeSensors,
    Location(LocationRequest),
    UnsubscribeLocation,
}

#[derive(Default)]
struct MockPlatform {
    calls: Mutex<Vec<Call>>,
    missing: Vec<SensorKind>,
    last_known: Option<GeoPosition>,
    location_refused: bool,
}

impl MockPlatform {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }
}

impl SensorPlatform for MockPlatform {
    fn subscribe_sensor(&self, kind: SensorKind) -> Result<()> {
        if self.missing.contains(&kind) {
            return Err(CompassError::SensorUnavailable(kind));
        }
        self.calls.lock().push(Call::Sensor(kind));
        Ok(())
    }

    fn unsubscribe_sensors(&self) {
        self.calls.lock().push(Call::UnsubscribeSensors);
    }

    fn subscribe_location(&self, request: LocationRequest) -> Result<()> {
        if self.location_refused {
            return Err(CompassError::LocationUnavailable("permission denied".into()));
        }
        self.calls.lock().push(Call::Location(request));
        Ok(())
    }

    fn unsubscribe_location(&self) {
        self.calls.lock().push(Call::UnsubscribeLocation);
    }

    fn last_known_position(&self) -> Option<GeoPosition> {
        self.last_known
    }

    fn now_millis(&self) -> i64 {
        NOW
    }
}

#[derive(Default)]
struct CountingListener {
    orientation: AtomicUsize,
    location: AtomicUsize,
    accuracy: AtomicUsize,
}

impl OrientationListener for CountingListener {
    fn on_orientation_changed(&self, _sample: &OrientationSample) {
        self.orientation.fetch_add(1, Ordering::SeqCst);
    }

    fn on_location_changed(&self, _position: &GeoPosition) {
        self.location.fetch_add(1, Ordering::SeqCst);
    }

    fn on_accuracy_changed(&self, _sample: &OrientationSample) {
        self.accuracy.fetch_add(1, Ordering::SeqCst);
    }
}

fn tracker_on(platform: Arc<MockPlatform>) -> OrientationTracker {
    OrientationTracker::with_model(platform, Box::new(FixedDeclination(0.0)))
}

/// Rotation vector of an upright display facing `heading` degrees east of
/// magnetic north.
fn facing(heading: f32) -> [f32; 4] {
    let upright = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f32::consts::FRAC_PI_2);
    let yaw = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), -heading.to_radians());
    let q = yaw * upright;
    [q.i, q.j, q.k, q.w]
}

fn fix_aged(age_millis: i64) -> GeoPosition {
    GeoPosition::new(51.5, -0.12, 20.0, NOW - age_millis)
}

#[test]
fn test_start_subscribes_everything_once() {
    let platform = Arc::new(MockPlatform::default());
    let tracker = tracker_on(Arc::clone(&platform));

    tracker.start();
    tracker.start();
    assert!(tracker.is_tracking());

    assert_eq!(
        platform.calls(),
        vec![
            Call::Sensor(SensorKind::RotationVector),
            Call::Sensor(SensorKind::MagneticField),
            Call::Location(LocationRequest {
                min_distance_meters: 2.0,
                min_interval: Duration::from_secs(3),
            }),
        ]
    );
}

#[test]
fn test_stop_is_idempotent() {
    let platform = Arc::new(MockPlatform::default());
    let tracker = tracker_on(Arc::clone(&platform));

    // Stopping before starting touches nothing.
    tracker.stop();
    assert!(platform.calls().is_empty());

    tracker.start();
    tracker.stop();
    tracker.stop();
    assert!(!tracker.is_tracking());

    let calls = platform.calls();
    let unsubscribes = calls
        .iter()
        .filter(|call| matches!(call, Call::UnsubscribeSensors))
        .count();
    assert_eq!(unsubscribes, 1);
    assert_eq!(calls.last(), Some(&Call::UnsubscribeLocation));
}

#[test]
fn test_missing_sensor_degrades_gracefully() {
    let platform = Arc::new(MockPlatform {
        missing: vec![SensorKind::MagneticField],
        ..Default::default()
    });
    let tracker = tracker_on(Arc::clone(&platform));

    tracker.start();
    assert!(tracker.is_tracking());
    assert!(!platform.calls().contains(&Call::Sensor(SensorKind::MagneticField)));

    tracker.on_rotation_vector(&facing(90.0));
    assert!((tracker.heading() - 84.0).abs() < 1e-3);
    assert!(!tracker.has_interference());
}

#[test]
fn test_refused_location_keeps_tracking() {
    let platform = Arc::new(MockPlatform {
        location_refused: true,
        ..Default::default()
    });
    let tracker = tracker_on(Arc::clone(&platform));

    tracker.start();
    assert!(tracker.is_tracking());
    let calls = platform.calls();
    assert!(calls.contains(&Call::Sensor(SensorKind::RotationVector)));
    assert!(calls.contains(&Call::Sensor(SensorKind::MagneticField)));
    assert!(!calls.iter().any(|call| matches!(call, Call::Location(_))));

    tracker.on_rotation_vector(&facing(90.0));
    assert!((tracker.heading() - 84.0).abs() < 1e-3);
    assert!(!tracker.has_location());

    // A fix delivered some other way is still taken.
    tracker.on_location(fix_aged(0));
    assert!(tracker.has_location());
}

#[test]
fn test_fresh_last_known_fix_seeds_position() {
    let fix = fix_aged(5 * MINUTE);
    let platform = Arc::new(MockPlatform {
        last_known: Some(fix),
        ..Default::default()
    });
    let tracker = tracker_on(platform);
    let listener = Arc::new(CountingListener::default());
    tracker.add_listener(listener.clone());

    assert!(!tracker.has_location());
    tracker.start();
    assert_eq!(tracker.position(), Some(fix));
    assert!(tracker.geomagnetic_field().is_some());
    // Seeding is silent.
    assert_eq!(listener.location.load(Ordering::SeqCst), 0);
}

#[test]
fn test_stale_last_known_fix_ignored() {
    let platform = Arc::new(MockPlatform {
        last_known: Some(fix_aged(31 * MINUTE)),
        ..Default::default()
    });
    let tracker = tracker_on(platform);

    tracker.start();
    assert!(!tracker.has_location());
    assert!(tracker.geomagnetic_field().is_none());
}

#[test]
fn test_future_last_known_fix_accepted() {
    let fix = fix_aged(-2 * MINUTE);
    let platform = Arc::new(MockPlatform {
        last_known: Some(fix),
        ..Default::default()
    });
    let tracker = tracker_on(platform);

    tracker.start();
    assert_eq!(tracker.position(), Some(fix));
}

#[test]
fn test_custom_location_request() {
    let platform = Arc::new(MockPlatform::default());
    let tracker = OrientationTracker::with_settings(
        Arc::clone(&platform) as Arc<dyn SensorPlatform>,
        TrackerSettings {
            location_min_distance_meters: 10.0,
            location_min_interval: Duration::from_secs(30),
            ..Default::default()
        },
        Box::new(FixedDeclination(0.0)),
    )
    .unwrap();

    tracker.start();
    assert!(platform.calls().contains(&Call::Location(LocationRequest {
        min_distance_meters: 10.0,
        min_interval: Duration::from_secs(30),
    })));
}

#[test]
fn test_one_callback_per_sample() {
    let tracker = tracker_on(Arc::new(MockPlatform::default()));
    let listener = Arc::new(CountingListener::default());
    tracker.add_listener(listener.clone());

    for heading in [0.0, 45.0, 90.0] {
        tracker.on_rotation_vector(&facing(heading));
    }
    tracker.on_magnetic_accuracy(SensorAccuracy::Low);
    tracker.on_magnetic_accuracy(SensorAccuracy::High);
    tracker.on_location(fix_aged(0));

    assert_eq!(listener.orientation.load(Ordering::SeqCst), 3);
    assert_eq!(listener.accuracy.load(Ordering::SeqCst), 2);
    assert_eq!(listener.location.load(Ordering::SeqCst), 1);
}

#[test]
fn test_duplicate_and_removed_listeners() {
    let tracker = tracker_on(Arc::new(MockPlatform::default()));
    let listener = Arc::new(CountingListener::default());
    let as_dyn: Arc<dyn OrientationListener> = listener.clone();

    tracker.add_listener(Arc::clone(&as_dyn));
    tracker.add_listener(Arc::clone(&as_dyn));
    tracker.on_rotation_vector(&facing(10.0));
    assert_eq!(listener.orientation.load(Ordering::SeqCst), 1);

    tracker.remove_listener(&as_dyn);
    tracker.on_rotation_vector(&facing(20.0));
    assert_eq!(listener.orientation.load(Ordering::SeqCst), 1);
}

#[test]
fn test_interference_flag_follows_accuracy() {
    let tracker = tracker_on(Arc::new(MockPlatform::default()));
    tracker.on_rotation_vector(&facing(200.0));
    let heading = tracker.heading();

    tracker.on_magnetic_accuracy(SensorAccuracy::Unreliable);
    assert!(tracker.has_interference());
    assert_eq!(tracker.heading(), heading);

    // The flag survives later rotation samples.
    tracker.on_rotation_vector(&facing(210.0));
    assert!(tracker.has_interference());

    tracker.on_magnetic_accuracy(SensorAccuracy::High);
    assert!(!tracker.has_interference());
}

#[test]
fn test_values_readable_after_stop() {
    let tracker = tracker_on(Arc::new(MockPlatform::default()));
    tracker.start();
    tracker.on_location(fix_aged(0));
    tracker.on_rotation_vector(&facing(135.0));
    let before = tracker.snapshot();

    tracker.stop();
    assert_eq!(tracker.snapshot(), before);
    assert!((tracker.heading() - 129.0).abs() < 1e-3);
}

#[test]
fn test_pitch_sign() {
    let tracker = tracker_on(Arc::new(MockPlatform::default()));
    let upright = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f32::consts::FRAC_PI_2);

    // Tilting the top of the display back looks up.
    let tilt = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), 30f32.to_radians());
    let q = upright * tilt;
    tracker.on_rotation_vector(&[q.i, q.j, q.k, q.w]);
    assert!((tracker.pitch() + 30.0).abs() < 1e-2, "pitch {}", tracker.pitch());
}

/// Readers on other threads only ever see whole, in-range snapshots.
#[test]
fn test_concurrent_reads_stay_in_range() {
    let tracker = Arc::new(tracker_on(Arc::new(MockPlatform::default())));
    let done = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let tracker = Arc::clone(&tracker);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut reads = 0u64;
                while !done.load(Ordering::SeqCst) {
                    let sample = tracker.sample();
                    assert!((0.0..360.0).contains(&sample.heading), "{:?}", sample);
                    assert!((-90.0..=90.0).contains(&sample.pitch), "{:?}", sample);
                    reads += 1;
                }
                reads
            })
        })
        .collect();

    let mut rng = Pcg64::seed_from_u64(99);
    for _ in 0..5_000 {
        let axis = Vector3::new(
            rng.random_range(-1.0f32..1.0),
            rng.random_range(-1.0f32..1.0),
            rng.random_range(-1.0f32..1.0),
        );
        let angle = rng.random_range(-std::f32::consts::PI..std::f32::consts::PI);
        let q = match nalgebra::Unit::try_new(axis, 1e-3) {
            Some(axis) => UnitQuaternion::from_axis_angle(&axis, angle),
            None => UnitQuaternion::identity(),
        };
        tracker.on_rotation_vector(&[q.i, q.j, q.k, q.w]);
    }
    done.store(true, Ordering::SeqCst);

    for reader in readers {
        reader.join().unwrap();
    }
}
