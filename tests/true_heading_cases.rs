use heads_up_compass::{
    FixedDeclination, GeoPosition, LocationRequest, OrientationTracker, Result, SensorKind,
    SensorPlatform, TrackerSettings, shortest_arc, true_heading,
};
use nalgebra::{UnitQuaternion, Vector3};
use serde::Deserialize;
use std::error::Error;
use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct HeadingCase {
    #[serde(rename = "Magnetic heading (deg)")]
    magnetic: f32,
    #[serde(rename = "Declination (deg)")]
    declination: f32,
    #[serde(rename = "Arm offset (deg)")]
    arm_offset: f32,
    #[serde(rename = "True heading (deg)")]
    expected: f32,
}

fn load_cases() -> std::result::Result<Vec<HeadingCase>, Box<dyn Error>> {
    let mut reader = csv::Reader::from_path("testdata/true_heading_cases.csv")?;
    let mut cases = Vec::new();
    for result in reader.deserialize() {
        cases.push(result?);
    }
    Ok(cases)
}

struct Headless;

impl SensorPlatform for Headless {
    fn subscribe_sensor(&self, _kind: SensorKind) -> Result<()> {
        Ok(())
    }
    fn unsubscribe_sensors(&self) {}
    fn subscribe_location(&self, _request: LocationRequest) -> Result<()> {
        Ok(())
    }
    fn unsubscribe_location(&self) {}
    fn last_known_position(&self) -> Option<GeoPosition> {
        None
    }
    fn now_millis(&self) -> i64 {
        0
    }
}

/// Rotation vector of an upright display facing `heading` degrees east of
/// magnetic north.
fn facing(heading: f32) -> [f32; 4] {
    let upright = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), FRAC_PI_2);
    let yaw = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), -heading.to_radians());
    let q = yaw * upright;
    [q.i, q.j, q.k, q.w]
}

/// The correction arithmetic is exact for the reference values.
#[test]
fn test_reference_cases_exact() -> std::result::Result<(), Box<dyn Error>> {
    let cases = load_cases()?;
    assert!(cases.len() >= 10);

    for case in &cases {
        let actual = true_heading(case.magnetic, case.declination, case.arm_offset);
        assert_eq!(actual, case.expected, "{:?}", case);
        assert!((0.0..360.0).contains(&actual));
    }
    Ok(())
}

/// The tracker applies the same correction to headings read from rotation
/// samples once a position is known.
#[test]
fn test_tracker_matches_reference_cases() -> std::result::Result<(), Box<dyn Error>> {
    for case in load_cases()? {
        let tracker = OrientationTracker::with_settings(
            Arc::new(Headless),
            TrackerSettings {
                arm_offset_degrees: case.arm_offset,
                ..Default::default()
            },
            Box::new(FixedDeclination(case.declination)),
        )?;
        tracker.on_location(GeoPosition::new(48.0, 11.0, 500.0, 0));
        tracker.on_rotation_vector(&facing(case.magnetic));

        let error = shortest_arc(tracker.heading(), case.expected);
        assert!(error < 1e-3, "{:?}: got {}", case, tracker.heading());
        assert!(tracker.pitch().abs() < 1e-3);
    }
    Ok(())
}
