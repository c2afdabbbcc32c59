//! Angle arithmetic and nalgebra extensions for the heads-up compass

use nalgebra::{Matrix3, Quaternion, UnitQuaternion};

/// Mathematical constants
pub const DEG_TO_RAD: f32 = core::f32::consts::PI / 180.0;
pub const RAD_TO_DEG: f32 = 180.0 / core::f32::consts::PI;

/// Full circle in degrees.
pub const FULL_CIRCLE: f32 = 360.0;

/// Wraps an angle into [0, 360).
///
/// Idempotent on its own output. `NaN` passes through unchanged.
///
/// # Example
/// ```
/// use heads_up_compass::normalize_degrees;
///
/// assert_eq!(normalize_degrees(370.0), 10.0);
/// assert_eq!(normalize_degrees(-10.0), 350.0);
/// assert_eq!(normalize_degrees(360.0), 0.0);
/// ```
pub fn normalize_degrees(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(FULL_CIRCLE);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= FULL_CIRCLE { 0.0 } else { wrapped }
}

/// Length of the shortest arc between two headings, in [0, 180].
///
/// # Example
/// ```
/// use heads_up_compass::shortest_arc;
///
/// assert_eq!(shortest_arc(350.0, 10.0), 20.0);
/// assert_eq!(shortest_arc(100.0, 200.0), 100.0);
/// ```
pub fn shortest_arc(from: f32, to: f32) -> f32 {
    let distance = (normalize_degrees(to) - normalize_degrees(from)).abs();
    distance.min(FULL_CIRCLE - distance)
}

/// Signed difference `to - from` folded into (-180, 180].
///
/// # Example
/// ```
/// use heads_up_compass::signed_difference;
///
/// assert_eq!(signed_difference(350.0, 10.0), 20.0);
/// assert_eq!(signed_difference(10.0, 350.0), -20.0);
/// ```
pub fn signed_difference(from: f32, to: f32) -> f32 {
    let difference = normalize_degrees(to - from);
    if difference > FULL_CIRCLE / 2.0 {
        difference - FULL_CIRCLE
    } else {
        difference
    }
}

/// Extension trait for building and reading orientation quaternions
pub trait QuaternionExt {
    /// Builds an orientation from a rotation-vector sample.
    ///
    /// `values` holds the vector part `[x, y, z]` and optionally the scalar
    /// part as a fourth element. When the scalar part is missing it is
    /// recovered from the unit-norm constraint. Returns `None` when fewer
    /// than three values are supplied or the quaternion is degenerate.
    fn from_rotation_sample(values: &[f32]) -> Option<UnitQuaternion<f32>>;
}

impl QuaternionExt for UnitQuaternion<f32> {
    fn from_rotation_sample(values: &[f32]) -> Option<UnitQuaternion<f32>> {
        let (x, y, z) = match values {
            [x, y, z, ..] => (*x, *y, *z),
            _ => return None,
        };

        let w = match values.get(3) {
            Some(w) => *w,
            None => {
                let remainder = 1.0 - x * x - y * y - z * z;
                if remainder > 0.0 { remainder.sqrt() } else { 0.0 }
            }
        };

        UnitQuaternion::try_new(Quaternion::new(w, x, y, z), f32::EPSILON)
    }
}

/// Yaw (azimuth), pitch and roll in radians from a world-aligned rotation
/// matrix.
///
/// Azimuth is measured clockwise from the Y axis; pitch comes from an
/// `asin` so it always lies in [-π/2, π/2].
pub fn orientation_angles(rotation: &Matrix3<f32>) -> (f32, f32, f32) {
    let azimuth = rotation[(0, 1)].atan2(rotation[(1, 1)]);
    let pitch = (-rotation[(2, 1)]).clamp(-1.0, 1.0).asin();
    let roll = (-rotation[(2, 0)]).atan2(rotation[(2, 2)]);
    (azimuth, pitch, roll)
}
