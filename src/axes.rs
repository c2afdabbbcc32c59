//! Rotation-matrix axis remapping for different mounting orientations
//!
//! A rotation sensor reports orientation in the device frame. Before yaw and
//! pitch can be read off, the rotation matrix has to be re-expressed in the
//! frame the wearer actually looks along. For a head-mounted display the
//! wearer looks along the device's negative Z axis, so the device X axis is
//! kept and the device Z axis takes the place of Y.
//!
//! # Example
//! ```
//! use nalgebra::Matrix3;
//! use heads_up_compass::axes::{Axis, remap_coordinate_system};
//!
//! // Device X east, device Y up, device Z pointing south (back at the wearer).
//! let looking_north = Matrix3::new(
//!     1.0, 0.0, 0.0,
//!     0.0, 0.0, -1.0,
//!     0.0, 1.0, 0.0,
//! );
//!
//! let remapped = remap_coordinate_system(&looking_north, Axis::X, Axis::Z).unwrap();
//! assert_eq!(remapped, Matrix3::identity());
//! ```

use nalgebra::Matrix3;

use crate::error::{CompassError, Result};

/// A signed device axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Axis {
    #[default]
    X,
    Y,
    Z,
    MinusX,
    MinusY,
    MinusZ,
}

impl Axis {
    /// Column index of the axis, ignoring sign.
    pub fn index(self) -> usize {
        match self {
            Axis::X | Axis::MinusX => 0,
            Axis::Y | Axis::MinusY => 1,
            Axis::Z | Axis::MinusZ => 2,
        }
    }

    /// `1.0` for positive axes, `-1.0` for negated ones.
    pub fn sign(self) -> f32 {
        match self {
            Axis::X | Axis::Y | Axis::Z => 1.0,
            Axis::MinusX | Axis::MinusY | Axis::MinusZ => -1.0,
        }
    }
}

/// Re-expresses a rotation matrix so that the original X axis maps onto
/// device axis `x` and the original Y axis maps onto device axis `y`.
///
/// The remaining axis is chosen so the result stays a proper rotation
/// (right-handed, determinant +1).
///
/// # Errors
/// [`CompassError::DegenerateAxes`] when `x` and `y` name the same device
/// axis, regardless of sign.
pub fn remap_coordinate_system(
    rotation: &Matrix3<f32>,
    x: Axis,
    y: Axis,
) -> Result<Matrix3<f32>> {
    if x.index() == y.index() {
        return Err(CompassError::DegenerateAxes { x, y });
    }

    let z_index = 3 - x.index() - y.index();

    let mut mapping = Matrix3::zeros();
    mapping[(0, x.index())] = x.sign();
    mapping[(1, y.index())] = y.sign();
    mapping[(2, z_index)] = 1.0;

    // Flip the derived axis if the mapping would mirror the frame.
    if mapping.determinant() < 0.0 {
        mapping[(2, z_index)] = -1.0;
    }

    Ok(rotation * mapping)
}
