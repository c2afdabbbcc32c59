//! Error type for the heads-up compass core
//!
//! Nothing in this crate is fatal to the process. Errors surface from the
//! external collaborators (sensor platform, presentation surface) and are
//! logged by the caller, which then degrades gracefully: a sensor that cannot
//! be subscribed leaves its input missing, a surface that cannot be acquired
//! skips one frame.

use thiserror::Error;

use crate::types::SensorKind;

/// Errors reported by the compass core and its external collaborators.
#[derive(Debug, Error)]
pub enum CompassError {
    /// The platform has no sensor of the requested kind.
    #[error("sensor unavailable: {0:?}")]
    SensorUnavailable(SensorKind),

    /// The platform refused the location subscription.
    #[error("location updates unavailable: {0}")]
    LocationUnavailable(String),

    /// The drawing surface could not be acquired for this frame.
    #[error("surface acquire failed: {0}")]
    SurfaceAcquire(String),

    /// The drawing surface could not present the finished frame.
    #[error("surface present failed: {0}")]
    SurfacePresent(String),

    /// An axis remap named the same device axis twice.
    #[error("degenerate axis remap: {x:?} and {y:?} share a device axis")]
    DegenerateAxes {
        x: crate::axes::Axis,
        y: crate::axes::Axis,
    },

    /// The render thread could not be spawned.
    #[error("failed to spawn render thread: {0}")]
    RenderThread(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CompassError>;
