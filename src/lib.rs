//! Heads-up compass core - a true-north compass strip with landmark labels
//!
//! This library turns rotation-vector samples, magnetic accuracy reports and
//! location fixes from a head-mounted device into a stable true-north heading,
//! animates that heading for display, and lays out nearby points of interest
//! as non-overlapping labels around a horizontally scrolling compass strip,
//! repainted at a fixed frame rate on its own thread.
//!
//! # Features
//!
//! - Rotation-vector fusion with device axis remapping and yaw/pitch extraction
//! - True-north correction from the IGRF-13 main-field model
//! - Snap-or-animate heading display that always sweeps the short way round
//! - Label placement with bounded vertical stacking and seam wraparound
//! - Fixed-rate render loop with edge-triggered start/stop and frame counters
//! - Pluggable sensor platform, landmark provider, text metrics and surface
//!
//! # Quick Start
//!
//! ```rust
//! use heads_up_compass::{
//!     GeoPosition, HeadingAnimator, LabelPlacer, MonospaceMetrics, PointOfInterest, Viewport,
//!     true_heading,
//! };
//!
//! // Magnetic heading 350, declination +12.5, sensor arm offset 6.
//! let heading = true_heading(350.0, 12.5, 6.0);
//! assert_eq!(heading, 356.5);
//!
//! // Smooth the displayed heading.
//! let animator = HeadingAnimator::new();
//! animator.set_target(heading, 0);
//! let displayed = animator.displayed_heading(0).unwrap();
//!
//! // Lay out labels for what is nearby.
//! let here = GeoPosition::new(37.7749, -122.4194, 0.0, 0);
//! let places = vec![PointOfInterest::new(37.8199, -122.4783, "Golden Gate Bridge", "")];
//! let placer = LabelPlacer::new(MonospaceMetrics::default());
//! let viewport = Viewport::new(640, 360);
//! let placement = placer.place(displayed, viewport, Some(&here), &places);
//! for label in placement.visible(&viewport) {
//!     println!("{} at x={}", label.text, label.anchor_x);
//! }
//! ```
//!
//! For a full pipeline with a simulated sensor platform, see `demos/simulated.rs`.

mod animator;
pub mod axes;
mod clock;
mod compass;
pub mod declination;
mod error;
pub mod geo;
mod landmarks;
mod math;
mod placer;
mod render;
mod tracker;
mod types;

// Re-export all public types and functions
pub use animator::HeadingAnimator;
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use compass::{CompassFrame, CompassParts, CompassSurface, HeadsUpCompass, Tip, Transition};
pub use declination::{
    DeclinationModel, FixedDeclination, GeomagneticCorrector, GeomagneticField, MainField,
    true_heading,
};
pub use error::{CompassError, Result};
pub use landmarks::{InMemoryLandmarks, LandmarkProvider};
pub use math::{
    DEG_TO_RAD, FULL_CIRCLE, QuaternionExt, RAD_TO_DEG, normalize_degrees, orientation_angles,
    shortest_arc, signed_difference,
};
pub use placer::{
    DIRECTION_ABBREVIATIONS, DirectionMark, LabelPlacer, MonospaceMetrics, Placement, TextMetrics,
};
pub use render::{FrameCounts, FrameStats, RenderGate, RenderLoop, Repaint};
pub use tracker::{OrientationListener, OrientationTracker, SensorPlatform, TrackerSnapshot};
pub use types::*;
