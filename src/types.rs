//! Core types and settings for the heads-up compass

use std::time::Duration;

use crate::axes::Axis;

/// Sensor streams the tracker subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    /// Fused rotation vector (a unit quaternion in the device frame).
    RotationVector,
    /// Raw magnetic field. Observed only for its accuracy reports.
    MagneticField,
}

/// Accuracy reported by a sensor stream
///
/// Ordered from least to most trustworthy so that thresholds can be written
/// as comparisons.
///
/// # Example
/// ```
/// use heads_up_compass::SensorAccuracy;
///
/// assert!(SensorAccuracy::Medium < SensorAccuracy::High);
/// assert!(SensorAccuracy::Low.indicates_interference());
/// assert!(!SensorAccuracy::High.indicates_interference());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SensorAccuracy {
    /// The sensor cannot be trusted at all.
    Unreliable,
    /// Low accuracy; calibration is needed.
    Low,
    /// Average accuracy; calibration would help.
    Medium,
    /// Maximum accuracy.
    High,
}

impl SensorAccuracy {
    /// Whether this accuracy level means the magnetic field is disturbed.
    pub fn indicates_interference(self) -> bool {
        self < SensorAccuracy::High
    }
}

/// Fused orientation snapshot
///
/// Produced by the [`OrientationTracker`](crate::OrientationTracker) on every
/// rotation sample and on every accuracy change. Values are copied out; the
/// snapshot is never mutated in place.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OrientationSample {
    /// Heading relative to true north, degrees in [0, 360).
    pub heading: f32,
    /// Forward/backward tilt, degrees in [-90, 90].
    pub pitch: f32,
    /// Whether the magnetic field sensor reports less than high accuracy.
    pub has_interference: bool,
}

impl OrientationSample {
    /// Whether the head is tilted beyond `threshold` degrees in either
    /// direction, at which point heading readings are unreliable.
    pub fn is_too_steep(&self, threshold: f32) -> bool {
        self.pitch.abs() > threshold
    }
}

/// Geographic fix from the location platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPosition {
    /// Latitude in degrees, positive north.
    pub latitude: f64,
    /// Longitude in degrees, positive east.
    pub longitude: f64,
    /// Altitude above the WGS84 ellipsoid in meters.
    pub altitude: f64,
    /// Wall-clock time of the fix in milliseconds since the Unix epoch.
    pub timestamp_millis: i64,
}

impl GeoPosition {
    pub fn new(latitude: f64, longitude: f64, altitude: f64, timestamp_millis: i64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
            timestamp_millis,
        }
    }

    /// Age of the fix relative to `now_millis`. Fixes stamped in the future
    /// report a negative age.
    pub fn age_millis(&self, now_millis: i64) -> i64 {
        now_millis - self.timestamp_millis
    }
}

/// A named place that can be labelled on the compass strip.
#[derive(Debug, Clone, PartialEq)]
pub struct PointOfInterest {
    pub latitude: f64,
    pub longitude: f64,
    pub name: String,
    pub detail: String,
}

impl PointOfInterest {
    pub fn new(
        latitude: f64,
        longitude: f64,
        name: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            latitude,
            longitude,
            name: name.into(),
            detail: detail.into(),
        }
    }
}

/// Integer pixel rectangle, half-open on the right and bottom edges
///
/// # Example
/// ```
/// use heads_up_compass::Rect;
///
/// let a = Rect::new(0, 0, 10, 10);
/// let b = Rect::new(10, 0, 20, 10); // touching edges do not intersect
/// assert!(!a.intersects(&b));
/// assert!(a.intersects(&Rect::new(9, 9, 12, 12)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Rectangle of the given size with its top-left corner at the origin.
    pub fn from_size(width: i32, height: i32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Translate by `(dx, dy)`.
    pub fn offset(&mut self, dx: i32, dy: i32) {
        self.left += dx;
        self.right += dx;
        self.top += dy;
        self.bottom += dy;
    }

    /// Move the top-left corner to `(left, top)`, keeping the size.
    pub fn offset_to(&mut self, left: i32, top: i32) {
        self.offset(left - self.left, top - self.top);
    }

    /// Strict overlap test; rectangles that only share an edge do not
    /// intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }
}

/// Drawable size of the presentation surface in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: i32,
    pub height: i32,
}

impl Viewport {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Horizontal scale when `degrees_visible` of the strip span the full
    /// width.
    pub fn pixels_per_degree(&self, degrees_visible: f32) -> f32 {
        self.width as f32 / degrees_visible
    }

    pub fn center_x(&self) -> f32 {
        self.width as f32 / 2.0
    }

    pub fn center_y(&self) -> f32 {
        self.height as f32 / 2.0
    }

    /// Whether any part of `bounds` falls inside the viewport.
    pub fn overlaps(&self, bounds: &Rect) -> bool {
        bounds.intersects(&Rect::from_size(self.width, self.height))
    }
}

/// A label that survived the placement pass for one frame.
///
/// `bounds` is the collision box in screen pixels: the measured text extended
/// on the left by the pin glyph plus margin and on the right by the margin.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLabel {
    /// Bearing from the observer to the point, degrees in [0, 360).
    pub bearing_degrees: f32,
    /// Collision box in screen pixels.
    pub bounds: Rect,
    /// Display text, `"{name} ({distance} km)"`.
    pub text: String,
    /// Screen x coordinate of the bearing itself (the pin's center).
    pub anchor_x: f32,
}

impl PlacedLabel {
    /// Top-left corner of the pin glyph, centered on the bearing.
    pub fn pin_origin(&self, settings: &PlacerSettings) -> (f32, i32) {
        (
            self.anchor_x - settings.pin_width as f32 / 2.0,
            self.bounds.top + 2,
        )
    }

    /// Left end of the text baseline, right of the pin.
    pub fn text_origin(&self, settings: &PlacerSettings) -> (f32, i32) {
        (
            self.anchor_x + settings.pin_width as f32 / 2.0 + settings.text_margin as f32,
            self.bounds.top + settings.text_height,
        )
    }
}

/// Snapshot of the heading animator's internal state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationState {
    /// Heading currently on screen; `None` until the first target arrives.
    pub displayed_heading: Option<f32>,
    /// Whether an interpolation is in flight.
    pub running: bool,
    /// Heading the running interpolation started from.
    pub start_heading: f32,
    /// Unnormalized goal of the running interpolation; may lie outside
    /// [0, 360) so the sweep takes the short way round.
    pub goal_heading: f32,
    /// Clock reading when the interpolation started.
    pub start_time_millis: u64,
    /// Length of the interpolation.
    pub duration_millis: u64,
}

impl Default for AnimationState {
    fn default() -> Self {
        Self {
            displayed_heading: None,
            running: false,
            start_heading: 0.0,
            goal_heading: 0.0,
            start_time_millis: 0,
            duration_millis: 0,
        }
    }
}

/// Filter passed to the location platform when subscribing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationRequest {
    /// Minimum movement before a new fix is delivered.
    pub min_distance_meters: f32,
    /// Minimum time between fixes.
    pub min_interval: Duration,
}

/// Orientation tracker settings
///
/// # Example
/// ```
/// use heads_up_compass::TrackerSettings;
///
/// let settings = TrackerSettings {
///     arm_offset_degrees: 0.0, // sensor mounted square to the face
///     ..Default::default()
/// };
/// assert_eq!(settings.location_min_distance_meters, 2.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerSettings {
    /// Mechanical mounting correction subtracted from every heading.
    ///
    /// The sensors sit in a movable arm whose rotation displaces the reading
    /// by anywhere from 0 to about 12 degrees; the default splits the
    /// difference.
    pub arm_offset_degrees: f32,
    /// Minimum movement between location updates, meters.
    pub location_min_distance_meters: f32,
    /// Minimum time between location updates.
    pub location_min_interval: Duration,
    /// Oldest last-known fix accepted when tracking starts.
    pub max_last_known_age: Duration,
    /// Device axis that becomes the world-aligned X axis.
    pub remap_x: Axis,
    /// Device axis that becomes the world-aligned Y axis.
    pub remap_y: Axis,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            arm_offset_degrees: 6.0,
            location_min_distance_meters: 2.0,
            location_min_interval: Duration::from_secs(3),
            max_last_known_age: Duration::from_secs(30 * 60),
            remap_x: Axis::X,
            remap_y: Axis::Z,
        }
    }
}

impl TrackerSettings {
    /// Location filter derived from these settings.
    pub fn location_request(&self) -> LocationRequest {
        LocationRequest {
            min_distance_meters: self.location_min_distance_meters,
            min_interval: self.location_min_interval,
        }
    }
}

/// Heading animator settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimatorSettings {
    /// Headings closer than this (along the shortest arc) snap instead of
    /// animating.
    pub min_distance_to_animate: f32,
    /// Length of one linear interpolation.
    pub duration: Duration,
}

impl Default for AnimatorSettings {
    fn default() -> Self {
        Self {
            min_distance_to_animate: 15.0,
            duration: Duration::from_millis(250),
        }
    }
}

/// Label placement settings
///
/// All lengths are in pixels. The defaults match a 640×360 display showing
/// 90 degrees of the strip across its width.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacerSettings {
    /// Degrees of heading visible across the viewport width.
    pub degrees_visible: f32,
    /// Height of one label row.
    pub text_height: i32,
    /// Width of the pin glyph drawn left of each label.
    pub pin_width: i32,
    /// Vertical gap between stacked rows.
    pub text_leading: i32,
    /// Gap between pin and text, and padding right of the text.
    pub text_margin: i32,
    /// Rows tried before a label is dropped for the frame.
    pub max_overlapping_labels: u32,
}

impl Default for PlacerSettings {
    fn default() -> Self {
        Self {
            degrees_visible: 90.0,
            text_height: 22,
            pin_width: 14,
            text_leading: 4,
            text_margin: 8,
            max_overlapping_labels: 4,
        }
    }
}

impl PlacerSettings {
    /// Vertical distance between two stacked label rows.
    pub fn row_step(&self) -> i32 {
        self.text_height + self.text_leading
    }
}

/// Render loop settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    /// Target refresh rate.
    pub frames_per_second: u32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            frames_per_second: 45,
        }
    }
}

impl RenderSettings {
    /// Time available for one frame.
    ///
    /// ```
    /// use heads_up_compass::RenderSettings;
    ///
    /// let budget = RenderSettings::default().frame_budget();
    /// assert_eq!(budget.as_micros(), 22_222);
    /// ```
    pub fn frame_budget(&self) -> Duration {
        Duration::from_secs(1) / self.frames_per_second.max(1)
    }
}

/// Top-level settings for [`HeadsUpCompass`](crate::HeadsUpCompass).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompassSettings {
    pub tracker: TrackerSettings,
    pub animator: AnimatorSettings,
    pub placer: PlacerSettings,
    pub render: RenderSettings,
    /// Absolute pitch beyond which the display warns that the head is tilted
    /// too far for a reliable heading.
    pub too_steep_pitch_degrees: f32,
}

impl Default for CompassSettings {
    fn default() -> Self {
        Self {
            tracker: TrackerSettings::default(),
            animator: AnimatorSettings::default(),
            placer: PlacerSettings::default(),
            render: RenderSettings::default(),
            too_steep_pitch_degrees: 70.0,
        }
    }
}
