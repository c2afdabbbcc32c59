//! Collision-free placement of landmark labels on the compass strip
//!
//! The strip maps heading onto screen x: `pixels_per_degree` comes from the
//! viewport width and the degrees visible across it, and the strip is
//! translated so the displayed heading sits at the viewport center. Labels
//! start one row above the bottom of the viewport and climb one row at a time
//! until they stop overlapping the labels already placed this frame. A label
//! that still collides after [`PlacerSettings::max_overlapping_labels`] rows is
//! dropped for the frame.
//!
//! Because the strip is circular, each point is placed three times, one full
//! turn to the left, at its bearing, and one full turn to the right, so a
//! point near north shows up whichever side of the seam the viewport is on.
//! All three passes share one collision set.

use tracing::trace;

use crate::geo::{bearing_and_distance, label_text};
use crate::math::FULL_CIRCLE;
use crate::types::{GeoPosition, PlacedLabel, PlacerSettings, PointOfInterest, Rect, Viewport};

/// Compass point abbreviations, clockwise from north.
pub const DIRECTION_ABBREVIATIONS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// Full-turn offsets of the three placement passes.
const WRAP_PASSES: [f32; 3] = [-1.0, 0.0, 1.0];

/// Extra direction marks drawn beyond each end of the strip.
const EXTRA_DIRECTION_MARKS: i32 = 2;

/// Measures rendered text.
pub trait TextMetrics: Send + Sync {
    /// Bounding box of `text`. Only the size is used.
    fn text_bounds(&self, text: &str) -> Rect;
}

impl<T: TextMetrics + ?Sized> TextMetrics for Box<T> {
    fn text_bounds(&self, text: &str) -> Rect {
        (**self).text_bounds(text)
    }
}

/// Fixed-pitch text measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonospaceMetrics {
    pub char_width: i32,
    pub height: i32,
}

impl Default for MonospaceMetrics {
    fn default() -> Self {
        Self {
            char_width: 11,
            height: 22,
        }
    }
}

impl TextMetrics for MonospaceMetrics {
    fn text_bounds(&self, text: &str) -> Rect {
        Rect::from_size(self.char_width * text.chars().count() as i32, self.height)
    }
}

/// Result of one placement pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Placement {
    /// Accepted labels in placement order.
    pub labels: Vec<PlacedLabel>,
    /// Label copies that found no free row.
    pub dropped: usize,
}

impl Placement {
    /// Labels with any part inside the viewport.
    pub fn visible<'a>(&'a self, viewport: &'a Viewport) -> impl Iterator<Item = &'a PlacedLabel> {
        self.labels
            .iter()
            .filter(move |label| viewport.overlaps(&label.bounds))
    }
}

/// One entry of the direction strip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DirectionMark {
    /// Abbreviation centered on `x`.
    Label { text: &'static str, x: f32 },
    /// Short vertical tick at `x`.
    Tick { x: f32 },
}

impl DirectionMark {
    pub fn x(&self) -> f32 {
        match *self {
            DirectionMark::Label { x, .. } | DirectionMark::Tick { x } => x,
        }
    }
}

struct Candidate<'a> {
    bearing: f32,
    distance: f64,
    text: String,
    point: &'a PointOfInterest,
}

/// Projects points of interest onto the strip and stacks their labels
///
/// # Example
/// ```
/// use heads_up_compass::{GeoPosition, LabelPlacer, MonospaceMetrics, PointOfInterest, Viewport};
///
/// let placer = LabelPlacer::new(MonospaceMetrics::default());
/// let here = GeoPosition::new(0.0, 0.0, 0.0, 0);
/// let points = vec![
///     PointOfInterest::new(0.010, 0.0, "Lighthouse", ""),
///     PointOfInterest::new(0.020, 0.0, "Harbour", ""),
/// ];
///
/// // Both points lie due north, so the farther label climbs one row.
/// let placement = placer.place(0.0, Viewport::new(640, 360), Some(&here), &points);
/// let viewport = Viewport::new(640, 360);
/// let visible: Vec<_> = placement.visible(&viewport).collect();
/// assert_eq!(visible.len(), 2);
/// assert!(visible[1].bounds.top < visible[0].bounds.top);
/// ```
pub struct LabelPlacer<M = MonospaceMetrics> {
    settings: PlacerSettings,
    metrics: M,
}

impl<M: TextMetrics> LabelPlacer<M> {
    pub fn new(metrics: M) -> Self {
        Self::with_settings(PlacerSettings::default(), metrics)
    }

    pub fn with_settings(settings: PlacerSettings, metrics: M) -> Self {
        Self { settings, metrics }
    }

    pub fn settings(&self) -> &PlacerSettings {
        &self.settings
    }

    pub fn metrics(&self) -> &M {
        &self.metrics
    }

    /// Screen x of `degrees` on the strip when `heading` is centered.
    pub fn project(&self, heading: f32, degrees: f32, viewport: &Viewport) -> f32 {
        let pixels_per_degree = viewport.pixels_per_degree(self.settings.degrees_visible);
        (degrees - heading) * pixels_per_degree + viewport.center_x()
    }

    /// Places labels for `points` around `heading`.
    ///
    /// Points are taken nearest first; points at equal distance keep their
    /// input order. Without a position nothing is placed.
    pub fn place(
        &self,
        heading: f32,
        viewport: Viewport,
        position: Option<&GeoPosition>,
        points: &[PointOfInterest],
    ) -> Placement {
        let Some(observer) = position else {
            return Placement::default();
        };

        let mut candidates: Vec<Candidate<'_>> = points
            .iter()
            .map(|point| {
                let (bearing, distance) = bearing_and_distance(observer, point);
                Candidate {
                    bearing: bearing as f32,
                    distance,
                    text: label_text(&point.name, distance),
                    point,
                }
            })
            .collect();
        candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        let anchor_top = viewport.height - self.settings.text_height;
        let mut placement = Placement::default();
        let mut occupied: Vec<Rect> = Vec::new();

        for turns in WRAP_PASSES {
            for candidate in &candidates {
                let anchor_x =
                    self.project(heading, candidate.bearing + turns * FULL_CIRCLE, &viewport);

                match self.find_row(&candidate.text, anchor_x, anchor_top, &occupied) {
                    Some(bounds) => {
                        occupied.push(bounds);
                        placement.labels.push(PlacedLabel {
                            bearing_degrees: candidate.bearing,
                            bounds,
                            text: candidate.text.clone(),
                            anchor_x,
                        });
                    }
                    None => {
                        trace!(name = %candidate.point.name, turns, "label dropped, no free row");
                        placement.dropped += 1;
                    }
                }
            }
        }

        placement
    }

    /// Collision box for `text` in the lowest free row, if one of the allowed
    /// rows is free.
    fn find_row(&self, text: &str, anchor_x: f32, anchor_top: i32, occupied: &[Rect]) -> Option<Rect> {
        let settings = &self.settings;
        let mut bounds = self.metrics.text_bounds(text);
        let text_left = anchor_x + (settings.pin_width / 2 + settings.text_margin) as f32;
        bounds.offset_to(text_left.floor() as i32, anchor_top);

        // Pad for the pin on the left and a margin on the right.
        bounds.left -= settings.pin_width + settings.text_margin;
        bounds.right += settings.text_margin;

        for _ in 0..settings.max_overlapping_labels {
            bounds.offset(0, -settings.row_step());
            if !occupied.iter().any(|existing| existing.intersects(&bounds)) {
                return Some(bounds);
            }
        }
        None
    }

    /// Direction labels and ticks around `heading`, including two extra
    /// marks past each end of the circle.
    pub fn direction_marks(&self, heading: f32, viewport: &Viewport) -> Vec<DirectionMark> {
        let count = DIRECTION_ABBREVIATIONS.len() as i32;
        let degrees_per_mark = FULL_CIRCLE / count as f32;

        (-EXTRA_DIRECTION_MARKS..=count + EXTRA_DIRECTION_MARKS)
            .map(|i| {
                let x = self.project(heading, i as f32 * degrees_per_mark, viewport);
                if i.rem_euclid(2) == 0 {
                    DirectionMark::Label {
                        text: DIRECTION_ABBREVIATIONS[i.rem_euclid(count) as usize],
                        x,
                    }
                } else {
                    DirectionMark::Tick { x }
                }
            })
            .collect()
    }
}

impl Default for LabelPlacer<MonospaceMetrics> {
    fn default() -> Self {
        Self::new(MonospaceMetrics::default())
    }
}

impl<M: std::fmt::Debug> std::fmt::Debug for LabelPlacer<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelPlacer")
            .field("settings", &self.settings)
            .field("metrics", &self.metrics)
            .finish()
    }
}
