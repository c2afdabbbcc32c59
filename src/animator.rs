//! Snap-or-animate policy for the displayed heading
//!
//! Fusion updates arrive irregularly and occasionally jump by tens of degrees
//! when the magnetometer recalibrates. [`HeadingAnimator`] keeps a separate
//! displayed heading that snaps through small changes and sweeps linearly
//! through large ones, always the short way round the circle.
//!
//! A running sweep is never retargeted. When it finishes, the animator
//! re-evaluates against the latest target it has seen, which lets it catch up
//! with a head that kept turning.
//!
//! # Example
//! ```
//! use heads_up_compass::HeadingAnimator;
//!
//! let animator = HeadingAnimator::new();
//!
//! // The first target always snaps.
//! animator.set_target(350.0, 0);
//! assert_eq!(animator.displayed_heading(0), Some(350.0));
//!
//! // A 20 degree jump across north sweeps forward through 360.
//! animator.set_target(10.0, 100);
//! assert_eq!(animator.state().goal_heading, 370.0);
//! assert_eq!(animator.displayed_heading(225), Some(0.0));
//! assert_eq!(animator.displayed_heading(350), Some(10.0));
//! ```

use parking_lot::Mutex;
use tracing::trace;

use crate::math::{FULL_CIRCLE, normalize_degrees};
use crate::types::{AnimationState, AnimatorSettings};

#[derive(Debug, Default)]
struct Inner {
    target: Option<f32>,
    state: AnimationState,
}

/// Smooths the heading shown on screen
///
/// Safe to share between the sensor callback thread, which sets targets, and
/// the render thread, which reads the displayed heading. Every call sees and
/// leaves a whole [`AnimationState`].
#[derive(Debug)]
pub struct HeadingAnimator {
    settings: AnimatorSettings,
    inner: Mutex<Inner>,
}

impl HeadingAnimator {
    pub fn new() -> Self {
        Self::with_settings(AnimatorSettings::default())
    }

    pub fn with_settings(settings: AnimatorSettings) -> Self {
        Self {
            settings,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn settings(&self) -> &AnimatorSettings {
        &self.settings
    }

    /// Records a new target heading at clock reading `now_millis`.
    ///
    /// Starts a snap or a sweep when idle; while a sweep is running the
    /// target is only remembered for when it finishes.
    pub fn set_target(&self, heading: f32, now_millis: u64) {
        let target = normalize_degrees(heading);
        let mut inner = self.inner.lock();
        inner.target = Some(target);
        self.advance(&mut inner, now_millis);
        if !inner.state.running {
            self.animate_to(&mut inner.state, target, now_millis);
        }
    }

    /// Heading to draw at `now_millis`, in [0, 360). `None` until the first
    /// target arrives.
    pub fn displayed_heading(&self, now_millis: u64) -> Option<f32> {
        let mut inner = self.inner.lock();
        self.advance(&mut inner, now_millis);
        inner.state.displayed_heading
    }

    /// Latest target heading.
    pub fn target(&self) -> Option<f32> {
        self.inner.lock().target
    }

    pub fn state(&self) -> AnimationState {
        self.inner.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().state.running
    }

    /// Moves a running sweep forward to `now_millis`. A sweep that has
    /// ended is finished at its end time and the latest target is
    /// re-evaluated from there, as often as needed to catch up.
    fn advance(&self, inner: &mut Inner, now_millis: u64) {
        let target = inner.target;
        let state = &mut inner.state;

        while state.running {
            let end_millis = state.start_time_millis + state.duration_millis;
            if now_millis < end_millis {
                let elapsed = now_millis.saturating_sub(state.start_time_millis);
                let fraction = elapsed as f32 / state.duration_millis as f32;
                let heading =
                    state.start_heading + (state.goal_heading - state.start_heading) * fraction;
                state.displayed_heading = Some(normalize_degrees(heading));
                return;
            }

            state.displayed_heading = Some(normalize_degrees(state.goal_heading));
            state.running = false;
            trace!(heading = ?state.displayed_heading, end_millis, "heading sweep finished");

            if let Some(target) = target {
                self.animate_to(state, target, end_millis);
            }
        }
    }

    fn animate_to(&self, state: &mut AnimationState, end: f32, now_millis: u64) {
        if state.running {
            return;
        }

        let Some(start) = state.displayed_heading else {
            state.displayed_heading = Some(end);
            return;
        };

        let distance = (end - start).abs();
        let reverse_distance = FULL_CIRCLE - distance;
        let shortest = distance.min(reverse_distance);

        let duration_millis = self.settings.duration.as_millis() as u64;
        if shortest < self.settings.min_distance_to_animate || duration_millis == 0 {
            state.displayed_heading = Some(end);
            return;
        }

        let goal = if distance < reverse_distance {
            end
        } else if end < start {
            end + FULL_CIRCLE
        } else {
            end - FULL_CIRCLE
        };

        *state = AnimationState {
            displayed_heading: Some(start),
            running: true,
            start_heading: start,
            goal_heading: goal,
            start_time_millis: now_millis,
            duration_millis,
        };
        trace!(start, goal, "heading sweep started");
    }
}

impl Default for HeadingAnimator {
    fn default() -> Self {
        Self::new()
    }
}
