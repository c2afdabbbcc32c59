//! Heads-up compass: tracker, animator, placer and render loop wired together
//!
//! [`HeadsUpCompass`] follows the lifecycle of a presentation surface. While a
//! surface exists and rendering is not paused, the orientation tracker is
//! subscribed and the render loop repaints at a fixed rate; otherwise both are
//! stopped. Transitions are edge-triggered: each lifecycle call compares the
//! wanted state with the running state and acts only on a change.
//!
//! Drawing happens under a single surface mutex. Acquire, paint and present
//! for one frame run inside it, and surface teardown waits for the render
//! thread before releasing the surface, so a frame never races teardown.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::animator::HeadingAnimator;
use crate::clock::{Clock, MonotonicClock};
use crate::declination::{DeclinationModel, MainField};
use crate::error::Result;
use crate::geo::facing_point;
use crate::landmarks::LandmarkProvider;
use crate::placer::{DirectionMark, LabelPlacer, MonospaceMetrics, TextMetrics};
use crate::render::{FrameCounts, RenderGate, RenderLoop};
use crate::tracker::{OrientationListener, OrientationTracker, SensorPlatform};
use crate::types::{
    CompassSettings, GeoPosition, OrientationSample, PlacedLabel, PointOfInterest, Viewport,
};

/// Drawable target for compass frames
///
/// Any method may fail once the underlying surface has been invalidated;
/// failures skip the frame.
pub trait CompassSurface: Send {
    /// Locks the surface for drawing.
    fn acquire(&mut self) -> Result<()>;
    /// Draws a composed frame onto the acquired surface.
    fn paint(&mut self, frame: &CompassFrame);
    /// Unlocks the surface and shows the frame.
    fn present(&mut self) -> Result<()>;
}

/// Message shown over the compass when the heading cannot be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tip {
    MagneticInterference,
    PitchTooSteep,
}

impl Tip {
    pub fn message(self) -> &'static str {
        match self {
            Tip::MagneticInterference => "Magnetic interference: move away from metal objects",
            Tip::PitchTooSteep => "Hold your head level for an accurate heading",
        }
    }
}

/// Everything the surface needs to paint one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CompassFrame {
    pub viewport: Viewport,
    /// Displayed heading; `None` until the first orientation sample.
    pub heading: Option<f32>,
    pub has_interference: bool,
    pub pitch_too_steep: bool,
    /// At most one tip; interference outranks pitch.
    pub tip: Option<Tip>,
    /// Labels that overlap the viewport.
    pub labels: Vec<PlacedLabel>,
    pub directions: Vec<DirectionMark>,
}

/// Replaceable parts of a [`HeadsUpCompass`].
pub struct CompassParts {
    pub platform: Arc<dyn SensorPlatform>,
    pub landmarks: Arc<dyn LandmarkProvider>,
    pub declination: Box<dyn DeclinationModel>,
    pub metrics: Box<dyn TextMetrics>,
    pub clock: Arc<dyn Clock>,
}

impl CompassParts {
    /// Parts with the built-in field model, monospace metrics and a
    /// monotonic clock.
    pub fn new(platform: Arc<dyn SensorPlatform>, landmarks: Arc<dyn LandmarkProvider>) -> Self {
        Self {
            platform,
            landmarks,
            declination: Box::new(MainField::default()),
            metrics: Box::new(MonospaceMetrics::default()),
            clock: Arc::new(MonotonicClock::new()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct TipFlags {
    too_steep: bool,
    interference: bool,
}

impl TipFlags {
    fn tip(self) -> Option<Tip> {
        if self.interference {
            Some(Tip::MagneticInterference)
        } else if self.too_steep {
            Some(Tip::PitchTooSteep)
        } else {
            None
        }
    }
}

struct SurfaceSlot {
    surface: Box<dyn CompassSurface>,
    viewport: Viewport,
}

/// State reachable from both the sensor callbacks and the render thread.
struct Shared {
    settings: CompassSettings,
    tracker: Arc<OrientationTracker>,
    animator: HeadingAnimator,
    placer: LabelPlacer<Box<dyn TextMetrics>>,
    landmarks: Arc<dyn LandmarkProvider>,
    clock: Arc<dyn Clock>,
    nearby: RwLock<Arc<Vec<PointOfInterest>>>,
    tips: Mutex<TipFlags>,
    surface: Mutex<Option<SurfaceSlot>>,
}

impl Shared {
    fn refresh_nearby(&self, position: &GeoPosition) {
        let places = self.landmarks.nearby(position.latitude, position.longitude);
        debug!(count = places.len(), "nearby landmarks refreshed");
        *self.nearby.write() = Arc::new(places);
    }

    fn compose(&self, viewport: Viewport) -> CompassFrame {
        let heading = self.animator.displayed_heading(self.clock.now_millis());
        let position = self.tracker.position();
        let flags = *self.tips.lock();

        let (labels, directions) = match heading {
            Some(heading) => {
                let nearby = Arc::clone(&self.nearby.read());
                let placement = self
                    .placer
                    .place(heading, viewport, position.as_ref(), &nearby);
                (
                    placement.visible(&viewport).cloned().collect(),
                    self.placer.direction_marks(heading, &viewport),
                )
            }
            None => (Vec::new(), Vec::new()),
        };

        CompassFrame {
            viewport,
            heading,
            has_interference: flags.interference,
            pitch_too_steep: flags.too_steep,
            tip: flags.tip(),
            labels,
            directions,
        }
    }

    /// Acquires, paints and presents one frame. Returns `false` when the
    /// frame was skipped.
    fn repaint(&self) -> bool {
        let mut slot = self.surface.lock();
        let Some(slot) = slot.as_mut() else {
            debug!("no surface, skipping frame");
            return false;
        };

        if let Err(error) = slot.surface.acquire() {
            debug!(error = %error, "surface acquire failed, skipping frame");
            return false;
        }

        let frame = self.compose(slot.viewport);
        slot.surface.paint(&frame);

        if let Err(error) = slot.surface.present() {
            warn!(error = %error, "surface present failed, frame dropped");
            return false;
        }
        true
    }
}

impl OrientationListener for Shared {
    fn on_orientation_changed(&self, sample: &OrientationSample) {
        self.animator
            .set_target(sample.heading, self.clock.now_millis());

        let too_steep = sample.is_too_steep(self.settings.too_steep_pitch_degrees);
        let mut flags = self.tips.lock();
        if flags.too_steep != too_steep {
            flags.too_steep = too_steep;
            debug!(too_steep, pitch = sample.pitch, tip = ?flags.tip(), "pitch warning changed");
        }
    }

    fn on_location_changed(&self, position: &GeoPosition) {
        self.refresh_nearby(position);
    }

    fn on_accuracy_changed(&self, sample: &OrientationSample) {
        let mut flags = self.tips.lock();
        flags.interference = sample.has_interference;
        debug!(interference = sample.has_interference, tip = ?flags.tip(), "accuracy changed");
    }
}

struct Lifecycle {
    gate: RenderGate,
    render_loop: RenderLoop,
}

/// Outcome of a lifecycle call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Started,
    Stopped,
    Unchanged,
}

/// Heads-up compass core
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use heads_up_compass::{
///     CompassFrame, CompassParts, CompassSurface, GeoPosition, HeadsUpCompass, InMemoryLandmarks,
///     LocationRequest, Result, SensorKind, SensorPlatform, Transition, Viewport,
/// };
///
/// struct Headless;
///
/// impl SensorPlatform for Headless {
///     fn subscribe_sensor(&self, _kind: SensorKind) -> Result<()> { Ok(()) }
///     fn unsubscribe_sensors(&self) {}
///     fn subscribe_location(&self, _request: LocationRequest) -> Result<()> { Ok(()) }
///     fn unsubscribe_location(&self) {}
///     fn last_known_position(&self) -> Option<GeoPosition> { None }
///     fn now_millis(&self) -> i64 { 0 }
/// }
///
/// struct Blank;
///
/// impl CompassSurface for Blank {
///     fn acquire(&mut self) -> Result<()> { Ok(()) }
///     fn paint(&mut self, _frame: &CompassFrame) {}
///     fn present(&mut self) -> Result<()> { Ok(()) }
/// }
///
/// let compass = HeadsUpCompass::new(CompassParts::new(
///     Arc::new(Headless),
///     Arc::new(InMemoryLandmarks::default()),
/// ));
///
/// let started = compass.surface_created(Box::new(Blank), Viewport::new(640, 360)).unwrap();
/// assert_eq!(started, Transition::Started);
/// assert!(compass.tracker().is_tracking());
///
/// assert_eq!(compass.surface_destroyed().unwrap(), Transition::Stopped);
/// assert!(!compass.tracker().is_tracking());
/// ```
pub struct HeadsUpCompass {
    shared: Arc<Shared>,
    listener: Arc<dyn OrientationListener>,
    lifecycle: Mutex<Lifecycle>,
}

impl HeadsUpCompass {
    pub fn new(parts: CompassParts) -> Self {
        let CompassParts {
            platform,
            landmarks,
            declination,
            metrics,
            clock,
        } = parts;
        let tracker = OrientationTracker::with_model(platform, declination);
        Self::assemble(CompassSettings::default(), tracker, landmarks, metrics, clock)
    }

    /// # Errors
    /// [`CompassError::DegenerateAxes`](crate::CompassError::DegenerateAxes)
    /// when the tracker settings name the same device axis twice.
    pub fn with_settings(settings: CompassSettings, parts: CompassParts) -> Result<Self> {
        let CompassParts {
            platform,
            landmarks,
            declination,
            metrics,
            clock,
        } = parts;
        let tracker = OrientationTracker::with_settings(platform, settings.tracker, declination)?;
        Ok(Self::assemble(settings, tracker, landmarks, metrics, clock))
    }

    fn assemble(
        settings: CompassSettings,
        tracker: OrientationTracker,
        landmarks: Arc<dyn LandmarkProvider>,
        metrics: Box<dyn TextMetrics>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let shared = Arc::new(Shared {
            settings,
            tracker: Arc::new(tracker),
            animator: HeadingAnimator::with_settings(settings.animator),
            placer: LabelPlacer::with_settings(settings.placer, metrics),
            landmarks,
            clock,
            nearby: RwLock::new(Arc::new(Vec::new())),
            tips: Mutex::new(TipFlags::default()),
            surface: Mutex::new(None),
        });

        let listener: Arc<dyn OrientationListener> = shared.clone();
        shared.tracker.add_listener(Arc::clone(&listener));

        Self {
            shared,
            listener,
            lifecycle: Mutex::new(Lifecycle {
                gate: RenderGate::default(),
                render_loop: RenderLoop::new(settings.render),
            }),
        }
    }

    pub fn settings(&self) -> &CompassSettings {
        &self.shared.settings
    }

    /// The tracker; sensor platforms feed samples into it.
    pub fn tracker(&self) -> &Arc<OrientationTracker> {
        &self.shared.tracker
    }

    pub fn animator(&self) -> &HeadingAnimator {
        &self.shared.animator
    }

    /// A new surface exists. Creating a surface also resumes rendering.
    pub fn surface_created(
        &self,
        surface: Box<dyn CompassSurface>,
        viewport: Viewport,
    ) -> Result<Transition> {
        *self.shared.surface.lock() = Some(SurfaceSlot { surface, viewport });

        let mut lifecycle = self.lifecycle.lock();
        lifecycle.gate.surface_available = true;
        lifecycle.gate.paused = false;
        self.update_rendering_state(&mut lifecycle)
    }

    /// The surface was resized.
    pub fn surface_changed(&self, viewport: Viewport) {
        if let Some(slot) = self.shared.surface.lock().as_mut() {
            slot.viewport = viewport;
        }
    }

    /// The surface is gone. Rendering stops before the surface is released.
    pub fn surface_destroyed(&self) -> Result<Transition> {
        let transition = {
            let mut lifecycle = self.lifecycle.lock();
            lifecycle.gate.surface_available = false;
            self.update_rendering_state(&mut lifecycle)
        };
        self.shared.surface.lock().take();
        transition
    }

    pub fn rendering_paused(&self, paused: bool) -> Result<Transition> {
        let mut lifecycle = self.lifecycle.lock();
        lifecycle.gate.paused = paused;
        self.update_rendering_state(&mut lifecycle)
    }

    pub fn is_rendering(&self) -> bool {
        self.lifecycle.lock().render_loop.is_running()
    }

    pub fn frame_stats(&self) -> FrameCounts {
        self.lifecycle.lock().render_loop.stats()
    }

    fn update_rendering_state(&self, lifecycle: &mut Lifecycle) -> Result<Transition> {
        let should_render = lifecycle.gate.should_render();
        let is_rendering = lifecycle.render_loop.is_running();
        if should_render == is_rendering {
            return Ok(Transition::Unchanged);
        }

        if should_render {
            self.shared.tracker.start();
            if let Some(position) = self.shared.tracker.position() {
                self.shared.refresh_nearby(&position);
            }

            let shared = Arc::clone(&self.shared);
            if let Err(error) = lifecycle
                .render_loop
                .start(Arc::new(move || shared.repaint()))
            {
                self.shared.tracker.stop();
                return Err(error);
            }
            debug!("rendering started");
            Ok(Transition::Started)
        } else {
            lifecycle.render_loop.stop();
            self.shared.tracker.stop();
            debug!("rendering stopped");
            Ok(Transition::Stopped)
        }
    }

    /// Paints one frame immediately, outside the render loop.
    pub fn repaint(&self) -> bool {
        self.shared.repaint()
    }

    /// Frame for the current surface size, or `None` without a surface.
    pub fn frame(&self) -> Option<CompassFrame> {
        let viewport = self.shared.surface.lock().as_ref()?.viewport;
        Some(self.shared.compose(viewport))
    }

    pub fn tip(&self) -> Option<Tip> {
        self.shared.tips.lock().tip()
    }

    /// Points of interest near the last known position.
    pub fn nearby(&self) -> Arc<Vec<PointOfInterest>> {
        Arc::clone(&self.shared.nearby.read())
    }

    /// The nearby point the wearer is facing.
    pub fn facing_point(&self) -> Option<PointOfInterest> {
        let snapshot = self.shared.tracker.snapshot();
        let position = snapshot.position?;
        let nearby = self.nearby();
        facing_point(snapshot.sample.heading, &position, &nearby).cloned()
    }
}

impl Drop for HeadsUpCompass {
    fn drop(&mut self) {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.render_loop.stop() {
            self.shared.tracker.stop();
        }
        self.shared.tracker.remove_listener(&self.listener);
    }
}

impl std::fmt::Debug for HeadsUpCompass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lifecycle = self.lifecycle.lock();
        f.debug_struct("HeadsUpCompass")
            .field("settings", &self.shared.settings)
            .field("gate", &lifecycle.gate)
            .field("render_loop", &lifecycle.render_loop)
            .field("tracker", &self.shared.tracker)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::CompassError;
    use crate::landmarks::InMemoryLandmarks;
    use crate::types::{LocationRequest, SensorAccuracy, SensorKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullPlatform;

    impl SensorPlatform for NullPlatform {
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

    #[derive(Default)]
    struct Recorder {
        frames: Arc<Mutex<Vec<CompassFrame>>>,
        fail_acquire: bool,
        presented: Arc<AtomicUsize>,
    }

    impl CompassSurface for Recorder {
        fn acquire(&mut self) -> Result<()> {
            if self.fail_acquire {
                return Err(CompassError::SurfaceAcquire("invalidated".into()));
            }
            Ok(())
        }
        fn paint(&mut self, frame: &CompassFrame) {
            self.frames.lock().push(frame.clone());
        }
        fn present(&mut self) -> Result<()> {
            self.presented.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn compass(clock: Arc<ManualClock>, places: Vec<PointOfInterest>) -> HeadsUpCompass {
        let mut parts = CompassParts::new(
            Arc::new(NullPlatform),
            Arc::new(InMemoryLandmarks::new(places)),
        );
        parts.declination = Box::new(crate::declination::FixedDeclination(0.0));
        parts.clock = clock;
        HeadsUpCompass::new(parts)
    }

    #[test]
    fn test_tip_priority() {
        let flags = TipFlags {
            too_steep: true,
            interference: true,
        };
        assert_eq!(flags.tip(), Some(Tip::MagneticInterference));
        let flags = TipFlags {
            too_steep: true,
            interference: false,
        };
        assert_eq!(flags.tip(), Some(Tip::PitchTooSteep));
        assert_eq!(TipFlags::default().tip(), None);
    }

    #[test]
    fn test_listener_drives_tips_and_animator() {
        let clock = Arc::new(ManualClock::new(0));
        let compass = compass(clock, Vec::new());
        let listener = &compass.shared;

        listener.on_orientation_changed(&OrientationSample {
            heading: 120.0,
            pitch: 75.0,
            has_interference: false,
        });
        assert_eq!(compass.tip(), Some(Tip::PitchTooSteep));
        assert_eq!(compass.animator().target(), Some(120.0));

        listener.on_accuracy_changed(&OrientationSample {
            heading: 120.0,
            pitch: 75.0,
            has_interference: true,
        });
        assert_eq!(compass.tip(), Some(Tip::MagneticInterference));

        compass.tracker().on_magnetic_accuracy(SensorAccuracy::High);
        listener.on_orientation_changed(&OrientationSample::default());
        assert_eq!(compass.tip(), None);
    }

    #[test]
    fn test_repaint_without_surface_skips() {
        let compass = compass(Arc::new(ManualClock::new(0)), Vec::new());
        assert!(!compass.repaint());
        assert!(compass.frame().is_none());
    }

    #[test]
    fn test_failed_acquire_skips_frame() {
        let compass = compass(Arc::new(ManualClock::new(0)), Vec::new());
        let surface = Recorder {
            fail_acquire: true,
            ..Default::default()
        };
        let frames = Arc::clone(&surface.frames);
        let presented = Arc::clone(&surface.presented);

        // Install the surface without starting the loop.
        *compass.shared.surface.lock() = Some(SurfaceSlot {
            surface: Box::new(surface),
            viewport: Viewport::new(640, 360),
        });
        assert!(!compass.repaint());
        assert!(frames.lock().is_empty());
        assert_eq!(presented.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_frame_carries_labels_after_location() {
        let clock = Arc::new(ManualClock::new(0));
        let compass = compass(
            clock,
            vec![PointOfInterest::new(0.01, 0.0, "Lighthouse", "Open daily")],
        );
        *compass.shared.surface.lock() = Some(SurfaceSlot {
            surface: Box::new(Recorder::default()),
            viewport: Viewport::new(640, 360),
        });

        compass.tracker().on_location(GeoPosition::new(0.0, 0.0, 0.0, 0));
        compass.shared.on_orientation_changed(&OrientationSample::default());

        let frame = compass.frame().unwrap();
        assert_eq!(frame.heading, Some(0.0));
        assert_eq!(frame.labels.len(), 1);
        assert_eq!(frame.labels[0].text, "Lighthouse (1.1 km)");
        assert!(!frame.directions.is_empty());
        assert_eq!(compass.facing_point().unwrap().detail, "Open daily");
    }

    #[test]
    fn test_lifecycle_is_edge_triggered() {
        let compass = compass(Arc::new(ManualClock::new(0)), Vec::new());

        let started = compass
            .surface_created(Box::new(Recorder::default()), Viewport::new(640, 360))
            .unwrap();
        assert_eq!(started, Transition::Started);
        assert_eq!(compass.rendering_paused(false).unwrap(), Transition::Unchanged);
        assert_eq!(compass.rendering_paused(true).unwrap(), Transition::Stopped);
        assert!(!compass.tracker().is_tracking());
        assert_eq!(compass.rendering_paused(true).unwrap(), Transition::Unchanged);
        assert_eq!(compass.rendering_paused(false).unwrap(), Transition::Started);
        assert_eq!(compass.surface_destroyed().unwrap(), Transition::Stopped);
        assert_eq!(compass.surface_destroyed().unwrap(), Transition::Unchanged);
        assert!(!compass.is_rendering());
    }
}
