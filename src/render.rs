//! Fixed-rate render loop
//!
//! [`RenderLoop`] owns one background thread that calls a [`Repaint`] hook,
//! then sleeps off whatever is left of the frame budget. A frame that runs
//! long shortens the next sleep to zero; there is no catch-up and no frame
//! skipping. The sleep waits on the stop channel, so a stop request is seen
//! within one frame.
//!
//! Whether the loop should run at all is decided by [`RenderGate`]: a
//! surface must exist and rendering must not be paused.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::types::RenderSettings;

/// Draws one frame. Returns `false` when the frame was skipped.
pub trait Repaint: Send + Sync + 'static {
    fn repaint(&self) -> bool;
}

impl<F> Repaint for F
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    fn repaint(&self) -> bool {
        self()
    }
}

/// Surface and pause state that decides whether frames are drawn
///
/// # Example
/// ```
/// use heads_up_compass::RenderGate;
///
/// let mut gate = RenderGate::default();
/// assert!(!gate.should_render());
///
/// gate.surface_available = true;
/// assert!(gate.should_render());
///
/// gate.paused = true;
/// assert!(!gate.should_render());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderGate {
    pub surface_available: bool,
    pub paused: bool,
}

impl RenderGate {
    pub fn should_render(&self) -> bool {
        self.surface_available && !self.paused
    }
}

/// Frame counters, updated by the render thread.
#[derive(Debug, Default)]
pub struct FrameStats {
    drawn: AtomicU64,
    skipped: AtomicU64,
    overruns: AtomicU64,
}

/// Point-in-time copy of [`FrameStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCounts {
    /// Frames the hook reported as drawn.
    pub drawn: u64,
    /// Frames the hook skipped, e.g. because the surface was gone.
    pub skipped: u64,
    /// Frames that took longer than the budget.
    pub overruns: u64,
}

impl FrameStats {
    pub fn snapshot(&self) -> FrameCounts {
        FrameCounts {
            drawn: self.drawn.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
        }
    }

    fn record(&self, drawn: bool, overrun: bool) {
        let counter = if drawn { &self.drawn } else { &self.skipped };
        counter.fetch_add(1, Ordering::Relaxed);
        if overrun {
            self.overruns.fetch_add(1, Ordering::Relaxed);
        }
    }
}

struct Worker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

/// Drives a [`Repaint`] hook at a steady cadence on its own thread
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::time::Duration;
/// use heads_up_compass::{RenderLoop, RenderSettings};
///
/// let frames = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&frames);
///
/// let mut render_loop = RenderLoop::new(RenderSettings { frames_per_second: 100 });
/// render_loop
///     .start(Arc::new(move || {
///         counter.fetch_add(1, Ordering::SeqCst);
///         true
///     }))
///     .unwrap();
/// std::thread::sleep(Duration::from_millis(50));
/// render_loop.stop();
///
/// assert!(frames.load(Ordering::SeqCst) > 0);
/// ```
pub struct RenderLoop {
    settings: RenderSettings,
    stats: Arc<FrameStats>,
    worker: Option<Worker>,
}

impl RenderLoop {
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            settings,
            stats: Arc::new(FrameStats::default()),
            worker: None,
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    pub fn stats(&self) -> FrameCounts {
        self.stats.snapshot()
    }

    /// Spawns the render thread. Returns `Ok(false)` if it is already running.
    ///
    /// # Errors
    /// [`CompassError::RenderThread`](crate::CompassError::RenderThread) when
    /// the thread cannot be spawned.
    pub fn start(&mut self, hook: Arc<dyn Repaint>) -> Result<bool> {
        if self.worker.is_some() {
            return Ok(false);
        }

        let (stop, stop_rx) = mpsc::channel();
        let budget = self.settings.frame_budget();
        let stats = Arc::clone(&self.stats);

        let handle = thread::Builder::new()
            .name("compass-render".into())
            .spawn(move || run(hook.as_ref(), budget, &stats, &stop_rx))?;

        self.worker = Some(Worker { stop, handle });
        debug!(budget_micros = budget.as_micros() as u64, "render loop started");
        Ok(true)
    }

    /// Asks the render thread to exit and waits for it. Returns `false` if
    /// it was not running.
    ///
    /// Must not be called while holding a lock the hook takes.
    pub fn stop(&mut self) -> bool {
        let Some(worker) = self.worker.take() else {
            return false;
        };
        // A closed channel also stops the loop, so a failed send is fine.
        let _ = worker.stop.send(());
        if worker.handle.join().is_err() {
            warn!("render thread panicked");
        }
        debug!(stats = ?self.stats.snapshot(), "render loop stopped");
        true
    }
}

impl Drop for RenderLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for RenderLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderLoop")
            .field("settings", &self.settings)
            .field("running", &self.is_running())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

fn run(
    hook: &dyn Repaint,
    budget: Duration,
    stats: &FrameStats,
    stop: &mpsc::Receiver<()>,
) {
    loop {
        match stop.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => {}
        }

        let frame_start = Instant::now();
        let drawn = hook.repaint();
        let elapsed = frame_start.elapsed();

        let overrun = elapsed > budget;
        stats.record(drawn, overrun);
        if overrun {
            trace!(elapsed_micros = elapsed.as_micros() as u64, "frame over budget");
            continue;
        }

        match stop.recv_timeout(budget - elapsed) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_start_and_stop_are_idempotent() {
        let mut render_loop = RenderLoop::new(RenderSettings::default());
        assert!(!render_loop.stop());

        assert!(render_loop.start(Arc::new(|| true)).unwrap());
        assert!(!render_loop.start(Arc::new(|| true)).unwrap());
        assert!(render_loop.is_running());

        assert!(render_loop.stop());
        assert!(!render_loop.stop());
        assert!(!render_loop.is_running());
    }

    #[test]
    fn test_skipped_frames_are_counted() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut render_loop = RenderLoop::new(RenderSettings {
            frames_per_second: 200,
        });
        render_loop
            .start(Arc::new(move || counter.fetch_add(1, Ordering::SeqCst) % 2 == 0))
            .unwrap();
        thread::sleep(Duration::from_millis(60));
        render_loop.stop();

        let counts = render_loop.stats();
        let total = calls.load(Ordering::SeqCst) as u64;
        assert!(total >= 2);
        assert_eq!(counts.drawn + counts.skipped, total);
        assert!(counts.skipped > 0);
    }

    #[test]
    fn test_drop_joins_thread() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        {
            let mut render_loop = RenderLoop::new(RenderSettings::default());
            render_loop
                .start(Arc::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    true
                }))
                .unwrap();
            thread::sleep(Duration::from_millis(10));
        }
        let after_drop = calls.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(calls.load(Ordering::SeqCst), after_drop);
    }
}
