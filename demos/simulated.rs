//! Heads-up compass running against a simulated headset
//!
//! A sensor thread plays back a slow head turn while walking through central
//! London. The compass renders into a console surface that prints a text
//! strip every few frames.
//!
//! Run with: `RUST_LOG=heads_up_compass=debug cargo run --example simulated`

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use heads_up_compass::{
    CompassFrame, CompassParts, CompassSettings, CompassSurface, DirectionMark, GeoPosition,
    HeadsUpCompass, InMemoryLandmarks, LocationRequest, PointOfInterest, Result, SensorAccuracy,
    SensorKind, SensorPlatform, Viewport,
};
use nalgebra::{UnitQuaternion, Vector3};
use tracing::info;
use tracing_subscriber::EnvFilter;

const STRIP_COLUMNS: usize = 72;

fn wall_clock_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Platform that accepts every subscription and remembers a fix from ten
/// minutes ago.
struct SimulatedPlatform {
    subscribed: AtomicBool,
}

impl SensorPlatform for SimulatedPlatform {
    fn subscribe_sensor(&self, kind: SensorKind) -> Result<()> {
        info!(?kind, "sensor subscribed");
        self.subscribed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn unsubscribe_sensors(&self) {
        self.subscribed.store(false, Ordering::SeqCst);
    }

    fn subscribe_location(&self, request: LocationRequest) -> Result<()> {
        info!(?request, "location subscribed");
        Ok(())
    }

    fn unsubscribe_location(&self) {}

    fn last_known_position(&self) -> Option<GeoPosition> {
        Some(GeoPosition::new(
            51.5007,
            -0.1246,
            15.0,
            wall_clock_millis() - 10 * 60 * 1000,
        ))
    }

    fn now_millis(&self) -> i64 {
        wall_clock_millis()
    }
}

/// Prints every tenth frame as a row of text.
struct ConsoleSurface {
    frames: u64,
}

impl CompassSurface for ConsoleSurface {
    fn acquire(&mut self) -> Result<()> {
        Ok(())
    }

    fn paint(&mut self, frame: &CompassFrame) {
        self.frames += 1;
        if self.frames % 10 != 0 {
            return;
        }

        let scale = STRIP_COLUMNS as f32 / frame.viewport.width as f32;
        let mut strip = vec![' '; STRIP_COLUMNS];
        for mark in &frame.directions {
            let column = (mark.x() * scale).round();
            if !(0.0..STRIP_COLUMNS as f32).contains(&column) {
                continue;
            }
            let column = column as usize;
            match mark {
                DirectionMark::Label { text, .. } => {
                    for (offset, ch) in text.chars().enumerate() {
                        if let Some(cell) = strip.get_mut(column + offset) {
                            *cell = ch;
                        }
                    }
                }
                DirectionMark::Tick { .. } => strip[column] = '|',
            }
        }

        let heading = frame
            .heading
            .map_or_else(|| "---".to_string(), |h| format!("{:5.1}", h));
        let labels: Vec<&str> = frame.labels.iter().map(|l| l.text.as_str()).collect();
        println!("[{}] {}° {:?}", strip.iter().collect::<String>(), heading, labels);
        if let Some(tip) = frame.tip {
            println!("    tip: {}", tip.message());
        }
    }

    fn present(&mut self) -> Result<()> {
        Ok(())
    }
}

fn london_landmarks() -> Vec<PointOfInterest> {
    vec![
        PointOfInterest::new(51.5033, -0.1196, "London Eye", "Observation wheel"),
        PointOfInterest::new(51.5081, -0.0759, "Tower of London", "Castle"),
        PointOfInterest::new(51.5014, -0.1419, "Buckingham Palace", "Royal residence"),
        PointOfInterest::new(51.5138, -0.0984, "St Paul's Cathedral", "Cathedral"),
        PointOfInterest::new(51.5194, -0.1270, "British Museum", "Museum"),
        PointOfInterest::new(51.5080, -0.1281, "Trafalgar Square", "Square"),
        PointOfInterest::new(51.4826, -0.0077, "Royal Observatory", "Prime meridian"),
        PointOfInterest::new(51.7520, -1.2577, "Oxford", "Out of range"),
    ]
}

/// Rotation vector for an upright head facing `heading` degrees east of
/// magnetic north, tilted down by `pitch` degrees.
fn head_pose(heading: f32, pitch: f32) -> [f32; 4] {
    let upright = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f32::consts::FRAC_PI_2);
    let tilt = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), -pitch.to_radians());
    let yaw = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), -heading.to_radians());
    let q = yaw * upright * tilt;
    [q.i, q.j, q.k, q.w]
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_thread_names(true)
        .init();

    let platform = Arc::new(SimulatedPlatform {
        subscribed: AtomicBool::new(false),
    });
    let parts = CompassParts::new(
        Arc::clone(&platform) as Arc<dyn SensorPlatform>,
        Arc::new(InMemoryLandmarks::new(london_landmarks())),
    );
    let compass = HeadsUpCompass::with_settings(CompassSettings::default(), parts)?;

    let viewport = Viewport::new(640, 360);
    compass.surface_created(Box::new(ConsoleSurface { frames: 0 }), viewport)?;
    info!(
        nearby = compass.nearby().len(),
        field = ?compass.tracker().geomagnetic_field(),
        "compass running"
    );

    // Sensor playback: one full turn over six seconds, with a look down and
    // a burst of interference on the way round.
    let tracker = Arc::clone(compass.tracker());
    let feeder = thread::Builder::new()
        .name("simulated-sensors".into())
        .spawn(move || {
            for step in 0..300u32 {
                let t = step as f32 * 0.02;
                let heading = t * 60.0;
                let pitch = if (3.0..3.6).contains(&t) { 75.0 } else { 0.0 };

                if step == 100 {
                    tracker.on_magnetic_accuracy(SensorAccuracy::Low);
                }
                if step == 140 {
                    tracker.on_magnetic_accuracy(SensorAccuracy::High);
                }
                if step == 200 {
                    tracker.on_location(GeoPosition::new(51.5055, -0.0754, 10.0, wall_clock_millis()));
                }

                tracker.on_rotation_vector(&head_pose(heading, pitch));
                thread::sleep(Duration::from_millis(20));
            }
        })?;

    if feeder.join().is_err() {
        eprintln!("sensor playback panicked");
    }

    if let Some(point) = compass.facing_point() {
        info!(name = %point.name, detail = %point.detail, "facing");
    }

    compass.surface_destroyed()?;
    info!(
        stats = ?compass.frame_stats(),
        sensors_subscribed = platform.subscribed.load(Ordering::SeqCst),
        "compass stopped"
    );
    Ok(())
}
