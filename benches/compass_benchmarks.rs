use criterion::{Criterion, black_box, criterion_group, criterion_main};
use heads_up_compass::{
    FixedDeclination, GeoPosition, HeadingAnimator, LabelPlacer, LocationRequest, MainField,
    OrientationTracker, PointOfInterest, Result, SensorKind, SensorPlatform, Viewport,
    declination::DeclinationModel,
};
use nalgebra::{UnitQuaternion, Vector3};
use rand::prelude::*;
use rand_pcg::Pcg64;
use std::sync::Arc;

const VIEWPORT: Viewport = Viewport {
    width: 640,
    height: 360,
};

struct Headless;

impl SensorPlatform for Headless {
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

fn observer() -> GeoPosition {
    GeoPosition::new(47.6062, -122.3321, 50.0, 0)
}

// Landmarks scattered within about 8 km of the observer
fn scattered_points(count: usize, seed: u64) -> Vec<PointOfInterest> {
    let mut rng = Pcg64::seed_from_u64(seed);
    let here = observer();
    (0..count)
        .map(|i| {
            PointOfInterest::new(
                here.latitude + rng.random_range(-0.07..0.07),
                here.longitude + rng.random_range(-0.1..0.1),
                format!("Landmark {}", i),
                "",
            )
        })
        .collect()
}

// Rotation samples from a head sweeping left and right
fn head_sweep(count: usize, seed: u64) -> Vec<[f32; 4]> {
    let mut rng = Pcg64::seed_from_u64(seed);
    let upright = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), std::f32::consts::FRAC_PI_2);
    (0..count)
        .map(|i| {
            let yaw = (i as f32 * 0.05).sin() * 1.2 + rng.random_range(-0.02..0.02);
            let q = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), yaw) * upright;
            [q.i, q.j, q.k, q.w]
        })
        .collect()
}

/// Benchmark label placement with a handful of landmarks
fn bench_place_few(c: &mut Criterion) {
    let placer = LabelPlacer::default();
    let points = scattered_points(10, 1);
    let here = observer();

    c.bench_function("place_10_landmarks", |b| {
        b.iter(|| placer.place(black_box(42.0), VIEWPORT, Some(&here), black_box(&points)))
    });
}

/// Benchmark label placement in a dense city center
fn bench_place_dense(c: &mut Criterion) {
    let placer = LabelPlacer::default();
    let points = scattered_points(100, 2);
    let here = observer();

    c.bench_function("place_100_landmarks", |b| {
        b.iter(|| placer.place(black_box(42.0), VIEWPORT, Some(&here), black_box(&points)))
    });
}

/// Benchmark the direction strip
fn bench_direction_marks(c: &mut Criterion) {
    let placer = LabelPlacer::default();

    c.bench_function("direction_marks", |b| {
        b.iter(|| placer.direction_marks(black_box(271.0), &VIEWPORT))
    });
}

/// Benchmark one frame's worth of animator reads while a sweep runs
fn bench_animator(c: &mut Criterion) {
    let animator = HeadingAnimator::new();
    let mut now = 0u64;
    let mut target = 0.0f32;

    c.bench_function("animator_set_and_read", |b| {
        b.iter(|| {
            now += 22;
            target = (target + 37.0) % 360.0;
            animator.set_target(black_box(target), now);
            black_box(animator.displayed_heading(now))
        })
    });
}

/// Benchmark rotation sample handling, remap to true heading
fn bench_rotation_sample(c: &mut Criterion) {
    let tracker = OrientationTracker::with_model(Arc::new(Headless), Box::new(FixedDeclination(15.0)));
    let samples = head_sweep(1000, 3);
    let mut index = 0;

    c.bench_function("tracker_rotation_sample", |b| {
        b.iter(|| {
            tracker.on_rotation_vector(black_box(&samples[index]));
            index = (index + 1) % samples.len();
        })
    });
}

/// Benchmark the main-field declination evaluation
fn bench_main_field(c: &mut Criterion) {
    let model = MainField::default();
    let here = observer();

    c.bench_function("main_field_at", |b| b.iter(|| model.field_at(black_box(&here))));
}

criterion_group!(
    benches,
    bench_place_few,
    bench_place_dense,
    bench_direction_marks,
    bench_animator,
    bench_rotation_sample,
    bench_main_field
);

criterion_main!(benches);
