//! Heading animation demonstration
//!
//! Feeds a synthetic head-turn trace through the heading animator and plots
//! the target heading from the tracker against the heading actually shown on
//! screen, together with the lag between them and the sweep flag.
//!
//! The trace includes a slow turn, a quick glance across north and a burst of
//! magnetometer noise, which exercise the snap threshold, the short-way sweep
//! and the re-evaluation after a sweep finishes.
//!
//! Run with: `cargo run --example animation_plot`

use heads_up_compass::{AnimatorSettings, HeadingAnimator, normalize_degrees, signed_difference};
use plotters::prelude::*;
use rand::prelude::*;
use rand_pcg::Pcg64;
use std::error::Error;
use std::time::Duration;

const SAMPLE_PERIOD_MS: u64 = 20; // 50 Hz sensor rate
const TRACE_SECONDS: u64 = 12;

struct TraceRow {
    time: f32,
    target: f32,
    displayed: f32,
    lag: f32,
    running: f32,
}

/// Head heading in degrees at `t` seconds, before noise.
fn head_heading(t: f32) -> f32 {
    match t {
        // Slow turn to the east
        t if t < 3.0 => 300.0 + t * 10.0,
        // Quick glance across north and back
        t if t < 4.0 => 330.0 + 60.0 * ((t - 3.0) * std::f32::consts::PI).sin(),
        // Hold still
        t if t < 7.0 => 330.0,
        // Turn around in one step
        t if t < 9.0 => 150.0,
        // Back towards north
        _ => 20.0,
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    println!("Heading animation example - target vs displayed heading");

    let settings = AnimatorSettings {
        min_distance_to_animate: 15.0,
        duration: Duration::from_millis(250),
    };
    let animator = HeadingAnimator::with_settings(settings);
    let mut rng = Pcg64::seed_from_u64(2024);

    let mut rows = Vec::new();
    let sample_count = TRACE_SECONDS * 1000 / SAMPLE_PERIOD_MS;

    for i in 0..sample_count {
        let now = i * SAMPLE_PERIOD_MS;
        let t = now as f32 / 1000.0;

        // Magnetometer recalibration noise between 5 and 6 seconds
        let noise = if (5.0..6.0).contains(&t) {
            rng.random_range(-25.0..25.0)
        } else {
            rng.random_range(-1.5..1.5)
        };
        let target = normalize_degrees(head_heading(t) + noise);

        animator.set_target(target, now);
        let displayed = animator.displayed_heading(now).unwrap_or(target);

        rows.push(TraceRow {
            time: t,
            target,
            displayed,
            lag: signed_difference(displayed, target),
            running: if animator.is_running() { 1.0 } else { 0.0 },
        });

        if i % 100 == 0 {
            println!(
                "t={:.1}s target={:.1}° displayed={:.1}° lag={:.1}°",
                t,
                target,
                displayed,
                signed_difference(displayed, target)
            );
        }
    }

    let sweeps = rows
        .windows(2)
        .filter(|pair| pair[0].running < 0.5 && pair[1].running > 0.5)
        .count();
    println!("{} samples, {} sweeps", rows.len(), sweeps);

    create_plots(&rows)?;

    println!("✓ Plots saved to animation_plot.png");
    Ok(())
}

/// Three panels: headings, lag and the sweep flag
fn create_plots(rows: &[TraceRow]) -> Result<(), Box<dyn Error>> {
    let root = BitMapBackend::new("animation_plot.png", (1000, 800)).into_drawing_area();
    root.fill(&WHITE)?;

    let (upper, lower) = root.split_vertically(440);
    let (middle, bottom) = lower.split_vertically(240);

    let time_range = 0f32..TRACE_SECONDS as f32;

    let mut heading_chart = ChartBuilder::on(&upper)
        .caption("Target and Displayed Heading", ("sans-serif", 20))
        .margin(5)
        .x_label_area_size(0)
        .y_label_area_size(50)
        .build_cartesian_2d(time_range.clone(), 0f32..360f32)?;

    heading_chart.configure_mesh().y_desc("Degrees").draw()?;

    heading_chart
        .draw_series(
            rows.iter()
                .map(|r| Circle::new((r.time, r.target), 2, RGBColor(160, 160, 160).filled())),
        )?
        .label("Target")
        .legend(|(x, y)| Circle::new((x + 5, y), 3, RGBColor(160, 160, 160).filled()));

    heading_chart
        .draw_series(rows.iter().map(|r| Circle::new((r.time, r.displayed), 1, BLUE.filled())))?
        .label("Displayed")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 10, y)], BLUE));

    heading_chart.configure_series_labels().draw()?;

    let mut lag_chart = ChartBuilder::on(&middle)
        .margin(5)
        .x_label_area_size(0)
        .y_label_area_size(50)
        .build_cartesian_2d(time_range.clone(), -180f32..180f32)?;

    lag_chart.configure_mesh().y_desc("Degrees").draw()?;

    lag_chart
        .draw_series(LineSeries::new(
            rows.iter().map(|r| (r.time, r.lag)),
            &RGBColor(128, 128, 0), // olive
        ))?
        .label("Lag (target - displayed)")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 10, y)], RGBColor(128, 128, 0)));

    lag_chart.configure_series_labels().draw()?;

    let mut flag_chart = ChartBuilder::on(&bottom)
        .margin(5)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(time_range, -0.1f32..1.1f32)?;

    flag_chart
        .configure_mesh()
        .x_desc("Time (s)")
        .y_label_formatter(&|y| {
            if *y < 0.5 {
                "False".to_string()
            } else {
                "True".to_string()
            }
        })
        .draw()?;

    flag_chart
        .draw_series(LineSeries::new(rows.iter().map(|r| (r.time, r.running)), &CYAN))?
        .label("Sweep running")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 10, y)], CYAN));

    flag_chart.configure_series_labels().draw()?;

    root.present()?;
    Ok(())
}
