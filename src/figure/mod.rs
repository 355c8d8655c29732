//! SVG figures for the TRF analysis.
//!
//! `Deconvolution.svg` lays panels on a 4 × 9 grid:
//!
//! ```text
//!        cols 0..4             col 4     cols 5..9         col 7
//! row 0  EEG (training)                  EEG held-out: true vs predicted
//! row 1                        TRF                         predictive power
//! row 2  predictor (training)            predictor (held-out)
//! row 3  stimulus (first)                stimulus (held-out)
//! ```
//!
//! Arrows: A stimulus → predictor (grey); B EEG + predictor → TRF;
//! C TRF + predictor → prediction; D prediction → predictive power (red).
pub mod topomap;

use std::ops::Range;
use std::path::{Path, PathBuf};

use anyhow::Result;
use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::info;

use crate::config::{ensure_dir, DataLayout, TrfConfig};
use crate::normalize::zscore;
use crate::series::Series;
use crate::trf::TrfAnalysis;
use topomap::{draw_colorbar, symmetric_limit, Topomap};

type Area<'a> = DrawingArea<SVGBackend<'a>, Shift>;

const WIDTH: u32 = 1500;
const HEIGHT: u32 = 800;
const GRID: (u32, u32) = (4, 9);
const PURPLE: RGBColor = RGBColor(128, 0, 128);
const GREY: RGBColor = RGBColor(128, 128, 128);

/// Pixel rectangle of a panel, `(x, y, w, h)` with `y` pointing down.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Cell {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

impl Cell {
    /// `colspan` grid cells starting at `(row, col)`.
    fn grid(row: u32, col: u32, colspan: u32) -> Self {
        let (cw, ch) = (WIDTH as f64 / GRID.1 as f64, HEIGHT as f64 / GRID.0 as f64);
        Self { x: col as f64 * cw, y: row as f64 * ch, w: colspan as f64 * cw, h: ch }
    }

    /// Point in axes fractions (`(0, 0)` bottom left, `(1, 1)` top right).
    fn at(&self, fx: f64, fy: f64) -> (f64, f64) {
        (self.x + fx * self.w, self.y + (1.0 - fy) * self.h)
    }

    fn area<'a>(&self, root: &Area<'a>) -> Area<'a> {
        root.clone().shrink((self.x as i32, self.y as i32), (self.w as u32, self.h as u32))
    }
}

struct Trace {
    points: Vec<(f64, f64)>,
    color: RGBColor,
}

struct Panel<'s> {
    title: Option<&'s str>,
    ylabel: Option<&'s str>,
    xlabel: Option<&'s str>,
    x_ticks: bool,
}

fn draw_traces(area: &Area, traces: &[Trace], x_range: Range<f64>, panel: &Panel) -> Result<()> {
    let (lo, hi) = traces
        .iter()
        .flat_map(|t| t.points.iter().map(|p| p.1))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let (lo, hi) = if lo.is_finite() && hi > lo { (lo, hi) } else { (-1.0, 1.0) };
    let pad = 0.05 * (hi - lo);

    let mut builder = ChartBuilder::on(area);
    builder
        .margin(6)
        .x_label_area_size(if panel.x_ticks || panel.xlabel.is_some() { 28 } else { 0 })
        .y_label_area_size(if panel.ylabel.is_some() { 22 } else { 4 });
    if let Some(t) = panel.title {
        builder.caption(t, ("sans-serif", 14));
    }
    let mut chart = builder.build_cartesian_2d(x_range, (lo - pad)..(hi + pad))?;

    let mut mesh = chart.configure_mesh();
    mesh.disable_mesh().y_labels(0).x_labels(if panel.x_ticks { 6 } else { 0 });
    if let Some(y) = panel.ylabel {
        mesh.y_desc(y);
    }
    if let Some(x) = panel.xlabel {
        mesh.x_desc(x);
    }
    mesh.draw()?;

    for t in traces {
        chart.draw_series(LineSeries::new(t.points.iter().copied(), t.color.stroke_width(1)))?;
    }
    Ok(())
}

/// Samples of `channel` inside `xlim`, optionally z-scored over the whole series.
fn trace(series: &Series, channel: usize, xlim: (f64, f64), normalize: bool, color: RGBColor) -> Trace {
    let points = if normalize {
        let z = zscore(&series.data.row(channel).to_vec());
        series
            .axis
            .times()
            .zip(z)
            .filter(|(t, _)| *t >= xlim.0 && *t < xlim.1)
            .map(|(t, v)| (t, v as f64))
            .collect()
    } else {
        series.window(channel, xlim.0, xlim.1).into_iter().map(|(t, v)| (t, v as f64)).collect()
    };
    Trace { points, color }
}

/// Curved arrow from `a` to `b`: quadratic Bézier bent sideways by `rad`.
fn draw_arrow(root: &Area, a: (f64, f64), b: (f64, f64), rad: f64, color: RGBColor) -> Result<()> {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let ctrl = (a.0 + dx / 2.0 + rad * dy, a.1 + dy / 2.0 - rad * dx);
    let bezier = |t: f64| {
        let u = 1.0 - t;
        (
            u * u * a.0 + 2.0 * u * t * ctrl.0 + t * t * b.0,
            u * u * a.1 + 2.0 * u * t * ctrl.1 + t * t * b.1,
        )
    };
    let path: Vec<(i32, i32)> = (0..=24)
        .map(|i| bezier(i as f64 / 24.0))
        .map(|(x, y)| (x as i32, y as i32))
        .collect();
    root.draw(&PathElement::new(path, color.stroke_width(3)))?;

    // Head along the final tangent.
    let tail = bezier(0.92);
    let (tx, ty) = (b.0 - tail.0, b.1 - tail.1);
    let len = tx.hypot(ty).max(1e-9);
    let (ux, uy) = (tx / len, ty / len);
    let (size, half) = (14.0, 7.0);
    let base = (b.0 - ux * size, b.1 - uy * size);
    let head = vec![
        (b.0 as i32, b.1 as i32),
        ((base.0 - uy * half) as i32, (base.1 + ux * half) as i32),
        ((base.0 + uy * half) as i32, (base.1 - ux * half) as i32),
    ];
    root.draw(&Polygon::new(head, color.filled()))?;
    Ok(())
}

fn draw_label(root: &Area, at: (f64, f64), text: &str) -> Result<()> {
    root.draw(&Text::new(text.to_string(), (at.0 as i32, at.1 as i32), ("sans-serif", 20).into_font()))?;
    Ok(())
}

/// Composite figure summarising predictor, response, TRF and accuracy.
pub fn render_deconvolution(analysis: &TrfAnalysis, cfg: &TrfConfig, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        ensure_dir(dir)?;
    }
    let sensor = analysis.train_eeg.channel_index(&cfg.sensor)?;
    let held_out = analysis.held_out();
    let xlim = cfg.xlim;
    let x_range = xlim.0..xlim.1;

    let root = SVGBackend::new(path, (WIDTH, HEIGHT)).into_drawing_area();
    root.fill(&WHITE)?;

    let eeg1 = Cell::grid(0, 0, 4);
    let eeg2 = Cell::grid(0, 5, 4);
    let trf_cell = Cell::grid(1, 4, 1);
    let r_cell = Cell::grid(1, 7, 1);
    let env1 = Cell::grid(2, 0, 4);
    let env2 = Cell::grid(2, 5, 4);
    let sti1 = Cell::grid(3, 0, 4);
    let sti2 = Cell::grid(3, 5, 4);

    let eeg_label = format!("EEG-{}", cfg.sensor);
    draw_traces(
        &eeg1.area(&root),
        &[trace(&analysis.train_eeg, sensor, xlim, true, BLACK)],
        x_range.clone(),
        &Panel { title: Some("Training data"), ylabel: Some(&eeg_label), xlabel: None, x_ticks: false },
    )?;
    let held_sensor = held_out.eeg.channel_index(&cfg.sensor)?;
    draw_traces(
        &eeg2.area(&root),
        &[
            trace(&held_out.eeg, held_sensor, xlim, true, BLACK),
            trace(&analysis.predicted, held_sensor, xlim, true, RED),
        ],
        x_range.clone(),
        &Panel { title: Some("Held-out testing data"), ylabel: None, xlabel: None, x_ticks: false },
    )?;

    let h = analysis.trf.channel(&cfg.sensor)?;
    let lags: Vec<(f64, f64)> = analysis
        .trf
        .time
        .times()
        .zip(h.iter())
        .map(|(t, &v)| (t * 1000.0, v))
        .collect();
    let lag_range = (analysis.trf.time.tmin * 1000.0)..(analysis.trf.time.tstop() * 1000.0);
    draw_traces(
        &trf_cell.area(&root),
        &[Trace { points: lags, color: PURPLE }],
        lag_range,
        &Panel { title: None, ylabel: Some("TRF"), xlabel: Some("Lag τ (ms)"), x_ticks: true },
    )?;

    Topomap {
        values: &analysis.r_predicted,
        positions: &analysis.positions,
        vmax: symmetric_limit(&analysis.r_predicted),
        labels: None,
        title: Some("Predictive power"),
    }
    .draw(&r_cell.area(&root))?;

    let no_ticks = Panel { title: None, ylabel: None, xlabel: None, x_ticks: false };
    draw_traces(
        &env1.area(&root),
        &[trace(&analysis.train_envelope, 0, xlim, false, BLUE)],
        x_range.clone(),
        &Panel { ylabel: Some("Predictor"), ..no_ticks },
    )?;
    draw_traces(
        &env2.area(&root),
        &[trace(&held_out.envelope, 0, xlim, false, BLUE)],
        x_range.clone(),
        &no_ticks,
    )?;
    draw_traces(
        &sti1.area(&root),
        &[trace(&analysis.trials[analysis.train.start].stimulus, 0, xlim, false, BLACK)],
        x_range.clone(),
        &Panel { ylabel: Some("Stimulus"), x_ticks: true, ..no_ticks },
    )?;
    draw_traces(
        &sti2.area(&root),
        &[trace(&held_out.stimulus, 0, xlim, false, BLACK)],
        x_range,
        &Panel { x_ticks: true, ..no_ticks },
    )?;

    // B: training EEG and predictor feed the TRF estimate.
    draw_arrow(&root, eeg1.at(0.5, 0.0), trf_cell.at(-0.5, 0.5), 0.2, RED)?;
    draw_arrow(&root, env1.at(0.5, 1.0), trf_cell.at(-0.6, 0.3), -0.2, RED)?;
    draw_label(&root, trf_cell.at(-2.0, 0.4), "B")?;
    // C: TRF and held-out predictor give the prediction.
    draw_arrow(&root, trf_cell.at(1.2, 0.5), eeg2.at(0.2, 0.0), 0.3, RED)?;
    draw_arrow(&root, env2.at(0.22, 1.0), eeg2.at(0.22, -0.3), 0.0, RED)?;
    draw_label(&root, trf_cell.at(2.4, 1.2), "C")?;
    // D: prediction vs. measurement gives predictive power.
    draw_arrow(&root, eeg2.at(0.6, 0.0), r_cell.at(0.5, 1.5), 0.0, RED)?;
    draw_label(&root, eeg2.at(0.55, -0.4), "D")?;
    // A: stimulus → predictor.
    for (sti, env) in [(sti1, env1), (sti2, env2)] {
        draw_arrow(&root, sti.at(0.5, 1.0), env.at(0.5, -0.1), 0.0, GREY)?;
        draw_label(&root, sti.at(0.43, 1.4), "A")?;
    }

    root.present()?;
    info!(path = %path.display(), "wrote figure");
    Ok(())
}

/// TRF topographies at `cfg.topo_times`, one panel per latency.
pub fn render_trf_topography(analysis: &TrfAnalysis, cfg: &TrfConfig, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        ensure_dir(dir)?;
    }
    let maps: Vec<Vec<f64>> = cfg.topo_times.iter().map(|&t| analysis.trf.at_latency(t)).collect();
    let vmax = symmetric_limit(&maps.concat());
    let n = maps.len().max(1);

    let root = SVGBackend::new(path, (260 * n as u32 + 90, 300)).into_drawing_area();
    root.fill(&WHITE)?;
    let (body, bar) = root.split_horizontally(260 * n as u32);
    for ((panel, values), t) in body.split_evenly((1, n)).iter().zip(&maps).zip(&cfg.topo_times) {
        let title = format!("{:.0} ms", t * 1000.0);
        Topomap {
            values,
            positions: &analysis.positions,
            vmax,
            labels: None,
            title: Some(&title),
        }
        .draw(panel)?;
    }
    draw_colorbar(&bar, vmax, "h")?;
    root.present()?;
    info!(path = %path.display(), "wrote figure");
    Ok(())
}

/// Training and held-out accuracy maps with sensor names.
pub fn render_accuracy(analysis: &TrfAnalysis, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        ensure_dir(dir)?;
    }
    let max = |r: &[f64]| r.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let titles = [
        format!("Training data r_max={:.2}", max(analysis.trf.r.as_slice())),
        format!("Testing data r_max={:.2}", max(analysis.r_predicted.as_slice())),
    ];
    let vmax = symmetric_limit(&[analysis.trf.r.as_slice(), analysis.r_predicted.as_slice()].concat());

    let root = SVGBackend::new(path, (700, 330)).into_drawing_area();
    root.fill(&WHITE)?;
    let (body, bar) = root.split_horizontally(610);
    let panels = body.split_evenly((1, 2));
    for ((panel, values), title) in panels.iter().zip([&analysis.trf.r, &analysis.r_predicted]).zip(&titles) {
        Topomap {
            values,
            positions: &analysis.positions,
            vmax,
            labels: Some(analysis.trf.ch_names.as_slice()),
            title: Some(title),
        }
        .draw(panel)?;
    }
    draw_colorbar(&bar, vmax, "r")?;
    root.present()?;
    info!(path = %path.display(), "wrote figure");
    Ok(())
}

/// Write all three figures into `layout.figure_dir()`.
pub fn render_all(analysis: &TrfAnalysis, cfg: &TrfConfig, layout: &DataLayout) -> Result<Vec<PathBuf>> {
    let dir = layout.figure_dir();
    ensure_dir(&dir)?;
    let paths = [
        dir.join("Deconvolution.svg"),
        dir.join("TRF-topography.svg"),
        dir.join("TRF-accuracy.svg"),
    ];
    render_deconvolution(analysis, cfg, &paths[0])?;
    render_trf_topography(analysis, cfg, &paths[1])?;
    render_accuracy(analysis, &paths[2])?;
    Ok(paths.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_cells_tile_the_canvas() {
        let c = Cell::grid(3, 5, 4);
        approx::assert_abs_diff_eq!(c.x + c.w, WIDTH as f64, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(c.y + c.h, HEIGHT as f64, epsilon = 1e-9);
    }

    #[test]
    fn axes_fractions_point_up() {
        let c = Cell { x: 100.0, y: 50.0, w: 200.0, h: 100.0 };
        assert_eq!(c.at(0.0, 0.0), (100.0, 150.0));
        assert_eq!(c.at(1.0, 1.0), (300.0, 50.0));
    }

    #[test]
    fn trace_is_clipped_to_the_window() {
        let s = Series::from_signal("x", 0.0, 0.5, (0..40).map(|v| v as f32).collect());
        let t = trace(&s, 0, (11.0, 16.0), false, BLACK);
        assert_eq!(t.points.first().map(|p| p.0), Some(11.0));
        assert!(t.points.iter().all(|p| p.0 < 16.0));
        assert_eq!(t.points.len(), 10);
    }
}
