//! Scalp topography: azimuthal projection of the sensors and inverse
//! distance weighted fill inside the head circle.
use anyhow::Result;
use plotters::coord::Shift;
use plotters::prelude::*;

use crate::recording::fit_sphere_origin;

/// Sensor positions projected into the unit disc (nose towards `+y`).
pub fn project_sensors(positions: &[[f64; 3]]) -> Vec<(f64, f64)> {
    let origin = fit_sphere_origin(positions);
    let flat: Vec<(f64, f64)> = positions
        .iter()
        .map(|p| {
            let (x, y, z) = (p[0] - origin[0], p[1] - origin[1], p[2] - origin[2]);
            let r = (x * x + y * y + z * z).sqrt();
            if r == 0.0 {
                return (0.0, 0.0);
            }
            // Azimuthal equidistant: distance from the vertex is the polar angle.
            let theta = (z / r).clamp(-1.0, 1.0).acos();
            let phi = y.atan2(x);
            (theta * phi.cos(), theta * phi.sin())
        })
        .collect();

    let extent = flat.iter().map(|(x, y)| x.hypot(*y)).fold(0.0, f64::max);
    if extent == 0.0 {
        // No usable locations: spread the sensors on a ring.
        let n = positions.len().max(1) as f64;
        return (0..positions.len())
            .map(|i| {
                let a = std::f64::consts::FRAC_PI_2 - 2.0 * std::f64::consts::PI * i as f64 / n;
                (0.8 * a.cos(), 0.8 * a.sin())
            })
            .collect();
    }
    flat.into_iter().map(|(x, y)| (0.9 * x / extent, 0.9 * y / extent)).collect()
}

/// Inverse-distance-weighted value at `(x, y)`.
pub fn idw(x: f64, y: f64, sensors: &[(f64, f64)], values: &[f64]) -> f64 {
    const POWER: i32 = 2;
    let mut sum_w = 0.0;
    let mut sum_v = 0.0;
    for (&(sx, sy), &v) in sensors.iter().zip(values) {
        let d = (x - sx).hypot(y - sy);
        if d < 1e-3 {
            return v;
        }
        let w = 1.0 / d.powi(POWER);
        sum_w += w;
        sum_v += w * v;
    }
    if sum_w > 0.0 {
        sum_v / sum_w
    } else {
        0.0
    }
}

/// Blue–white–red for `v` in `[-vmax, vmax]`.
pub fn diverging(v: f64, vmax: f64) -> RGBColor {
    let t = if vmax > 0.0 { (v / vmax).clamp(-1.0, 1.0) } else { 0.0 };
    let fade = |a: f64| (255.0 * (1.0 - a)).round() as u8;
    if t >= 0.0 {
        RGBColor(255, fade(t), fade(t))
    } else {
        RGBColor(fade(-t), fade(-t), 255)
    }
}

/// Largest absolute value, or `1` for an all-zero map.
pub fn symmetric_limit(values: &[f64]) -> f64 {
    let m = values.iter().fold(0.0f64, |a, v| a.max(v.abs()));
    if m > 0.0 {
        m
    } else {
        1.0
    }
}

pub struct Topomap<'a> {
    pub values: &'a [f64],
    pub positions: &'a [[f64; 3]],
    pub vmax: f64,
    pub labels: Option<&'a [String]>,
    pub title: Option<&'a str>,
}

impl Topomap<'_> {
    pub fn draw<DB>(&self, area: &DrawingArea<DB, Shift>) -> Result<()>
    where
        DB: DrawingBackend,
        DB::ErrorType: 'static,
    {
        let area = match self.title {
            Some(t) => area.titled(t, ("sans-serif", 13).into_font())?,
            None => area.clone(),
        };
        let (w, h) = area.dim_in_pixel();
        let radius = 0.42 * w.min(h) as f64;
        let (cx, cy) = (w as f64 / 2.0, h as f64 / 2.0);
        let sensors = project_sensors(self.positions);
        let to_px = |(x, y): (f64, f64)| ((cx + x * radius) as i32, (cy - y * radius) as i32);

        const CELL: i32 = 3;
        for py in (0..h as i32).step_by(CELL as usize) {
            for px in (0..w as i32).step_by(CELL as usize) {
                let x = (px as f64 + 0.5 * CELL as f64 - cx) / radius;
                let y = (cy - py as f64 - 0.5 * CELL as f64) / radius;
                if x * x + y * y > 1.0 {
                    continue;
                }
                let color = diverging(idw(x, y, &sensors, self.values), self.vmax);
                area.draw(&Rectangle::new([(px, py), (px + CELL, py + CELL)], color.filled()))?;
            }
        }

        // Head outline and nose.
        let centre = (cx as i32, cy as i32);
        area.draw(&Circle::new(centre, radius as i32, BLACK.stroke_width(1)))?;
        let nose_w = 0.1 * radius;
        area.draw(&PathElement::new(
            vec![
                to_px((-nose_w / radius, 0.99)),
                to_px((0.0, 1.12)),
                to_px((nose_w / radius, 0.99)),
            ],
            BLACK.stroke_width(1),
        ))?;

        for (i, &s) in sensors.iter().enumerate() {
            let p = to_px(s);
            area.draw(&Circle::new(p, 1, BLACK.filled()))?;
            if let Some(name) = self.labels.and_then(|l| l.get(i)) {
                area.draw(&Text::new(name.clone(), (p.0 + 2, p.1 - 2), ("sans-serif", 7).into_font()))?;
            }
        }
        Ok(())
    }
}

/// Vertical colour bar for `[-vmax, vmax]`.
pub fn draw_colorbar<DB>(area: &DrawingArea<DB, Shift>, vmax: f64, label: &str) -> Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (w, h) = area.dim_in_pixel();
    let (top, bottom) = (0.15 * h as f64, 0.85 * h as f64);
    let (x0, x1) = ((0.2 * w as f64) as i32, (0.45 * w as f64) as i32);
    let steps = 64;
    for i in 0..steps {
        let y0 = top + (bottom - top) * i as f64 / steps as f64;
        let y1 = top + (bottom - top) * (i + 1) as f64 / steps as f64;
        let v = vmax * (1.0 - 2.0 * (i as f64 + 0.5) / steps as f64);
        area.draw(&Rectangle::new([(x0, y0 as i32), (x1, y1.ceil() as i32)], diverging(v, vmax).filled()))?;
    }
    area.draw(&Rectangle::new([(x0, top as i32), (x1, bottom as i32)], BLACK.stroke_width(1)))?;
    let font = ("sans-serif", 10).into_font();
    area.draw(&Text::new(format!("{vmax:.2}"), (x1 + 3, top as i32 - 4), font.clone()))?;
    area.draw(&Text::new(format!("{:.2}", -vmax), (x1 + 3, bottom as i32 - 4), font.clone()))?;
    area.draw(&Text::new(label.to_string(), (x0, (bottom + 6.0) as i32), font))?;
    Ok(())
}
