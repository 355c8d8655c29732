//! Continuous multichannel recording: load, band-pass, repair bad channels.
//!
//! ```text
//! Recording::read_fif(path)      FIFF → [C, T] f32 + channel table
//!   .filter(l, h)                zero-phase FIR on EEG channels, in place
//!   .interpolate_bads()          spherical-spline repair, bads cleared
//! ```
use std::path::Path;

use anyhow::{anyhow, Result};
use nalgebra::DMatrix;
use ndarray::{Array2, ArrayView1};
use tracing::{debug, info};

use crate::error::DataError;
use crate::fiff::constants::{FIFFV_EEG_CH, FIFFV_STIM_CH};
use crate::fiff::read_raw_fif;
use crate::filter::FirFilter;

#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub name: String,
    /// FIFF channel kind (`FIFFV_EEG_CH`, `FIFFV_STIM_CH`, ...).
    pub kind: i32,
    /// Sensor location in metres (head coordinates).
    pub pos: [f64; 3],
}

impl Channel {
    pub fn eeg(name: impl Into<String>, pos: [f64; 3]) -> Self {
        Self { name: name.into(), kind: FIFFV_EEG_CH, pos }
    }

    pub fn stim(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: FIFFV_STIM_CH, pos: [0.0; 3] }
    }

    pub fn is_eeg(&self) -> bool {
        self.kind == FIFFV_EEG_CH
    }
}

#[derive(Debug, Clone)]
pub struct Recording {
    /// `[n_channels, n_times]`.
    pub data: Array2<f32>,
    pub sfreq: f64,
    pub channels: Vec<Channel>,
    /// Names of channels flagged as bad.
    pub bads: Vec<String>,
}

impl Recording {
    pub fn read_fif<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = read_raw_fif(path)?;
        let channels = raw
            .info
            .chs
            .iter()
            .map(|ch| Channel {
                name: ch.name.clone(),
                kind: ch.kind,
                pos: ch.pos.map(f64::from),
            })
            .collect();
        info!(
            path = %path.display(),
            n_chan = raw.info.chs.len(),
            n_times = raw.data.ncols(),
            sfreq = raw.info.sfreq,
            "loaded raw recording"
        );
        Ok(Self {
            data: raw.data.mapv(|v| v as f32),
            sfreq: raw.info.sfreq,
            channels,
            bads: raw.info.bads,
        })
    }

    pub fn n_times(&self) -> usize {
        self.data.ncols()
    }

    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.channels.iter().position(|c| c.name == name)
    }

    pub fn is_bad(&self, name: &str) -> bool {
        self.bads.iter().any(|b| b == name)
    }

    /// EEG channels that are not flagged bad, in recording order.
    pub fn good_eeg_picks(&self) -> Vec<usize> {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_eeg() && !self.is_bad(&c.name))
            .map(|(i, _)| i)
            .collect()
    }

    /// First stimulus channel.
    pub fn stim_channel(&self) -> Result<ArrayView1<'_, f32>> {
        let idx = self
            .channels
            .iter()
            .position(|c| c.kind == FIFFV_STIM_CH)
            .ok_or(DataError::NoStimChannel)?;
        Ok(self.data.row(idx))
    }

    /// Zero-phase band-pass of every EEG channel, bad ones included.
    pub fn filter(&mut self, l_freq: f64, h_freq: f64) -> Result<()> {
        let fir = FirFilter::design(Some(l_freq), Some(h_freq), self.sfreq)?;
        debug!(l_freq, h_freq, n_taps = fir.taps().len(), "band-pass");
        let eeg: Vec<usize> = (0..self.channels.len()).filter(|&i| self.channels[i].is_eeg()).collect();
        let mut sub = self.data.select(ndarray::Axis(0), &eeg);
        fir.apply(&mut sub);
        for (row, &i) in sub.rows().into_iter().zip(&eeg) {
            self.data.row_mut(i).assign(&row);
        }
        Ok(())
    }

    /// Replace bad EEG channels by a spherical-spline interpolation of the
    /// good ones and clear the bad list.
    pub fn interpolate_bads(&mut self) -> Result<()> {
        let bad: Vec<usize> = self
            .channels
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_eeg() && self.is_bad(&c.name))
            .map(|(i, _)| i)
            .collect();
        if bad.is_empty() {
            self.bads.clear();
            return Ok(());
        }
        let good = self.good_eeg_picks();
        if good.is_empty() {
            return Err(anyhow!("cannot interpolate {} bad channels: no good EEG channels", bad.len()));
        }

        let all_eeg: Vec<[f64; 3]> = good.iter().chain(&bad).map(|&i| self.channels[i].pos).collect();
        let origin = fit_sphere_origin(&all_eeg);
        let unit = |i: usize| unit_vector(self.channels[i].pos, origin);
        let from: Vec<[f64; 3]> = good.iter().map(|&i| unit(i)).collect();
        let to: Vec<[f64; 3]> = bad.iter().map(|&i| unit(i)).collect();
        let weights = interpolation_matrix(&from, &to)?;

        info!(
            bads = ?bad.iter().map(|&i| self.channels[i].name.as_str()).collect::<Vec<_>>(),
            "interpolating bad channels"
        );
        let good_data = self.data.select(ndarray::Axis(0), &good).mapv(f64::from);
        let repaired = weights.dot(&good_data);
        for (row, &i) in repaired.rows().into_iter().zip(&bad) {
            self.data.row_mut(i).assign(&row.mapv(|v| v as f32));
        }
        self.bads.clear();
        Ok(())
    }
}

const STIFFNESS: i32 = 4;
const N_LEGENDRE_TERMS: usize = 7;
const SPLINE_ALPHA: f64 = 1e-5;

/// Spherical-spline kernel `g(cos θ) = Σₙ (2n+1) / (nᵐ (n+1)ᵐ 4π) · Pₙ(cos θ)`.
fn calc_g(cosang: f64) -> f64 {
    let x = cosang.clamp(-1.0, 1.0);
    let (mut p_prev, mut p) = (1.0, x);
    let mut g = 0.0;
    for n in 1..=N_LEGENDRE_TERMS {
        let nf = n as f64;
        let factor = (2.0 * nf + 1.0)
            / (nf.powi(STIFFNESS) * (nf + 1.0).powi(STIFFNESS) * 4.0 * std::f64::consts::PI);
        g += factor * p;
        let p_next = ((2.0 * nf + 1.0) * x * p - nf * p_prev) / (nf + 1.0);
        p_prev = p;
        p = p_next;
    }
    g
}

fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// `[n_to, n_from]` weights mapping good-channel data to the targets.
///
/// ```text
/// C = | G_from + αI  1 |      W = [G_to_from  1] · pinv(C)[:, :n_from]
///     | 1ᵀ           0 |
/// ```
pub fn interpolation_matrix(from: &[[f64; 3]], to: &[[f64; 3]]) -> Result<Array2<f64>> {
    let n = from.len();
    let mut c = DMatrix::<f64>::zeros(n + 1, n + 1);
    for i in 0..n {
        for j in 0..n {
            c[(i, j)] = calc_g(dot(&from[i], &from[j]));
        }
        c[(i, i)] += SPLINE_ALPHA;
        c[(i, n)] = 1.0;
        c[(n, i)] = 1.0;
    }
    let c_inv = c
        .pseudo_inverse(1e-12)
        .map_err(|e| anyhow!("spline system pseudo-inverse failed: {e}"))?;

    let mut out = Array2::<f64>::zeros((to.len(), n));
    for (k, t) in to.iter().enumerate() {
        let row: Vec<f64> = from.iter().map(|f| calc_g(dot(t, f))).chain(std::iter::once(1.0)).collect();
        for j in 0..n {
            out[[k, j]] = row.iter().enumerate().map(|(i, r)| r * c_inv[(i, j)]).sum();
        }
    }
    Ok(out)
}

fn unit_vector(p: [f64; 3], origin: [f64; 3]) -> [f64; 3] {
    let v = [p[0] - origin[0], p[1] - origin[1], p[2] - origin[2]];
    let norm = dot(&v, &v).sqrt();
    if norm > 0.0 {
        [v[0] / norm, v[1] / norm, v[2] / norm]
    } else {
        v
    }
}

/// Least-squares sphere centre through the sensor positions.
///
/// Solves `|p|² = 2 c·p + d` for `(c, d)`; falls back to the origin when the
/// system is degenerate.
pub(crate) fn fit_sphere_origin(points: &[[f64; 3]]) -> [f64; 3] {
    if points.len() < 4 {
        return [0.0; 3];
    }
    let a = DMatrix::from_fn(points.len(), 4, |i, j| if j < 3 { 2.0 * points[i][j] } else { 1.0 });
    let b = DMatrix::from_fn(points.len(), 1, |i, _| dot(&points[i], &points[i]));
    match a.svd(true, true).solve(&b, 1e-12) {
        Ok(x) if x.iter().all(|v| v.is_finite()) => [x[0], x[1], x[2]],
        _ => [0.0; 3],
    }
}
