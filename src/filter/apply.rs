//! Zero-phase FIR application by FFT overlap-add.
//!
//! Each row is padded with `N − 1` reflect-limited samples on both sides,
//! convolved with the taps, shifted left by `(N − 1) / 2` and cropped back
//! to its original length (MNE's `_overlap_add_filter`).
use std::sync::Arc;

use anyhow::{bail, Result};
use ndarray::Array2;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use super::design::design_filter;

/// A linear-phase FIR filter with an odd number of taps.
#[derive(Debug, Clone)]
pub struct FirFilter {
    taps: Vec<f64>,
}

impl FirFilter {
    pub fn new(taps: Vec<f64>) -> Result<Self> {
        if taps.len() % 2 == 0 {
            bail!("zero-phase FIR needs an odd tap count, got {}", taps.len());
        }
        Ok(Self { taps })
    }

    /// MNE-style `raw.filter(l_freq, h_freq)` design.
    pub fn design(l_freq: Option<f64>, h_freq: Option<f64>, sfreq: f64) -> Result<Self> {
        Self::new(design_filter(l_freq, h_freq, sfreq)?)
    }

    pub fn taps(&self) -> &[f64] {
        &self.taps
    }

    /// Filter every row of `data` (`[C, T]`) in place.
    pub fn apply(&self, data: &mut Array2<f32>) {
        let n_t = data.ncols();
        if n_t == 0 {
            return;
        }
        let plan = OverlapAdd::new(&self.taps, n_t + 2 * (self.taps.len() - 1));
        let mut row_buf = vec![0.0f64; n_t];
        for mut row in data.rows_mut() {
            row_buf.iter_mut().zip(row.iter()).for_each(|(d, &s)| *d = s as f64);
            let out = plan.run(&row_buf);
            row.iter_mut().zip(out).for_each(|(d, s)| *d = s as f32);
        }
    }

    /// Filter a single signal; the output has the input's length.
    pub fn apply_1d(&self, x: &[f64]) -> Vec<f64> {
        if x.is_empty() {
            return Vec::new();
        }
        OverlapAdd::new(&self.taps, x.len() + 2 * (self.taps.len() - 1)).run(x)
    }
}

/// FFT plans and the transformed kernel for one (taps, signal length) pair.
struct OverlapAdd<'a> {
    taps: &'a [f64],
    n_fft: usize,
    h_fft: Vec<Complex<f64>>,
    fwd: Arc<dyn Fft<f64>>,
    inv: Arc<dyn Fft<f64>>,
}

impl<'a> OverlapAdd<'a> {
    fn new(taps: &'a [f64], n_padded: usize) -> Self {
        let n_fft = choose_fft_len(taps.len(), n_padded);
        let mut planner = FftPlanner::<f64>::new();
        let fwd = planner.plan_fft_forward(n_fft);
        let inv = planner.plan_fft_inverse(n_fft);
        let mut h_fft = to_complex(taps, n_fft);
        fwd.process(&mut h_fft);
        Self { taps, n_fft, h_fft, fwd, inv }
    }

    fn run(&self, x: &[f64]) -> Vec<f64> {
        let n_h = self.taps.len();
        let edge = n_h - 1;
        let shift = edge / 2;
        let ext = reflect_limited_pad(x, edge, edge);

        // Full linear convolution of the padded signal, block by block.
        let step = self.n_fft - n_h + 1;
        let mut full = vec![0.0f64; ext.len() + n_h - 1];
        let scale = 1.0 / self.n_fft as f64;
        for start in (0..ext.len()).step_by(step) {
            let stop = (start + step).min(ext.len());
            let mut buf = to_complex(&ext[start..stop], self.n_fft);
            self.fwd.process(&mut buf);
            buf.iter_mut().zip(&self.h_fft).for_each(|(b, h)| *b *= *h);
            self.inv.process(&mut buf);
            let n_valid = (stop - start + n_h - 1).min(full.len() - start);
            for (o, b) in full[start..start + n_valid].iter_mut().zip(&buf) {
                *o += b.re * scale;
            }
        }

        full[edge + shift..edge + shift + x.len()].to_vec()
    }
}

fn to_complex(x: &[f64], n: usize) -> Vec<Complex<f64>> {
    let mut out = vec![Complex::default(); n];
    for (o, &v) in out.iter_mut().zip(x) {
        o.re = v;
    }
    out
}

/// Odd-reflection padding about the end samples (MNE's `reflect_limited`).
///
/// Padding longer than `x.len() - 1` continues with zeros.
pub(crate) fn reflect_limited_pad(x: &[f64], n_left: usize, n_right: usize) -> Vec<f64> {
    let n = x.len();
    if n == 0 {
        return vec![0.0; n_left + n_right];
    }
    let (l, r) = (n_left.min(n - 1), n_right.min(n - 1));
    let mut out = Vec::with_capacity(n_left + n + n_right);
    out.extend(std::iter::repeat(0.0).take(n_left - l));
    out.extend((1..=l).rev().map(|i| 2.0 * x[0] - x[i]));
    out.extend_from_slice(x);
    out.extend((1..=r).map(|i| 2.0 * x[n - 1] - x[n - 1 - i]));
    out.extend(std::iter::repeat(0.0).take(n_right - r));
    out
}

/// Power-of-two block length minimising MNE's overlap-add cost model.
fn choose_fft_len(n_h: usize, n_x: usize) -> usize {
    let min_pow = ((2 * n_h - 1) as f64).log2().ceil() as u32;
    let max_pow = ((n_x.max(2)) as f64).log2().ceil() as u32 + 1;
    (min_pow..=max_pow.max(min_pow))
        .map(|p| {
            let n = 1usize << p;
            let blocks = (n_x as f64 / (n - n_h + 1) as f64).ceil();
            let cost = blocks * n as f64 * (p as f64 + 1.0) + 4e-5 * n as f64 * n_x as f64;
            (n, cost)
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(n, _)| n)
        .unwrap_or(1 << min_pow)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct_zero_phase(x: &[f64], h: &[f64]) -> Vec<f64> {
        let edge = h.len() - 1;
        let ext = reflect_limited_pad(x, edge, edge);
        let shift = edge / 2;
        (0..x.len())
            .map(|i| {
                let c = i + edge + shift;
                h.iter()
                    .enumerate()
                    .filter(|&(k, _)| k <= c && c - k < ext.len())
                    .map(|(k, &hk)| hk * ext[c - k])
                    .sum()
            })
            .collect()
    }

    #[test]
    fn matches_direct_convolution() {
        let x: Vec<f64> = (0..300).map(|i| (i as f64 * 0.37).sin() + 0.01 * i as f64).collect();
        let f = FirFilter::new(vec![0.1, 0.2, 0.4, 0.2, 0.1]).unwrap();
        let got = f.apply_1d(&x);
        let want = direct_zero_phase(&x, f.taps());
        for (g, w) in got.iter().zip(&want) {
            approx::assert_abs_diff_eq!(g, w, epsilon = 1e-9);
        }
    }

    #[test]
    fn identity_taps_pass_signal() {
        let x: Vec<f64> = (0..64).map(|i| i as f64).collect();
        let y = FirFilter::new(vec![0.0, 1.0, 0.0]).unwrap().apply_1d(&x);
        for (a, b) in x.iter().zip(&y) {
            approx::assert_abs_diff_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn even_taps_rejected() {
        assert!(FirFilter::new(vec![0.5, 0.5]).is_err());
    }

    #[test]
    fn reflect_limited_padding() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let p = reflect_limited_pad(&x, 3, 2);
        assert_eq!(&p[..3], &[-2.0, -1.0, 0.0]);
        assert_eq!(&p[3..8], &x[..]);
        assert_eq!(&p[8..], &[6.0, 7.0]);
        // Longer than the signal: zeros beyond the reflection.
        let p = reflect_limited_pad(&[1.0, 2.0], 3, 0);
        assert_eq!(p, vec![0.0, 0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn bandpass_removes_dc_and_keeps_passband() {
        let sfreq = 100.0;
        let f = FirFilter::design(Some(1.0), Some(8.0), sfreq).unwrap();
        let n = 6000;
        let x: Vec<f64> = (0..n)
            .map(|i| 3.0 + (2.0 * std::f64::consts::PI * 4.0 * i as f64 / sfreq).sin())
            .collect();
        let y = f.apply_1d(&x);
        let guard = f.taps().len();
        let interior = &y[guard..n - guard];
        let mean = interior.iter().sum::<f64>() / interior.len() as f64;
        let rms = (interior.iter().map(|v| v * v).sum::<f64>() / interior.len() as f64).sqrt();
        assert!(mean.abs() < 0.05, "DC leak {mean}");
        approx::assert_abs_diff_eq!(rms, std::f64::consts::FRAC_1_SQRT_2, epsilon = 0.02);
    }
}
