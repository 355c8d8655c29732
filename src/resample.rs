//! FFT resampling (MNE's `resample(..., method='fft')`).
//!
//! 1. Pad with reflect-limited samples up to the next power of two.
//! 2. Real spectrum of the padded signal.
//! 3. Double the Nyquist bin when shrinking, halve it when growing.
//! 4. Scale by `new_len / old_len` and inverse-transform at the new length
//!    (truncating or zero-extending the spectrum).
//! 5. Strip the resampled padding.
use rustfft::{num_complex::Complex, FftPlanner};

use crate::filter::apply::reflect_limited_pad;

/// `(left, right)` padding MNE picks for an `n`-sample signal.
///
/// ```text
/// min_add = min(n // 8, 100) * 2
/// total   = 2^ceil(log2(n + min_add)) - n
/// ```
pub fn auto_npad(n: usize) -> (usize, usize) {
    let min_add = (n / 8).min(100) * 2;
    let next_pow2 = (n + min_add).max(1).next_power_of_two();
    let total = next_pow2 - n;
    (total / 2, total - total / 2)
}

/// Number of samples after resampling `n` samples from `src` to `dst` Hz.
pub fn resampled_len(n: usize, src: f64, dst: f64) -> usize {
    (n as f64 * dst / src).round() as usize
}

/// Resample one signal from `src` to `dst` Hz.
pub fn resample_1d(x: &[f64], src: f64, dst: f64) -> Vec<f64> {
    if x.is_empty() {
        return Vec::new();
    }
    if (src - dst).abs() < 1e-9 {
        return x.to_vec();
    }
    let ratio = dst / src;
    let final_len = resampled_len(x.len(), src, dst);
    let (pad_l, pad_r) = auto_npad(x.len());
    let ext = reflect_limited_pad(x, pad_l, pad_r);
    let old_len = ext.len();
    let new_len = (ratio * old_len as f64).round().max(1.0) as usize;
    let shrinking = new_len < old_len;

    let mut planner = FftPlanner::<f64>::new();
    let mut spec: Vec<Complex<f64>> = ext.iter().map(|&v| Complex::new(v, 0.0)).collect();
    planner.plan_fft_forward(old_len).process(&mut spec);
    spec.truncate(old_len / 2 + 1);

    let use_len = if shrinking { new_len } else { old_len };
    if use_len % 2 == 0 {
        let nyq = use_len / 2;
        if let Some(bin) = spec.get_mut(nyq) {
            *bin *= if shrinking { 2.0 } else { 0.5 };
        }
    }

    // Hermitian spectrum at the new length.
    let half = new_len / 2 + 1;
    let scale = new_len as f64 / old_len as f64 / new_len as f64;
    let mut full = vec![Complex::<f64>::default(); new_len];
    for (k, v) in spec.iter().take(half).enumerate() {
        full[k] = *v * scale;
    }
    for k in 1..half {
        let mirror = new_len - k;
        if mirror >= half {
            full[mirror] = full[k].conj();
        }
    }
    planner.plan_fft_inverse(new_len).process(&mut full);

    let drop_l = (ratio * pad_l as f64).round() as usize;
    let mut out: Vec<f64> = full
        .iter()
        .skip(drop_l)
        .take(final_len)
        .map(|c| c.re)
        .collect();
    out.resize(final_len, 0.0);
    out
}
