//! Windowed-sinc FIR design with MNE's automatic parameters.
//!
//! For `raw.filter(l_freq, h_freq)` with `fir_design='firwin'`:
//!   • low transition  = min(max(0.25 · l_freq, 2), l_freq)
//!   • high transition = min(max(0.25 · h_freq, 2), nyquist − h_freq)
//!   • length N        = ⌈3.3 / min(transitions) · sfreq⌉, rounded up to odd
//!   • cutoffs sit in the middle of each transition band
//!   • Hamming window, passband gain normalised to 1
use std::f64::consts::PI;

use anyhow::{bail, Result};

/// Transition bandwidth below the low cutoff.
pub fn low_transition(l_freq: f64) -> f64 {
    (0.25 * l_freq).max(2.0).min(l_freq)
}

/// Transition bandwidth above the high cutoff.
pub fn high_transition(h_freq: f64, sfreq: f64) -> f64 {
    (0.25 * h_freq).max(2.0).min(sfreq / 2.0 - h_freq)
}

/// Odd tap count for the narrowest transition band.
pub fn filter_length(trans_bw: f64, sfreq: f64) -> usize {
    let n = (3.3 / trans_bw * sfreq).ceil() as usize;
    n | 1
}

/// Design a zero-phase FIR for `raw.filter(l_freq, h_freq)`.
///
/// `l_freq = None` gives a lowpass, `h_freq = None` a highpass, both
/// `Some` a band-pass.
pub fn design_filter(l_freq: Option<f64>, h_freq: Option<f64>, sfreq: f64) -> Result<Vec<f64>> {
    let nyq = sfreq / 2.0;
    if let Some(l) = l_freq {
        if l <= 0.0 || l >= nyq {
            bail!("l_freq {l} Hz outside (0, {nyq}) Hz");
        }
    }
    if let Some(h) = h_freq {
        if h <= 0.0 || h >= nyq {
            bail!("h_freq {h} Hz outside (0, {nyq}) Hz");
        }
    }

    let (lo, hi, trans) = match (l_freq, h_freq) {
        (Some(l), Some(h)) => {
            if l >= h {
                bail!("band-pass needs l_freq < h_freq (got {l} >= {h})");
            }
            let (lt, ht) = (low_transition(l), high_transition(h, sfreq));
            (l - lt / 2.0, h + ht / 2.0, lt.min(ht))
        }
        (Some(l), None) => {
            let lt = low_transition(l);
            (l - lt / 2.0, nyq, lt)
        }
        (None, Some(h)) => {
            let ht = high_transition(h, sfreq);
            (0.0, h + ht / 2.0, ht)
        }
        (None, None) => bail!("filter needs at least one of l_freq / h_freq"),
    };

    Ok(firwin(filter_length(trans, sfreq), lo, hi, sfreq))
}

/// Hamming-windowed sinc with a single passband `[lo, hi]` Hz.
///
/// `lo = 0` is a lowpass, `hi = nyquist` a highpass. Gain is normalised at
/// DC, at Nyquist, or at the band centre respectively (`scipy.signal.firwin`
/// with `scale=True`).
pub fn firwin(n: usize, lo: f64, hi: f64, sfreq: f64) -> Vec<f64> {
    debug_assert!(n % 2 == 1, "linear-phase design needs odd N");
    let nyq = sfreq / 2.0;
    let (left, right) = (lo / nyq, hi / nyq);
    let alpha = (n - 1) as f64 / 2.0;
    let win = hamming(n);

    let mut h: Vec<f64> = (0..n)
        .map(|i| {
            let m = i as f64 - alpha;
            (right * sinc(right * m) - left * sinc(left * m)) * win[i]
        })
        .collect();

    let scale_freq = if left == 0.0 {
        0.0
    } else if right >= 1.0 {
        1.0
    } else {
        (left + right) / 2.0
    };
    let gain: f64 = h
        .iter()
        .enumerate()
        .map(|(i, &v)| v * (PI * (i as f64 - alpha) * scale_freq).cos())
        .sum();
    h.iter_mut().for_each(|v| *v /= gain);
    h
}

/// Normalised sinc, `sin(πx) / (πx)`.
#[inline]
fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

pub fn hamming(n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![1.0];
    }
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

/// Magnitude of the frequency response of `h` at `freq` Hz.
pub fn gain_at(h: &[f64], freq: f64, sfreq: f64) -> f64 {
    let w = 2.0 * PI * freq / sfreq;
    let (re, im) = h.iter().enumerate().fold((0.0, 0.0), |(re, im), (k, &v)| {
        (re + v * (w * k as f64).cos(), im - v * (w * k as f64).sin())
    });
    (re * re + im * im).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mne_tap_counts_at_500hz() {
        // raw.filter(0.5, 20) and raw.filter(1, 8) on 500 Hz data.
        assert_eq!(design_filter(Some(0.5), Some(20.0), 500.0).unwrap().len(), 3301);
        assert_eq!(design_filter(Some(1.0), Some(8.0), 500.0).unwrap().len(), 1651);
    }

    #[test]
    fn bandpass_is_symmetric() {
        let h = design_filter(Some(1.0), Some(8.0), 100.0).unwrap();
        let n = h.len();
        for i in 0..n / 2 {
            approx::assert_abs_diff_eq!(h[i], h[n - 1 - i], epsilon = 1e-12);
        }
    }

    #[test]
    fn bandpass_response() {
        let sfreq = 250.0;
        let h = design_filter(Some(1.0), Some(8.0), sfreq).unwrap();
        assert!(gain_at(&h, 0.0, sfreq) < 0.01);
        approx::assert_abs_diff_eq!(gain_at(&h, 4.0, sfreq), 1.0, epsilon = 0.01);
        assert!(gain_at(&h, 30.0, sfreq) < 0.01);
    }

    #[test]
    fn lowpass_unit_dc_gain() {
        let h = firwin(101, 0.0, 10.0, 256.0);
        approx::assert_abs_diff_eq!(h.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn highpass_blocks_dc() {
        let h = design_filter(Some(0.5), None, 256.0).unwrap();
        assert!(gain_at(&h, 0.0, 256.0) < 0.01);
    }

    #[test]
    fn rejects_inverted_band() {
        assert!(design_filter(Some(20.0), Some(0.5), 500.0).is_err());
        assert!(design_filter(None, None, 500.0).is_err());
        assert!(design_filter(Some(1.0), Some(300.0), 500.0).is_err());
    }
}
