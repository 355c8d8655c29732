//! Boosting estimate of a temporal response function (TRF).
//!
//! Model, per sensor `c`:
//!
//! ```text
//! y_c(t) ≈ Σ_τ h_c(τ) · x(t − τ),     τ ∈ [tmin, tstop)
//! ```
//!
//! Both signals are centred and scaled to unit variance. The predictor is
//! smoothed with a Hamming basis window, and `h` grows by coordinate descent
//! in steps of `±δ` on whichever lag reduces the training error most. The
//! data are cut into `k` contiguous partitions; each one in turn is held out
//! to stop the descent when its error stops improving, and the final kernel
//! is the mean of the `k` fits.
//!
//! Every quantity the descent needs is kept in lag space:
//!
//! ```text
//! R[a, b] = Σ_t x(t − a) x(t − b)       lag auto-correlation, per partition
//! c[a]    = Σ_t r(t) x(t − a)           residual/predictor cross-correlation
//!
//! h[j] += sδ  ⇒  ΔE = δ² R[j, j] − 2 s δ c[j]
//!                c[a] −= s δ R[j, a]
//! ```
//!
//! so a step costs `O(L)` regardless of the signal length.
use anyhow::{bail, Result};
use ndarray::{Array2, ArrayView1};
use tracing::{debug, info};

use crate::config::BoostingConfig;
use crate::error::DataError;
use crate::filter::hamming;
use crate::series::{Series, TimeAxis};

/// A fitted TRF with one kernel per sensor.
#[derive(Debug, Clone)]
pub struct Trf {
    /// `[n_sensors, n_lags]`, on the normalized scale.
    pub h: Array2<f64>,
    /// `h` rescaled so that convolving it with the raw predictor gives data units.
    pub h_scaled: Array2<f64>,
    /// Lag axis; `time.tmin` is the first lag in seconds.
    pub time: TimeAxis,
    pub ch_names: Vec<String>,
    /// Correlation between the data and the fitted response, per sensor.
    pub r: Vec<f64>,
    pub x_mean: f64,
    pub x_scale: f64,
    pub y_mean: Vec<f64>,
    pub y_scale: Vec<f64>,
}

impl Trf {
    /// First lag in samples (negative for acausal lags).
    pub fn first_lag(&self) -> i64 {
        (self.time.tmin / self.time.tstep).round() as i64
    }

    pub fn channel(&self, name: &str) -> Result<ArrayView1<'_, f64>, DataError> {
        let i = self
            .ch_names
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| DataError::UnknownSensor(name.to_string()))?;
        Ok(self.h.row(i))
    }

    /// `h` across sensors at the lag nearest `t` seconds.
    pub fn at_latency(&self, t: f64) -> Vec<f64> {
        let j = self.time.index_of(t).clamp(0, self.time.n_times as i64 - 1) as usize;
        self.h.column(j).to_vec()
    }
}

/// Fit `y ≈ h ∗ x` for every sensor of `y`; `x` must be a single-channel
/// series on the same time axis.
pub fn boosting(y: &Series, x: &Series, cfg: &BoostingConfig) -> Result<Trf> {
    if x.n_channels() != 1 {
        return Err(DataError::ShapeMismatch(format!("predictor has {} channels, need 1", x.n_channels())).into());
    }
    if x.axis.n_times != y.axis.n_times || (x.axis.tstep - y.axis.tstep).abs() > 1e-9 {
        return Err(DataError::ShapeMismatch(format!(
            "predictor {} samples @ {} s vs response {} samples @ {} s",
            x.axis.n_times, x.axis.tstep, y.axis.n_times, y.axis.tstep
        ))
        .into());
    }
    let tstep = y.axis.tstep;
    let n_times = y.axis.n_times;
    let lag_min = (cfg.tmin / tstep).round() as i64;
    let lag_stop = (cfg.tstop / tstep).round() as i64;
    if lag_stop <= lag_min {
        bail!("empty lag window [{}, {}) s", cfg.tmin, cfg.tstop);
    }
    let n_lags = (lag_stop - lag_min) as usize;
    let k = cfg.partitions.max(2);
    if n_times < k * n_lags {
        bail!("{n_times} samples is too short for {k} partitions of a {n_lags}-lag kernel");
    }

    let x_raw: Vec<f64> = x.data.row(0).iter().map(|&v| v as f64).collect();
    let (x_mean, x_scale) = mean_scale(&x_raw);
    let xn: Vec<f64> = x_raw.iter().map(|v| (v - x_mean) / x_scale).collect();
    let basis = basis_window(cfg.basis, tstep);
    let xb = convolve_same(&xn, &basis);

    let bounds: Vec<(usize, usize)> = (0..k).map(|i| (i * n_times / k, (i + 1) * n_times / k)).collect();
    let lagged = Lagged { x: &xb, lag_min, n_lags };
    let r_part: Vec<Array2<f64>> = bounds.iter().map(|&(a, b)| lagged.autocorrelation(a, b)).collect();
    let r_total = r_part.iter().fold(Array2::<f64>::zeros((n_lags, n_lags)), |acc, r| acc + r);
    let r_train: Vec<Array2<f64>> = r_part.iter().map(|r| &r_total - r).collect();

    let n_sensors = y.n_channels();
    let mut h = Array2::<f64>::zeros((n_sensors, n_lags));
    let mut h_scaled = Array2::<f64>::zeros((n_sensors, n_lags));
    let mut r = Vec::with_capacity(n_sensors);
    let mut y_mean = Vec::with_capacity(n_sensors);
    let mut y_scale = Vec::with_capacity(n_sensors);

    for (c, row) in y.data.rows().into_iter().enumerate() {
        let y_raw: Vec<f64> = row.iter().map(|&v| v as f64).collect();
        let (m, s) = mean_scale(&y_raw);
        let yn: Vec<f64> = y_raw.iter().map(|v| (v - m) / s).collect();

        let c_part: Vec<Vec<f64>> = bounds.iter().map(|&(a, b)| lagged.cross_correlation(&yn, a, b)).collect();
        let c_total: Vec<f64> = (0..n_lags).map(|j| c_part.iter().map(|cp| cp[j]).sum()).collect();

        let mut h_sum = vec![0.0; n_lags];
        for p in 0..k {
            let c_train: Vec<f64> = c_total.iter().zip(&c_part[p]).map(|(t, v)| t - v).collect();
            let fit = descend(&r_train[p], c_train, &r_part[p], c_part[p].clone(), cfg);
            debug!(sensor = %y.ch_names[c], partition = p, steps = fit.steps, "boosting partition");
            h_sum.iter_mut().zip(&fit.h).for_each(|(a, b)| *a += b);
        }
        let h_raw: Vec<f64> = h_sum.iter().map(|v| v / k as f64).collect();
        let h_c = convolve_same(&h_raw, &basis);

        let fitted = convolve_lags(&h_c, &xn, lag_min);
        r.push(pearson(&yn, &fitted));
        for (j, &v) in h_c.iter().enumerate() {
            h[[c, j]] = v;
            h_scaled[[c, j]] = v * s / x_scale;
        }
        y_mean.push(m);
        y_scale.push(s);
    }

    let r_max = r.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    info!(n_sensors, n_lags, partitions = k, r_max, "boosting done");
    Ok(Trf {
        h,
        h_scaled,
        time: TimeAxis::new(lag_min as f64 * tstep, tstep, n_lags),
        ch_names: y.ch_names.clone(),
        r,
        x_mean,
        x_scale,
        y_mean,
        y_scale,
    })
}

struct Fit {
    h: Vec<f64>,
    steps: usize,
}

/// Coordinate descent on the training statistics with early stopping on the
/// validation statistics. Returns the kernel with the lowest validation error.
fn descend(
    r_train: &Array2<f64>,
    mut c_train: Vec<f64>,
    r_val: &Array2<f64>,
    mut c_val: Vec<f64>,
    cfg: &BoostingConfig,
) -> Fit {
    let n = c_train.len();
    let mut h = vec![0.0; n];
    let mut best_h = h.clone();
    let mut err_val = 0.0;
    let mut best_err = 0.0;
    let mut since_best = 0;
    let mut delta = cfg.delta;
    let mindelta = cfg.mindelta();
    let mut steps = 0;

    while steps < cfg.max_steps {
        let (j, gain) = (0..n)
            .map(|j| (j, delta * delta * r_train[[j, j]] - 2.0 * delta * c_train[j].abs()))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap_or((0, 0.0));
        if gain >= 0.0 {
            delta /= 2.0;
            if delta < mindelta {
                break;
            }
            continue;
        }
        let step = delta.copysign(c_train[j]);
        err_val += step * step * r_val[[j, j]] - 2.0 * step * c_val[j];
        h[j] += step;
        for i in 0..n {
            c_train[i] -= step * r_train[[j, i]];
            c_val[i] -= step * r_val[[j, i]];
        }
        steps += 1;

        if err_val < best_err - 1e-12 {
            best_err = err_val;
            best_h.copy_from_slice(&h);
            since_best = 0;
        } else {
            since_best += 1;
            if since_best >= cfg.patience {
                break;
            }
        }
    }
    Fit { h: best_h, steps }
}

/// Zero-padded lagged view of a predictor.
struct Lagged<'a> {
    x: &'a [f64],
    lag_min: i64,
    n_lags: usize,
}

impl Lagged<'_> {
    #[inline]
    fn at(&self, t: usize, j: usize) -> f64 {
        let i = t as i64 - (self.lag_min + j as i64);
        if i >= 0 && (i as usize) < self.x.len() {
            self.x[i as usize]
        } else {
            0.0
        }
    }

    fn autocorrelation(&self, start: usize, stop: usize) -> Array2<f64> {
        let n = self.n_lags;
        let mut r = Array2::<f64>::zeros((n, n));
        let mut v = vec![0.0; n];
        for t in start..stop {
            for (j, vj) in v.iter_mut().enumerate() {
                *vj = self.at(t, j);
            }
            for a in 0..n {
                if v[a] == 0.0 {
                    continue;
                }
                for b in a..n {
                    r[[a, b]] += v[a] * v[b];
                }
            }
        }
        for a in 0..n {
            for b in 0..a {
                r[[a, b]] = r[[b, a]];
            }
        }
        r
    }

    fn cross_correlation(&self, y: &[f64], start: usize, stop: usize) -> Vec<f64> {
        (0..self.n_lags)
            .map(|j| (start..stop).map(|t| y[t] * self.at(t, j)).sum())
            .collect()
    }
}

/// Mean and standard deviation; a constant signal gets scale 1.
fn mean_scale(x: &[f64]) -> (f64, f64) {
    let n = x.len().max(1) as f64;
    let mean = x.iter().sum::<f64>() / n;
    let std = (x.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n).sqrt();
    (mean, if std > 0.0 { std } else { 1.0 })
}

/// Unit-sum Hamming window spanning `width` seconds (a single impulse when
/// the width is below two samples).
fn basis_window(width: f64, tstep: f64) -> Vec<f64> {
    let n = (width / tstep).round() as usize;
    if n < 2 {
        return vec![1.0];
    }
    let w = hamming(n);
    let sum: f64 = w.iter().sum();
    w.into_iter().map(|v| v / sum).collect()
}

/// Centred convolution with the output length of `x`.
fn convolve_same(x: &[f64], w: &[f64]) -> Vec<f64> {
    if w.len() == 1 {
        return x.iter().map(|v| v * w[0]).collect();
    }
    let m = (w.len() as i64 - 1) / 2;
    (0..x.len() as i64)
        .map(|t| {
            w.iter()
                .enumerate()
                .filter_map(|(i, wi)| {
                    let k = t - i as i64 + m;
                    (k >= 0 && (k as usize) < x.len()).then(|| wi * x[k as usize])
                })
                .sum()
        })
        .collect()
}

/// `y(t) = Σ_j h[j] · x(t − lag_min − j)` over the length of `x`.
fn convolve_lags(h: &[f64], x: &[f64], lag_min: i64) -> Vec<f64> {
    let lagged = Lagged { x, lag_min, n_lags: h.len() };
    (0..x.len())
        .map(|t| h.iter().enumerate().map(|(j, hj)| hj * lagged.at(t, j)).sum())
        .collect()
}

/// Response predicted by `trf` for the predictor `x` (in data units, up to
/// a constant offset), on the time axis of `x`.
pub fn convolve(trf: &Trf, x: &Series) -> Result<Series> {
    if x.n_channels() != 1 || (x.axis.tstep - trf.time.tstep).abs() > 1e-9 {
        return Err(DataError::ShapeMismatch(format!(
            "cannot convolve a {} s kernel with {} channels @ {} s",
            trf.time.tstep,
            x.n_channels(),
            x.axis.tstep
        ))
        .into());
    }
    let xs: Vec<f64> = x.data.row(0).iter().map(|&v| v as f64).collect();
    let lag_min = trf.first_lag();
    let mut data = Array2::<f32>::zeros((trf.ch_names.len(), xs.len()));
    for (c, mut out) in data.rows_mut().into_iter().enumerate() {
        let h: Vec<f64> = trf.h_scaled.row(c).to_vec();
        for (o, v) in out.iter_mut().zip(convolve_lags(&h, &xs, lag_min)) {
            *o = v as f32;
        }
    }
    Ok(Series { axis: x.axis, ch_names: trf.ch_names.clone(), data })
}

/// Pearson correlation; `0` when either signal is constant.
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let (ma, mb) = (a[..n].iter().sum::<f64>() / n as f64, b[..n].iter().sum::<f64>() / n as f64);
    let (mut sab, mut saa, mut sbb) = (0.0, 0.0, 0.0);
    for (x, y) in a[..n].iter().zip(&b[..n]) {
        let (dx, dy) = (x - ma, y - mb);
        sab += dx * dy;
        saa += dx * dx;
        sbb += dy * dy;
    }
    if saa <= 0.0 || sbb <= 0.0 {
        return 0.0;
    }
    (sab / (saa * sbb).sqrt()).clamp(-1.0, 1.0)
}

/// Correlation over time between matching channels of `a` and `b`.
pub fn correlation_coefficient(a: &Series, b: &Series) -> Result<Vec<f64>> {
    if a.data.dim() != b.data.dim() || a.ch_names != b.ch_names {
        return Err(DataError::ShapeMismatch(format!(
            "cannot correlate {:?} with {:?}",
            a.data.dim(),
            b.data.dim()
        ))
        .into());
    }
    Ok(a.data
        .rows()
        .into_iter()
        .zip(b.data.rows())
        .map(|(ra, rb)| {
            let va: Vec<f64> = ra.iter().map(|&v| v as f64).collect();
            let vb: Vec<f64> = rb.iter().map(|&v| v as f64).collect();
            pearson(&va, &vb)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic broadband signal.
    fn noise(n: usize, seed: u64) -> Vec<f64> {
        let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (0..n)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((state >> 11) as f64 / (1u64 << 53) as f64) - 0.5
            })
            .collect()
    }

    fn kernel(n_lags: usize, lag_min: i64) -> Vec<f64> {
        (0..n_lags)
            .map(|j| {
                let t = (lag_min + j as i64) as f64 * 0.01;
                (-((t - 0.1) / 0.03).powi(2)).exp() - 0.5 * (-((t - 0.25) / 0.05).powi(2)).exp()
            })
            .collect()
    }

    #[test]
    fn recovers_a_known_kernel() {
        let n = 4000;
        let x = noise(n, 7);
        let (lag_min, n_lags) = (-10, 60);
        let h_true = kernel(n_lags, lag_min);
        let y1 = convolve_lags(&h_true, &x, lag_min);
        let y2: Vec<f64> = y1.iter().map(|v| -2.0 * v + 3.0).collect();

        let xs = Series::from_signal("envelope", 0.0, 0.01, x.iter().map(|&v| v as f32).collect());
        let mut data = Array2::<f32>::zeros((2, n));
        for t in 0..n {
            data[[0, t]] = y1[t] as f32;
            data[[1, t]] = y2[t] as f32;
        }
        let ys = Series::new(xs.axis, vec!["1".into(), "2".into()], data).unwrap();
        let cfg = BoostingConfig { basis: 0.0, ..BoostingConfig::default() };
        let trf = boosting(&ys, &xs, &cfg).unwrap();

        assert_eq!(trf.h.dim(), (2, 60));
        approx::assert_abs_diff_eq!(trf.time.tmin, -0.1, epsilon = 1e-12);
        assert!(trf.r[0] > 0.9, "r = {:?}", trf.r);
        assert!(trf.r[1] > 0.9, "r = {:?}", trf.r);
        // Scaled kernel is back in data units.
        let peak = h_true.iter().copied().fold(f64::MIN, f64::max);
        let got = trf.h_scaled.row(0).iter().copied().fold(f64::MIN, f64::max);
        approx::assert_abs_diff_eq!(got, peak, epsilon = 0.25 * peak);
        // The second sensor sees the negated response.
        let low = trf.h_scaled.row(1).iter().copied().fold(f64::MAX, f64::min);
        approx::assert_abs_diff_eq!(low, -2.0 * peak, epsilon = 0.5 * peak);
    }

    #[test]
    fn prediction_keeps_predictor_axis() {
        let n = 1200;
        let x = noise(n, 3);
        let y = convolve_lags(&kernel(60, -10), &x, -10);
        let xs = Series::from_signal("envelope", 0.0, 0.01, x.iter().map(|&v| v as f32).collect());
        let ys = Series::from_signal("19", 0.0, 0.01, y.iter().map(|&v| v as f32).collect());
        let trf = boosting(&ys, &xs, &BoostingConfig::default()).unwrap();

        let x_new = Series::from_signal("envelope", 0.0, 0.01, noise(500, 11).iter().map(|&v| v as f32).collect());
        let pred = convolve(&trf, &x_new).unwrap();
        assert_eq!(pred.axis, x_new.axis);
        assert_eq!(pred.ch_names, vec!["19"]);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let xs = Series::from_signal("envelope", 0.0, 0.01, vec![0.0; 100]);
        let ys = Series::from_signal("1", 0.0, 0.01, vec![0.0; 99]);
        let err = boosting(&ys, &xs, &BoostingConfig::default()).unwrap_err();
        assert!(matches!(err.downcast_ref::<DataError>(), Some(DataError::ShapeMismatch(_))));
    }

    #[test]
    fn autocorrelation_splits_over_partitions() {
        let x = noise(300, 5);
        let lagged = Lagged { x: &x, lag_min: -3, n_lags: 8 };
        let whole = lagged.autocorrelation(0, 300);
        let parts = lagged.autocorrelation(0, 120) + lagged.autocorrelation(120, 300);
        for (a, b) in whole.iter().zip(parts.iter()) {
            approx::assert_abs_diff_eq!(a, b, epsilon = 1e-10);
        }
    }

    #[test]
    fn basis_preserves_dc() {
        let w = basis_window(0.05, 0.01);
        assert_eq!(w.len(), 5);
        approx::assert_abs_diff_eq!(w.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        let y = convolve_same(&[1.0; 20], &w);
        approx::assert_abs_diff_eq!(y[10], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn pearson_bounds() {
        let a = [1.0, 2.0, 3.0, 4.0];
        approx::assert_abs_diff_eq!(pearson(&a, &[2.0, 4.0, 6.0, 8.0]), 1.0, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(pearson(&a, &[-1.0, -2.0, -3.0, -4.0]), -1.0, epsilon = 1e-12);
        assert_eq!(pearson(&a, &[5.0; 4]), 0.0);
    }
}
