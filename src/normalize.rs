//! Baseline removal and z-scoring.
//!
//! `subtract_time_mean`  — for each channel: data[ch, :] -= mean(data[ch, :])
//!
//! `zscore` — (y − μ) / σ with the population σ, used for traces that
//!   share an axis in the figure
use ndarray::Array2;

/// Per-channel baseline: subtract each row's mean over time.
pub fn subtract_time_mean(data: &mut Array2<f32>) {
    for mut row in data.rows_mut() {
        let n = row.len();
        if n == 0 {
            continue;
        }
        let m = (row.iter().map(|&v| v as f64).sum::<f64>() / n as f64) as f32;
        row.mapv_inplace(|v| v - m);
    }
}

/// Mean and population standard deviation.
pub fn mean_std(x: &[f32]) -> (f64, f64) {
    if x.is_empty() {
        return (0.0, 0.0);
    }
    let n = x.len() as f64;
    let mean = x.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = x
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean, var.sqrt())
}

/// Z-scored copy of `x`. A constant signal is only centred.
pub fn zscore(x: &[f32]) -> Vec<f32> {
    let (mean, std) = mean_std(x);
    let scale = if std > 0.0 { std } else { 1.0 };
    x.iter().map(|&v| ((v as f64 - mean) / scale) as f32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_have_zero_mean() {
        let mut data = Array2::from_shape_fn((6, 300), |(c, t)| {
            (c as f32 * 1.3 + t as f32 * 0.07).sin() * 20.0 + c as f32 * 4.0
        });
        subtract_time_mean(&mut data);
        for row in data.rows() {
            let m = row.iter().map(|&v| v as f64).sum::<f64>() / row.len() as f64;
            approx::assert_abs_diff_eq!(m, 0.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn zscore_mean_zero_std_one() {
        let x: Vec<f32> = (0..512).map(|t| (t as f32 * 0.1).sin() * 50.0 + 3.0).collect();
        let (m, s) = mean_std(&zscore(&x));
        approx::assert_abs_diff_eq!(m, 0.0, epsilon = 1e-5);
        approx::assert_abs_diff_eq!(s, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn zscore_constant_signal_no_panic() {
        let z = zscore(&[7.0; 16]);
        for v in z {
            approx::assert_abs_diff_eq!(v, 0.0, epsilon = 1e-6_f32);
        }
    }
}
