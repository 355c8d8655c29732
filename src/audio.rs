//! Stimulus audio and the speech-envelope predictor.
//!
//! ```text
//! wav ─▶ |hilbert(x)| ─▶ resample 100 Hz ─▶ clip ≥ 0 ─▶ ++ 1 s zeros ─▶ ln(· + 10)
//! ```
//!
//! Integer WAVs keep their native sample scale (a 16-bit file yields values
//! in ±32768), so the `+ 10` offset only matters for near-silent stretches.
use std::path::Path;

use hound::{SampleFormat, WavReader};
use rustfft::{num_complex::Complex, FftPlanner};
use thiserror::Error;

use crate::config::TrfConfig;
use crate::resample::resample_1d;
use crate::series::Series;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to read WAV file: {0}")]
    WavRead(#[from] hound::Error),

    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("WAV file has no samples")]
    Empty,
}

/// A mono waveform.
#[derive(Debug, Clone)]
pub struct Wave {
    pub samples: Vec<f64>,
    pub sample_rate: f64,
}

impl Wave {
    pub fn load(path: &Path) -> Result<Self, AudioError> {
        let mut reader = WavReader::open(path)?;
        let spec = reader.spec();
        let samples: Vec<f64> = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Int, 8..=32) => reader
                .samples::<i32>()
                .map(|s| s.map(f64::from))
                .collect::<Result<_, _>>()?,
            (SampleFormat::Float, 32) => reader
                .samples::<f32>()
                .map(|s| s.map(f64::from))
                .collect::<Result<_, _>>()?,
            (format, bits) => {
                return Err(AudioError::UnsupportedFormat(format!("{format:?} {bits}-bit")));
            }
        };
        let channels = spec.channels.max(1) as usize;
        if samples.len() < channels {
            return Err(AudioError::Empty);
        }
        Ok(Self { samples: to_mono(&samples, channels), sample_rate: f64::from(spec.sample_rate) })
    }

    /// Waveform resampled to `sfreq`, for display.
    pub fn resampled(&self, sfreq: f64) -> Series {
        let y = resample_1d(&self.samples, self.sample_rate, sfreq);
        Series::from_signal("wave", 0.0, 1.0 / sfreq, y.into_iter().map(|v| v as f32).collect())
    }
}

/// Average interleaved frames over channels.
fn to_mono(interleaved: &[f64], channels: usize) -> Vec<f64> {
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f64>() / channels as f64)
        .collect()
}

/// Magnitude of the analytic signal (FFT Hilbert transform).
pub fn hilbert_envelope(x: &[f64]) -> Vec<f64> {
    let n = x.len();
    if n == 0 {
        return Vec::new();
    }
    let mut planner = FftPlanner::<f64>::new();
    let mut buf: Vec<Complex<f64>> = x.iter().map(|&v| Complex::new(v, 0.0)).collect();
    planner.plan_fft_forward(n).process(&mut buf);

    // Keep DC (and Nyquist for even n), double positive, drop negative.
    let half = n / 2;
    for (k, b) in buf.iter_mut().enumerate() {
        let gain = if k == 0 || (n % 2 == 0 && k == half) {
            1.0
        } else if k <= (n - 1) / 2 {
            2.0
        } else {
            0.0
        };
        *b *= gain;
    }
    planner.plan_fft_inverse(n).process(&mut buf);
    let scale = 1.0 / n as f64;
    buf.iter().map(|c| c.norm() * scale).collect()
}

/// Log-compressed envelope predictor sampled at `cfg.predictor_sfreq`,
/// followed by `cfg.silence` seconds of (log-offset) silence.
pub fn envelope_predictor(wave: &Wave, cfg: &TrfConfig) -> Series {
    let sfreq = cfg.predictor_sfreq;
    let env = hilbert_envelope(&wave.samples);
    let mut env: Vec<f64> = resample_1d(&env, wave.sample_rate, sfreq)
        .into_iter()
        .map(|v| v.max(0.0))
        .collect();
    env.extend(std::iter::repeat(0.0).take((cfg.silence * sfreq).round() as usize));
    let predictor = env.into_iter().map(|v| (v + cfg.log_offset).ln() as f32).collect();
    Series::from_signal("envelope", 0.0, 1.0 / sfreq, predictor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn envelope_of_am_tone() {
        let sr = 1000.0;
        let x: Vec<f64> = (0..4000)
            .map(|i| {
                let t = i as f64 / sr;
                (1.0 + 0.5 * (2.0 * PI * 2.0 * t).sin()) * (2.0 * PI * 100.0 * t).sin()
            })
            .collect();
        let env = hilbert_envelope(&x);
        for i in (200..3800).step_by(97) {
            let t = i as f64 / sr;
            approx::assert_abs_diff_eq!(env[i], 1.0 + 0.5 * (2.0 * PI * 2.0 * t).sin(), epsilon = 0.02);
        }
    }

    #[test]
    fn predictor_has_silence_tail() {
        let wave = Wave { samples: vec![0.0; 2000], sample_rate: 1000.0 };
        let cfg = TrfConfig::default();
        let p = envelope_predictor(&wave, &cfg);
        assert_eq!(p.axis.n_times, 300);
        approx::assert_abs_diff_eq!(p.axis.tstop(), 3.0, epsilon = 1e-9);
        for &v in p.data.row(0).iter().skip(200) {
            approx::assert_abs_diff_eq!(v, 10f32.ln(), epsilon = 1e-6);
        }
    }

    #[test]
    fn stereo_is_averaged() {
        assert_eq!(to_mono(&[1.0, 3.0, -2.0, 2.0], 2), vec![2.0, 0.0]);
    }

    #[test]
    fn reads_16_bit_wav() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("1.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut w = hound::WavWriter::create(&path, spec).unwrap();
        for s in [0i16, 1000, -1000, 32767] {
            w.write_sample(s).unwrap();
        }
        w.finalize().unwrap();
        let wave = Wave::load(&path).unwrap();
        assert_eq!(wave.samples, vec![0.0, 1000.0, -1000.0, 32767.0]);
        assert_eq!(wave.sample_rate, 8000.0);
    }
}
