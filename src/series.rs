//! Uniformly sampled multichannel time series.
use anyhow::Result;
use ndarray::{concatenate, s, Array1, Array2, ArrayView1, Axis};

use crate::error::DataError;

/// `n_times` samples starting at `tmin`, spaced `tstep` seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeAxis {
    pub tmin: f64,
    pub tstep: f64,
    pub n_times: usize,
}

impl TimeAxis {
    pub fn new(tmin: f64, tstep: f64, n_times: usize) -> Self {
        Self { tmin, tstep, n_times }
    }

    /// End of the axis (exclusive): `tmin + n_times · tstep`.
    pub fn tstop(&self) -> f64 {
        self.tmin + self.n_times as f64 * self.tstep
    }

    pub fn time(&self, i: usize) -> f64 {
        self.tmin + i as f64 * self.tstep
    }

    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.n_times).map(|i| self.time(i))
    }

    /// Nearest sample index for time `t` (may fall outside the axis).
    pub fn index_of(&self, t: f64) -> i64 {
        ((t - self.tmin) / self.tstep).round() as i64
    }

    /// Number of samples covering a duration.
    pub fn samples_in(&self, duration: f64) -> usize {
        (duration / self.tstep).round().max(0.0) as usize
    }

    fn same_rate(&self, other: &TimeAxis) -> bool {
        (self.tstep - other.tstep).abs() <= 1e-9 * self.tstep.abs().max(1e-12)
    }
}

/// `[n_channels, n_times]` data on a [`TimeAxis`].
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub axis: TimeAxis,
    pub ch_names: Vec<String>,
    pub data: Array2<f32>,
}

impl Series {
    pub fn new(axis: TimeAxis, ch_names: Vec<String>, data: Array2<f32>) -> Result<Self, DataError> {
        if data.dim() != (ch_names.len(), axis.n_times) {
            return Err(DataError::ShapeMismatch(format!(
                "data {:?} vs {} channels × {} samples",
                data.dim(),
                ch_names.len(),
                axis.n_times
            )));
        }
        Ok(Self { axis, ch_names, data })
    }

    /// Single-channel series.
    pub fn from_signal(name: &str, tmin: f64, tstep: f64, signal: Vec<f32>) -> Self {
        let n = signal.len();
        let data = Array1::from(signal).insert_axis(Axis(0));
        Self { axis: TimeAxis::new(tmin, tstep, n), ch_names: vec![name.to_string()], data }
    }

    pub fn n_channels(&self) -> usize {
        self.ch_names.len()
    }

    pub fn channel_index(&self, name: &str) -> Result<usize, DataError> {
        self.ch_names
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| DataError::UnknownSensor(name.to_string()))
    }

    pub fn channel(&self, name: &str) -> Result<ArrayView1<'_, f32>, DataError> {
        Ok(self.data.row(self.channel_index(name)?))
    }

    /// `n` samples starting at sample `start`.
    pub fn slice_samples(&self, start: usize, n: usize) -> Series {
        Series {
            axis: TimeAxis::new(self.axis.time(start), self.axis.tstep, n),
            ch_names: self.ch_names.clone(),
            data: self.data.slice(s![.., start..start + n]).to_owned(),
        }
    }

    /// Same data, time axis shifted so it starts at `tmin`.
    pub fn with_tmin(mut self, tmin: f64) -> Series {
        self.axis.tmin = tmin;
        self
    }

    /// Mean over time for each channel.
    pub fn time_mean(&self) -> Array1<f64> {
        self.data
            .rows()
            .into_iter()
            .map(|r| r.iter().map(|&v| v as f64).sum::<f64>() / r.len().max(1) as f64)
            .collect()
    }

    /// Samples whose time falls in `[t0, t1)`, paired with their times.
    pub fn window(&self, channel: usize, t0: f64, t1: f64) -> Vec<(f64, f32)> {
        self.axis
            .times()
            .zip(self.data.row(channel).iter().copied())
            .filter(|(t, _)| *t >= t0 && *t < t1)
            .collect()
    }
}

/// Join series end to end along time. The result starts at the first
/// series' `tmin`; every part must share channels and sampling rate.
pub fn concatenate_time(parts: &[Series]) -> Result<Series> {
    let first = parts
        .first()
        .ok_or_else(|| DataError::ShapeMismatch("nothing to concatenate".into()))?;
    for p in &parts[1..] {
        if p.ch_names != first.ch_names || !p.axis.same_rate(&first.axis) {
            return Err(DataError::ShapeMismatch(format!(
                "cannot concatenate {} channels @ {} s with {} channels @ {} s",
                p.n_channels(),
                p.axis.tstep,
                first.n_channels(),
                first.axis.tstep
            ))
            .into());
        }
    }
    let views: Vec<_> = parts.iter().map(|p| p.data.view()).collect();
    let data = concatenate(Axis(1), &views)?;
    let n_times = data.ncols();
    Ok(Series {
        axis: TimeAxis::new(first.axis.tmin, first.axis.tstep, n_times),
        ch_names: first.ch_names.clone(),
        data,
    })
}
