//! Trial segments, word-locked epochs and their average.
//!
//! ```text
//! recording ──variable_length_epochs──▶ one segment per event
//!                                        [tmin, tstopᵢ), every decim-th sample
//! segment ──word_epochs──▶ [onset+tstart, onset+tstop) per word, re-timed to tstart
//! epochs ──average_epochs──▶ case mean, then per-sensor temporal mean removed
//! ```
use anyhow::Result;
use ndarray::{s, Array2, Axis};
use tracing::debug;

use crate::error::DataError;
use crate::events::Event;
use crate::normalize::subtract_time_mean;
use crate::recording::Recording;
use crate::series::{Series, TimeAxis};

/// Slack for comparing times that went through float arithmetic.
const TIME_EPS: f64 = 1e-9;

/// One segment per event covering `[tmin, tstops[i])` relative to the event,
/// keeping every `decim`-th sample of the good EEG channels.
///
/// The segment times are relative to the event, starting at the sample
/// nearest `tmin`. Segments are clipped to the recorded samples: one that
/// would start before the first sample begins at the first sample on its
/// decimation grid, and one that would run past the end stops at the last.
/// An event outside the recording is an error.
pub fn variable_length_epochs(
    recording: &Recording,
    events: &[Event],
    tmin: f64,
    tstops: &[f64],
    decim: usize,
) -> Result<Vec<Series>> {
    if events.len() != tstops.len() {
        return Err(DataError::ShapeMismatch(format!(
            "{} events but {} segment durations",
            events.len(),
            tstops.len()
        ))
        .into());
    }
    let decim = decim.max(1) as i64;
    let picks = recording.good_eeg_picks();
    let ch_names: Vec<String> = picks.iter().map(|&i| recording.channels[i].name.clone()).collect();
    let sfreq = recording.sfreq;
    let tstep = decim as f64 / sfreq;
    let offset = (tmin * sfreq).round() as i64;
    let n_rec = recording.n_times() as i64;
    let picked = recording.data.select(Axis(0), &picks);

    let mut segments = Vec::with_capacity(events.len());
    for (event, &tstop) in events.iter().zip(tstops) {
        if event.sample as i64 >= n_rec {
            return Err(DataError::SegmentOutOfBounds {
                sample: event.sample,
                tmin,
                tstop,
                n_times: recording.n_times(),
            }
            .into());
        }
        let full = TimeAxis::new(offset as f64 / sfreq, tstep, 0);
        let n_full = full.samples_in(tstop - full.tmin) as i64;
        let start = event.sample as i64 + offset;

        let skip = if start < 0 { (-start + decim - 1) / decim } else { 0 };
        let first = start + skip * decim;
        let available = if first < n_rec { (n_rec - first + decim - 1) / decim } else { 0 };
        let n_times = (n_full - skip).min(available).max(0) as usize;
        if n_times as i64 != n_full {
            debug!(
                sample = event.sample,
                requested = n_full,
                kept = n_times,
                "segment clipped to the recording"
            );
        }

        let axis = TimeAxis::new((offset + skip * decim) as f64 / sfreq, tstep, n_times);
        let data = if n_times == 0 {
            Array2::zeros((picks.len(), 0))
        } else {
            let first = first as usize;
            let end = first + (n_times - 1) * decim as usize + 1;
            picked.slice(s![.., first..end; decim as usize]).to_owned()
        };
        segments.push(Series { axis, ch_names: ch_names.clone(), data });
    }
    Ok(segments)
}

/// Epochs `[onset + tstart, onset + tstop)` for every onset that fits inside
/// `segment`; the rest are skipped. Kept epochs start at `tstart`.
pub fn word_epochs(segment: &Series, onsets: &[f64], tstart: f64, tstop: f64) -> Vec<Series> {
    let axis = segment.axis;
    let n = axis.samples_in(tstop - tstart);
    onsets
        .iter()
        .filter(|&&onset| {
            onset + tstart >= axis.tmin - TIME_EPS && onset + tstop <= axis.tstop() + TIME_EPS
        })
        .filter_map(|&onset| {
            let start = axis.index_of(onset + tstart);
            // Rounding can still push the last sample past the end.
            if start < 0 || start as usize + n > axis.n_times {
                return None;
            }
            Some(segment.slice_samples(start as usize, n).with_tmin(tstart))
        })
        .collect()
}

/// Element-wise mean over epochs followed by per-sensor baseline removal.
pub fn average_epochs(epochs: &[Series], subject: &str) -> Result<Series> {
    let first = epochs
        .first()
        .ok_or_else(|| DataError::NoValidEpochs(subject.to_string()))?;
    let dim = first.data.dim();
    let mut sum = Array2::<f64>::zeros(dim);
    for e in epochs {
        if e.data.dim() != dim || e.ch_names != first.ch_names {
            return Err(DataError::ShapeMismatch(format!(
                "epoch {:?} does not match {:?}",
                e.data.dim(),
                dim
            ))
            .into());
        }
        sum.zip_mut_with(&e.data, |s, &v| *s += v as f64);
    }
    let mut mean = sum.mapv(|v| (v / epochs.len() as f64) as f32);
    subtract_time_mean(&mut mean);
    debug!(subject, n_epochs = epochs.len(), "averaged word epochs");
    Ok(Series { axis: first.axis, ch_names: first.ch_names.clone(), data: mean })
}
