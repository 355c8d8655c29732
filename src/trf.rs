//! Envelope TRF for one subject: fit on the first trials, predict the next.
use std::ops::Range;

use anyhow::{Context, Result};
use tracing::info;

use crate::audio::{envelope_predictor, Wave};
use crate::boosting::{boosting, convolve, correlation_coefficient, Trf};
use crate::config::{DataLayout, TrfConfig};
use crate::epoch::variable_length_epochs;
use crate::error::DataError;
use crate::events::{find_events, Event};
use crate::recording::Recording;
use crate::series::{concatenate_time, Series};

/// Everything known about one presented stimulus.
#[derive(Debug, Clone)]
pub struct Trial {
    pub event: Event,
    /// Waveform at the display rate.
    pub stimulus: Series,
    pub envelope: Series,
    pub eeg: Series,
}

/// Trials used for fitting and the held-out trial.
///
/// The two are disjoint and together cover the first `n_train + 1` trials.
pub fn split_train_test(n_trials: usize, n_train: usize) -> Result<(Range<usize>, usize), DataError> {
    if n_trials < n_train + 1 {
        return Err(DataError::TooFewTrials { needed: n_train + 1, found: n_trials });
    }
    Ok((0..n_train, n_train))
}

#[derive(Debug, Clone)]
pub struct TrfAnalysis {
    pub trials: Vec<Trial>,
    pub train: Range<usize>,
    pub test: usize,
    /// Concatenated training EEG and predictor.
    pub train_eeg: Series,
    pub train_envelope: Series,
    pub trf: Trf,
    pub predicted: Series,
    /// Correlation of predicted and measured held-out EEG, per sensor.
    pub r_predicted: Vec<f64>,
    /// Sensor positions (metres), same order as `trf.ch_names`.
    pub positions: Vec<[f64; 3]>,
}

impl TrfAnalysis {
    pub fn held_out(&self) -> &Trial {
        &self.trials[self.test]
    }

    /// One log line per trial: stimulus, onset sample, predictor length.
    pub fn log_summary(&self) {
        for (i, t) in self.trials.iter().enumerate() {
            let role = if self.train.contains(&i) {
                "train"
            } else if i == self.test {
                "test"
            } else {
                "unused"
            };
            info!(
                trial = i,
                event = %t.event,
                duration = t.envelope.axis.tstop(),
                role,
                "trial"
            );
        }
    }
}

/// Load the subject and stimuli from `layout` and run [`analyze`].
pub fn run(layout: &DataLayout, cfg: &TrfConfig) -> Result<TrfAnalysis> {
    let mut raw = Recording::read_fif(layout.raw_path(&cfg.subject))?;
    analyze(&mut raw, |stimulus| {
        let path = layout.wav_path(stimulus);
        Wave::load(&path).with_context(|| format!("open {}", path.display()))
    }, cfg)
}

/// Filter `raw`, build predictors from the waves returned by `load_wave`,
/// fit on the training trials and evaluate on the held-out one.
pub fn analyze<F>(raw: &mut Recording, mut load_wave: F, cfg: &TrfConfig) -> Result<TrfAnalysis>
where
    F: FnMut(&str) -> Result<Wave>,
{
    raw.filter(cfg.l_freq, cfg.h_freq)?;
    let events = find_events(raw)?;
    let (train, test) = split_train_test(events.len(), cfg.n_train)?;

    let mut stimuli = Vec::with_capacity(events.len());
    let mut envelopes = Vec::with_capacity(events.len());
    for e in &events {
        let wave = load_wave(&e.stimulus)?;
        stimuli.push(wave.resampled(cfg.display_sfreq));
        envelopes.push(envelope_predictor(&wave, cfg));
    }
    let durations: Vec<f64> = envelopes.iter().map(|e| e.axis.tstop()).collect();
    let eeg = variable_length_epochs(raw, &events, 0.0, &durations, cfg.decim)?;

    let trials: Vec<Trial> = events
        .into_iter()
        .zip(stimuli)
        .zip(envelopes)
        .zip(eeg)
        .map(|(((event, stimulus), envelope), eeg)| Trial { event, stimulus, envelope, eeg })
        .collect();

    let train_eeg = concatenate_time(&trials[train.clone()].iter().map(|t| t.eeg.clone()).collect::<Vec<_>>())?;
    let train_envelope =
        concatenate_time(&trials[train.clone()].iter().map(|t| t.envelope.clone()).collect::<Vec<_>>())?;
    let trf = boosting(&train_eeg, &train_envelope, &cfg.boosting)?;

    let held_out = &trials[test];
    let predicted = convolve(&trf, &held_out.envelope)?;
    let r_predicted = correlation_coefficient(&held_out.eeg, &predicted)?;
    let r_max = r_predicted.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    info!(subject = %cfg.subject, stimulus = %held_out.event.stimulus, r_max, "held-out prediction");

    let positions = trf
        .ch_names
        .iter()
        .map(|n| raw.channel_index(n).map(|i| raw.channels[i].pos).unwrap_or([0.0; 3]))
        .collect();

    Ok(TrfAnalysis { trials, train, test, train_eeg, train_envelope, trf, predicted, r_predicted, positions })
}
