mod common;
use common::{cap_positions, eeg, stim, write_fif, write_wav, SynthChannel};

use alice_eeg::{figure, split_train_test, trf, DataError, DataLayout, TrfConfig, STIMULI};
use std::fs;

const SFREQ: f32 = 500.0;
const WAV_RATE: u32 = 1000;
const WAV_SECONDS: usize = 3;
const FIRST_EVENT: usize = 1000;
const SPACING: usize = 2500;
const N_TIMES: usize = FIRST_EVENT + 12 * SPACING + 1000;

/// Deterministic white noise in [-1, 1).
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> f32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((self.0 >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
    }
}

/// Slow amplitude modulation of stimulus `k` at time `t` seconds.
fn modulation(k: usize, t: f32) -> f32 {
    let f = 2.0 + 0.3 * k as f32;
    1.2 + (2.0 * std::f32::consts::PI * f * t).sin()
}

fn write_stimuli(layout: &DataLayout) {
    let mut noise = Lcg(7);
    for (k, s) in STIMULI.iter().enumerate() {
        let samples: Vec<i16> = (0..WAV_SECONDS * WAV_RATE as usize)
            .map(|i| {
                let t = i as f32 / WAV_RATE as f32;
                (6000.0 * modulation(k, t) * noise.next()) as i16
            })
            .collect();
        write_wav(&layout.wav_path(s), WAV_RATE, &samples);
    }
}

/// Eight EEG sensors following each stimulus' modulation 100 ms late, plus
/// noise; sensor "8" is flagged bad.
fn write_subject(layout: &DataLayout, subject: &str, n_events: usize) {
    let mut noise = Lcg(11);
    let mut chs: Vec<SynthChannel> = cap_positions(8)
        .into_iter()
        .enumerate()
        .map(|(c, pos)| eeg(&(c + 1).to_string(), pos, vec![0.0; N_TIMES]))
        .collect();
    let mut trig = vec![0.0f32; N_TIMES];
    for k in 0..n_events {
        let onset = FIRST_EVENT + k * SPACING;
        trig[onset..onset + 5].fill((k + 1) as f32);
        for i in 0..WAV_SECONDS * SFREQ as usize {
            let t = i as f32 / SFREQ - 0.1;
            if t < 0.0 {
                continue;
            }
            for (c, ch) in chs.iter_mut().enumerate() {
                let gain = if c % 2 == 0 { 1.0 } else { -0.5 };
                ch.samples[onset + i] = 5e-6 * gain * modulation(k, t);
            }
        }
    }
    for ch in chs.iter_mut() {
        for v in ch.samples.iter_mut() {
            *v += 1e-6 * noise.next();
        }
    }
    chs.push(stim(trig));

    let path = layout.raw_path(subject);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    write_fif(&path, SFREQ, &chs, &["8"]);
}

fn config() -> TrfConfig {
    TrfConfig { subject: "S13".into(), sensor: "2".into(), ..TrfConfig::default() }
}

#[test]
fn held_out_prediction_matches_the_held_out_trial() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(tmp.path());
    write_stimuli(&layout);
    write_subject(&layout, "S13", 12);

    let cfg = config();
    let analysis = trf::run(&layout, &cfg).unwrap();

    assert_eq!(analysis.trials.len(), 12);
    assert_eq!(analysis.train, 0..11);
    assert_eq!(analysis.test, 11);
    assert!(!analysis.train.contains(&analysis.test));

    // 3 s of audio plus 1 s of silence at 100 Hz.
    for t in &analysis.trials {
        assert_eq!(t.envelope.axis.n_times, 400);
        assert_eq!(t.eeg.data.dim(), (7, 400));
    }
    assert_eq!(analysis.train_eeg.axis.n_times, 11 * 400);
    assert_eq!(analysis.train_envelope.axis.n_times, 11 * 400);

    // Bad sensor is left out of the fit.
    assert_eq!(analysis.trf.ch_names, vec!["1", "2", "3", "4", "5", "6", "7"]);
    assert_eq!(analysis.trf.h.dim(), (7, 60));
    approx::assert_abs_diff_eq!(analysis.trf.time.tmin, -0.1, epsilon = 1e-9);

    let held_out = analysis.held_out();
    assert_eq!(held_out.event.stimulus, "12");
    assert_eq!(analysis.predicted.data.dim(), held_out.eeg.data.dim());
    assert_eq!(analysis.r_predicted.len(), 7);
    for r in analysis.r_predicted.iter().chain(&analysis.trf.r) {
        assert!((-1.0..=1.0).contains(r), "r = {r}");
    }
    // The response is a delayed copy of the modulation.
    assert!(analysis.trf.r.iter().any(|&r| r > 0.2), "training r = {:?}", analysis.trf.r);
    assert_eq!(analysis.positions.len(), 7);

    let paths = figure::render_all(&analysis, &cfg, &layout).unwrap();
    for p in &paths {
        let svg = fs::read_to_string(p).unwrap();
        assert!(svg.contains("<svg"), "{} is not an SVG", p.display());
    }
    assert!(paths[0].ends_with("Deconvolution.svg"));
}

#[test]
fn fewer_than_twelve_trials_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(tmp.path());
    write_stimuli(&layout);
    write_subject(&layout, "S13", 5);

    let err = trf::run(&layout, &config()).unwrap_err();
    assert_eq!(
        err.downcast_ref::<DataError>(),
        Some(&DataError::TooFewTrials { needed: 12, found: 5 })
    );
}

#[test]
fn split_uses_the_first_trials_for_training() {
    let (train, test) = split_train_test(14, 11).unwrap();
    assert_eq!(train, 0..11);
    assert_eq!(test, 11);
}
