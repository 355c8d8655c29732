//! Analysis parameters and data-directory layout.
//!
//! The two analyses are fixed recipes: [`ErpConfig::default()`] and
//! [`TrfConfig::default()`] hold the values used for the published figures.
//! Fields are `pub` so tests can shrink them with struct-update syntax:
//!
//! ```
//! use alice_eeg::ErpConfig;
//!
//! let cfg = ErpConfig { decim: 1, ..ErpConfig::default() };
//! assert_eq!(cfg.tstart, -0.1);
//! ```
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Stimulus identifiers, in trial-index order.
pub const STIMULI: [&str; 12] = ["1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12"];

/// Word-locked ERP parameters.
#[derive(Debug, Clone)]
pub struct ErpConfig {
    /// Band-pass edges in Hz.
    ///
    /// Default: `0.5`–`20` Hz.
    pub l_freq: f64,
    pub h_freq: f64,

    /// Epoch window relative to word onset, seconds.
    ///
    /// `tstop` doubles as the margin added after the last word of a stimulus
    /// when cutting trial segments.
    ///
    /// Default: `[-0.1, 1.0]`.
    pub tstart: f64,
    pub tstop: f64,

    /// Trial segments start this long before the stimulus event.
    ///
    /// Default: `-0.1` s.
    pub segment_tmin: f64,

    /// Decimation applied when cutting trial segments.
    ///
    /// Default: `5`.
    pub decim: usize,
}

impl Default for ErpConfig {
    fn default() -> Self {
        Self {
            l_freq: 0.5,
            h_freq: 20.0,
            tstart: -0.1,
            tstop: 1.0,
            segment_tmin: -0.1,
            decim: 5,
        }
    }
}

/// Boosting hyper-parameters.
#[derive(Debug, Clone)]
pub struct BoostingConfig {
    /// Lag window `[tmin, tstop)` in seconds.
    pub tmin: f64,
    pub tstop: f64,
    /// Width of the Hamming basis window in seconds (`0` disables the basis).
    pub basis: f64,
    /// Number of contiguous cross-validation partitions.
    pub partitions: usize,
    /// Step size on the normalized scale.
    pub delta: f64,
    /// Number of times `delta` may be halved before a fit stops.
    pub delta_halvings: u32,
    /// Steps without validation improvement before a fit stops.
    pub patience: usize,
    /// Hard cap on boosting steps per partition.
    pub max_steps: usize,
}

impl Default for BoostingConfig {
    fn default() -> Self {
        Self {
            tmin: -0.1,
            tstop: 0.5,
            basis: 0.05,
            partitions: 4,
            delta: 0.005,
            delta_halvings: 4,
            patience: 2,
            max_steps: 10_000,
        }
    }
}

impl BoostingConfig {
    /// Smallest step size tried before giving up.
    pub fn mindelta(&self) -> f64 {
        self.delta / f64::from(1u32 << self.delta_halvings)
    }
}

/// Deconvolution figure parameters.
#[derive(Debug, Clone)]
pub struct TrfConfig {
    pub subject: String,
    /// Sensor shown in the EEG and TRF panels.
    pub sensor: String,
    pub l_freq: f64,
    pub h_freq: f64,
    pub decim: usize,
    /// Sampling rate of the envelope predictor.
    ///
    /// Default: `100` Hz, which matches the EEG after decimation of 500 Hz
    /// recordings by 5.
    pub predictor_sfreq: f64,
    /// Sampling rate of the stimulus waveform shown in the figure.
    pub display_sfreq: f64,
    /// Seconds of silence appended to every predictor.
    pub silence: f64,
    /// Constant added to the envelope before the log transform.
    pub log_offset: f64,
    /// Trials used for training; the next one is held out.
    pub n_train: usize,
    pub boosting: BoostingConfig,
    /// Time window of the continuous panels, seconds.
    pub xlim: (f64, f64),
    /// Latencies of the TRF topography array, seconds.
    pub topo_times: Vec<f64>,
}

impl Default for TrfConfig {
    fn default() -> Self {
        Self {
            subject: "S13".into(),
            sensor: "19".into(),
            l_freq: 1.0,
            h_freq: 8.0,
            decim: 5,
            predictor_sfreq: 100.0,
            display_sfreq: 2000.0,
            silence: 1.0,
            log_offset: 10.0,
            n_train: 11,
            boosting: BoostingConfig::default(),
            xlim: (11.0, 16.0),
            topo_times: vec![0.040, 0.150, 0.380],
        }
    }
}

/// File locations under the dataset root (`~/Data/Alice` by default).
///
/// ```text
/// <root>/eeg/<S>/<S>_alice-raw.fif
/// <root>/predictors/<id>~word.json
/// <root>/stimuli/<id>.wav
/// <root>/ERPs/<S>/<S>_erp_word.safetensors
/// <root>/figures/
/// ```
#[derive(Debug, Clone)]
pub struct DataLayout {
    pub root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `~/Data/Alice`, or a relative `Data/Alice` when there is no home directory.
    pub fn default_root() -> PathBuf {
        dirs::home_dir().unwrap_or_default().join("Data").join("Alice")
    }

    pub fn eeg_dir(&self) -> PathBuf {
        self.root.join("eeg")
    }

    pub fn raw_path(&self, subject: &str) -> PathBuf {
        self.eeg_dir().join(subject).join(format!("{subject}_alice-raw.fif"))
    }

    pub fn word_table_path(&self, stimulus: &str) -> PathBuf {
        self.root.join("predictors").join(format!("{stimulus}~word.json"))
    }

    pub fn wav_path(&self, stimulus: &str) -> PathBuf {
        self.root.join("stimuli").join(format!("{stimulus}.wav"))
    }

    pub fn erp_dir(&self, subject: &str) -> PathBuf {
        self.root.join("ERPs").join(subject)
    }

    pub fn erp_path(&self, subject: &str) -> PathBuf {
        self.erp_dir(subject).join(format!("{subject}_erp_word.safetensors"))
    }

    pub fn figure_dir(&self) -> PathBuf {
        self.root.join("figures")
    }

    /// Subject directories under `eeg/`: names starting with `S`, sorted.
    pub fn subjects(&self) -> Result<Vec<String>> {
        let dir = self.eeg_dir();
        let mut subjects = Vec::new();
        for entry in fs::read_dir(&dir).with_context(|| format!("list {}", dir.display()))? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if is_subject_name(name) {
                    subjects.push(name.to_string());
                }
            }
        }
        subjects.sort();
        Ok(subjects)
    }
}

/// `S` followed by anything; only the prefix is checked.
fn is_subject_name(name: &str) -> bool {
    name.starts_with('S')
}

/// Create `dir` and its parents.
pub(crate) fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))
}
