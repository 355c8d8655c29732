//! # alice-eeg — word ERPs and envelope TRFs for the Alice EEG dataset
//!
//! Subjects listened to twelve segments of *Alice's Adventures in
//! Wonderland* while EEG was recorded. This crate reads the raw FIFF
//! recordings and produces two analyses:
//!
//! ```text
//! eeg/S01/S01_alice-raw.fif                  stimuli/{1..12}.wav + .csv
//!   │                                           │
//!   ├─ fiff::read_raw_fif()   native reader     ├─ words::WordTable  onsets
//!   ├─ Recording::filter()    FIR band-pass     └─ audio::envelope_predictor()
//!   ├─ interpolate_bads()     spherical spline        Hilbert → 100 Hz → log
//!   ├─ events::find_events()  stim rising edges         │
//!   ├─ epoch::variable_length_epochs()                  │
//!   │     │                                             │
//!   │     ├─ word_epochs + average_epochs ─→ ERPs/S01/S01_erp_word.safetensors
//!   │     │
//!   │     └─ boosting::boosting() (train) ←────────────┘
//!   │           └─ convolve() → r per sensor (held-out trial)
//!   │
//!   └─ figure::render_deconvolution()  → figures/Deconvolution.svg
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use alice_eeg::{DataLayout, ErpConfig, ErpPipeline};
//!
//! let layout = DataLayout::new(DataLayout::default_root());
//! let pipeline = ErpPipeline::new(layout, ErpConfig::default()).unwrap();
//! for (subject, outcome) in pipeline.run().unwrap() {
//!     println!("{subject}: {outcome:?}");
//! }
//! ```
//!
//! ## Running individual steps
//!
//! ```no_run
//! use alice_eeg::{Recording, find_events, variable_length_epochs};
//!
//! let mut raw = Recording::read_fif("S01_alice-raw.fif").unwrap();
//! raw.filter(0.5, 20.0).unwrap();
//! raw.interpolate_bads().unwrap();
//!
//! let events = find_events(&raw).unwrap();
//! let segments = variable_length_epochs(&raw, &events, -0.1, &[60.0; 12], 5).unwrap();
//! println!("{} segments of {:?}", segments.len(), segments[0].data.dim());
//! ```

pub mod audio;
pub mod boosting;
pub mod config;
pub mod epoch;
pub mod erp;
pub mod error;
pub mod events;
pub mod fiff;
pub mod figure;
pub mod filter;
pub mod io;
pub mod normalize;
pub mod recording;
pub mod resample;
pub mod series;
pub mod trf;
pub mod words;

// ── Crate-root re-exports ─────────────────────────────────────────────────

// config
pub use config::{BoostingConfig, DataLayout, ErpConfig, TrfConfig, STIMULI};

// data model
pub use error::DataError;
pub use recording::{Channel, Recording};
pub use series::{concatenate_time, Series, TimeAxis};

// pipeline steps
pub use audio::{envelope_predictor, AudioError, Wave};
pub use boosting::{boosting, convolve, correlation_coefficient, Trf};
pub use epoch::{average_epochs, variable_length_epochs, word_epochs};
pub use events::{find_events, trial_indexes, Event};
pub use filter::FirFilter;
pub use words::WordTable;

// io — safetensors helpers
pub use io::{read_erp, write_erp, StWriter};

// analyses
pub use erp::{subject_erp, ErpPipeline, SubjectOutcome};
pub use trf::{split_train_test, Trial, TrfAnalysis};
