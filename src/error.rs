//! Data errors raised by the analysis steps.
//!
//! Everything else (I/O, malformed files) travels as plain `anyhow` errors
//! with context; these variants are the ones callers may want to match on
//! via `err.downcast_ref::<DataError>()`.
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DataError {
    #[error("event names stimulus {0:?}, which is not one of the known stimuli")]
    UnknownStimulus(String),

    #[error("no word epoch fits inside any trial segment of subject {0}")]
    NoValidEpochs(String),

    #[error("segment [{tmin:.3}, {tstop:.3}) s for event at sample {sample} is outside the recording ({n_times} samples)")]
    SegmentOutOfBounds { sample: usize, tmin: f64, tstop: f64, n_times: usize },

    #[error("recording has no stimulus channel")]
    NoStimChannel,

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("no channel named {0:?}")]
    UnknownSensor(String),

    #[error("need at least {needed} trials, recording has {found}")]
    TooFewTrials { needed: usize, found: usize },
}
