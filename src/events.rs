//! Stimulus events from the trigger channel.
use std::fmt;

use anyhow::Result;
use tracing::debug;

use crate::error::DataError;
use crate::recording::Recording;

/// One stimulus presentation: the trigger value as a string and the sample
/// (index into the recording) where it rises.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub stimulus: String,
    pub sample: usize,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>4} @ {}", self.stimulus, self.sample)
    }
}

/// Rising edges on the stimulus channel (`consecutive='increasing'`).
///
/// A sample is an event when its value is non-zero and larger than the
/// previous one; the value before the first sample counts as zero.
pub fn find_events(recording: &Recording) -> Result<Vec<Event>> {
    let stim = recording.stim_channel()?;
    let mut events = Vec::new();
    let mut prev = 0i64;
    for (sample, &v) in stim.iter().enumerate() {
        let v = v.round() as i64;
        if v != 0 && v > prev {
            events.push(Event { stimulus: v.to_string(), sample });
        }
        prev = v;
    }
    debug!(n_events = events.len(), "found events");
    Ok(events)
}

/// Index of each event's stimulus in `known`.
///
/// Subjects do not all hear every stimulus, so the result is specific to the
/// recording. An id outside `known` is a data error.
pub fn trial_indexes(events: &[Event], known: &[&str]) -> Result<Vec<usize>, DataError> {
    events
        .iter()
        .map(|e| {
            known
                .iter()
                .position(|k| *k == e.stimulus)
                .ok_or_else(|| DataError::UnknownStimulus(e.stimulus.clone()))
        })
        .collect()
}
