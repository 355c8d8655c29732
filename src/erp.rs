//! Word-locked ERPs, one file per subject.
//!
//! For every subject under `<root>/eeg/`:
//!
//! 1. skip if `<root>/ERPs/<S>/<S>_erp_word.safetensors` exists
//! 2. load, band-pass 0.5–20 Hz, interpolate bad channels
//! 3. events → trial indexes into the stimulus list
//! 4. trial segments from −0.1 s to last word + 1 s, decimated by 5 and
//!    clipped to the recording
//! 5. word epochs [−0.1, 1) s around each onset that fits its segment
//! 6. mean over epochs, minus each sensor's temporal mean
//! 7. write
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::{ensure_dir, DataLayout, ErpConfig, STIMULI};
use crate::epoch::{average_epochs, variable_length_epochs, word_epochs};
use crate::events::{find_events, trial_indexes};
use crate::io::write_erp;
use crate::recording::Recording;
use crate::series::Series;
use crate::words::WordTable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectOutcome {
    /// Output already present; nothing was read or computed.
    Skipped(PathBuf),
    Written(PathBuf),
}

pub struct ErpPipeline {
    layout: DataLayout,
    cfg: ErpConfig,
    /// One table per entry of [`STIMULI`].
    word_tables: Vec<WordTable>,
}

impl ErpPipeline {
    /// Load the word tables of all stimuli.
    pub fn new(layout: DataLayout, cfg: ErpConfig) -> Result<Self> {
        let word_tables = STIMULI
            .iter()
            .map(|s| WordTable::load(&layout.word_table_path(s)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { layout, cfg, word_tables })
    }

    /// Process every subject in order, stopping at the first error.
    pub fn run(&self) -> Result<Vec<(String, SubjectOutcome)>> {
        let subjects = self.layout.subjects()?;
        info!(n_subjects = subjects.len(), root = %self.layout.root.display(), "ERP run");
        subjects
            .into_iter()
            .map(|s| {
                let outcome = self.process_subject(&s)?;
                Ok((s, outcome))
            })
            .collect()
    }

    pub fn process_subject(&self, subject: &str) -> Result<SubjectOutcome> {
        ensure_dir(&self.layout.erp_dir(subject))?;
        let out = self.layout.erp_path(subject);
        if out.exists() {
            warn!(subject, path = %out.display(), "ERP exists, skipping");
            return Ok(SubjectOutcome::Skipped(out));
        }

        let mut raw = Recording::read_fif(self.layout.raw_path(subject))?;
        let erp = subject_erp(&mut raw, &self.word_tables, &self.cfg, subject)
            .with_context(|| format!("subject {subject}"))?;
        write_erp(&erp, &out)?;
        info!(subject, path = %out.display(), "wrote ERP");
        Ok(SubjectOutcome::Written(out))
    }
}

/// Steps 2–6 on an already loaded recording. `word_tables` is indexed like
/// [`STIMULI`].
pub fn subject_erp(
    raw: &mut Recording,
    word_tables: &[WordTable],
    cfg: &ErpConfig,
    subject: &str,
) -> Result<Series> {
    raw.filter(cfg.l_freq, cfg.h_freq)?;
    raw.interpolate_bads()?;

    let events = find_events(raw)?;
    let trials = trial_indexes(&events, &STIMULI)?;
    let tstops: Vec<f64> = trials.iter().map(|&i| word_tables[i].duration(cfg.tstop)).collect();
    let segments = variable_length_epochs(raw, &events, cfg.segment_tmin, &tstops, cfg.decim)?;

    let onsets = trials.iter().map(|&i| word_tables[i].time.as_slice());
    let epochs = collect_word_epochs(&segments, onsets, cfg);
    let n_words: usize = trials.iter().map(|&i| word_tables[i].time.len()).sum();
    debug!(subject, kept = epochs.len(), discarded = n_words - epochs.len(), "word epochs");
    average_epochs(&epochs, subject)
}

/// Word epochs of every segment, paired with its onsets in order.
pub fn collect_word_epochs<'a>(
    segments: &[Series],
    onsets: impl IntoIterator<Item = &'a [f64]>,
    cfg: &ErpConfig,
) -> Vec<Series> {
    segments
        .iter()
        .zip(onsets)
        .flat_map(|(seg, on)| word_epochs(seg, on, cfg.tstart, cfg.tstop))
        .collect()
}
