//! Word onset tables (`<root>/predictors/<id>~word.json`).
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Word onsets of one stimulus, in seconds from stimulus start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTable {
    pub time: Vec<f64>,
    #[serde(default)]
    pub word: Vec<String>,
}

impl WordTable {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("open {}", path.display()))?;
        let table: WordTable =
            serde_json::from_slice(&bytes).with_context(|| format!("parse {}", path.display()))?;
        table.validate().with_context(|| format!("in {}", path.display()))?;
        Ok(table)
    }

    fn validate(&self) -> Result<()> {
        if self.time.is_empty() {
            bail!("word table has no onsets");
        }
        if !self.word.is_empty() && self.word.len() != self.time.len() {
            bail!("{} words but {} onsets", self.word.len(), self.time.len());
        }
        if self.time.windows(2).any(|w| w[1] < w[0]) {
            bail!("word onsets are not ascending");
        }
        Ok(())
    }

    /// Onset of the last word.
    pub fn last_onset(&self) -> f64 {
        self.time.last().copied().unwrap_or(0.0)
    }

    /// Trial segment length: last onset plus the post-word margin.
    pub fn duration(&self, margin: f64) -> f64 {
        self.last_onset() + margin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_and_measures_duration() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("1~word.json");
        fs::write(&path, r#"{"time": [0.2, 0.5, 0.6], "word": ["Alice", "was", "beginning"]}"#).unwrap();
        let t = WordTable::load(&path).unwrap();
        assert_eq!(t.word[0], "Alice");
        approx::assert_abs_diff_eq!(t.duration(1.0), 1.6, epsilon = 1e-12);
    }

    #[test]
    fn words_are_optional() {
        let t: WordTable = serde_json::from_str(r#"{"time": [0.2]}"#).unwrap();
        assert!(t.word.is_empty());
        assert!(t.validate().is_ok());
    }

    #[test]
    fn rejects_descending_onsets() {
        let t = WordTable { time: vec![0.5, 0.2], word: vec![] };
        assert!(t.validate().is_err());
    }
}
