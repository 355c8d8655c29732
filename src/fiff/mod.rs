//! Minimal FIFF (`.fif`) reader for continuous EEG recordings.
//!
//! ```no_run
//! use alice_eeg::fiff::read_raw_fif;
//!
//! let raw = read_raw_fif("S01_alice-raw.fif").unwrap();
//! println!("{} channels @ {} Hz", raw.info.chs.len(), raw.info.sfreq);
//! ```
pub mod constants;
pub mod info;
pub mod raw;
pub mod tag;
pub mod tree;

pub use info::{ChannelInfo, MeasInfo};
pub use raw::{read_raw_fif, RawFif};
pub use tag::{Tag, TagReader};
pub use tree::Block;
