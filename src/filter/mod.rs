//! FIR band-pass design and zero-phase application.
//!
//! - [`design`]: Hamming-windowed sinc with MNE's automatic transition bands
//!   and filter length.
//! - [`apply`]: overlap-add convolution with reflect-limited edge padding.

pub mod apply;
pub mod design;

pub use apply::FirFilter;
pub use design::{design_filter, filter_length, firwin, gain_at, hamming, high_transition, low_transition};
