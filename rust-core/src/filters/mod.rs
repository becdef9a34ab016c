//! IIR filtering: the biquad primitive and the three-band equalizer

pub mod biquad;
pub mod equalizer;

pub use biquad::{BiquadCoefficients, BiquadFilter, BiquadType};
pub use equalizer::{Band, BandConfig, EqConfig, EqGains, EqualizerBank};
