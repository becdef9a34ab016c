//! Signal Lab - Real-time Audio Equalizer and Spectrum Core
//!
//! Captures live or decoded audio, reframes it into fixed frames, runs a
//! three-band biquad equalizer with automatic level control, and produces
//! magnitude spectra for display. Optional Python bindings.

// Suppress PyO3 non-local impl warnings (harmless macro-generated code)
#![cfg_attr(feature = "python", allow(non_local_definitions))]

pub mod audio;
pub mod config;
pub mod error;
pub mod filters;
pub mod pipeline;
pub mod sample;
pub mod spectrum;

#[cfg(feature = "python")]
pub mod python_bindings;

pub use config::PipelineConfig;
pub use error::{AudioError, Result};
pub use filters::{BiquadFilter, BiquadType, EqualizerBank};
pub use pipeline::AudioPipeline;
pub use spectrum::SpectrumAnalyzer;
