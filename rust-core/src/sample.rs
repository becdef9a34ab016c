//! Conversions between the integer I/O domain and the float DSP domain
//!
//! Devices and files carry signed 16-bit PCM. Filtering and FFT run on f64
//! samples normalized to [-1.0, 1.0].

use dasp_sample::Sample;

/// Full-scale magnitude of a 16-bit sample
pub const I16_FULL_SCALE: f64 = 32768.0;

/// Convert a 16-bit sample to a normalized float (exact)
#[inline]
pub fn to_float(sample: i16) -> f64 {
    sample.to_sample::<f64>()
}

/// Convert a normalized float back to 16-bit, hard clipping out-of-range input
///
/// `to_int(to_float(x)) == x` for every `i16`.
#[inline]
pub fn to_int(sample: f64) -> i16 {
    clip_to_i16(sample * I16_FULL_SCALE)
}

/// Narrow a value already in the integer domain, clipping to [-32768, 32767]
#[inline]
pub fn clip_to_i16(value: f64) -> i16 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

/// Convert a block of 16-bit samples into an existing float buffer
pub fn to_float_slice(input: &[i16], output: &mut [f64]) {
    for (out, &s) in output.iter_mut().zip(input.iter()) {
        *out = to_float(s);
    }
}

/// Convert a block of floats into an existing 16-bit buffer
pub fn to_int_slice(input: &[f64], output: &mut [i16]) {
    for (out, &s) in output.iter_mut().zip(input.iter()) {
        *out = to_int(s);
    }
}

/// Root-mean-square of a frame in the integer domain
///
/// Returns 0.0 for an empty frame.
pub fn rms(frame: &[i16]) -> f64 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum_of_squares: f64 = frame
        .iter()
        .map(|&s| {
            let s = s as f64;
            s * s
        })
        .sum();
    (sum_of_squares / frame.len() as f64).sqrt()
}

/// Average interleaved channels down to one normalized mono signal
pub fn downmix_to_mono(frame: &[i16], channels: usize, output: &mut Vec<f64>) {
    output.clear();
    if channels <= 1 {
        output.extend(frame.iter().map(|&s| to_float(s)));
        return;
    }
    output.extend(frame.chunks_exact(channels).map(|group| {
        group.iter().map(|&s| to_float(s)).sum::<f64>() / channels as f64
    }));
}
