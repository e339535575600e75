//! Signal processing building blocks: buffers, calibration, spectra and the
//! spectrogram history.

mod calibration;
mod ring_buffer;
mod spectrogram;
mod spectrum;

pub use calibration::Calibrator;
pub use ring_buffer::RingBuffer;
pub use spectrogram::{SpectrogramGrid, SpectrogramHistory};
pub use spectrum::{bin_count, compute_spectrum, frequency_bins, Spectrum, SpectrumComputer};

use thiserror::Error;

use crate::types::Axis;

/// Errors in signal processing
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessingError {
    #[error("Insufficient data: need {needed}, have {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("Window length mismatch: expected {expected} samples, got {actual}")]
    WindowLength { expected: usize, actual: usize },

    #[error("FFT error: {0}")]
    Fft(String),

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(f64),

    #[error("Invalid frequency limit: {0}")]
    InvalidFrequencyLimit(f64),

    #[error("Axis {0} is not calibrated")]
    NotCalibrated(Axis),

    #[error("Axis {0} is already calibrated")]
    AlreadyCalibrated(Axis),

    #[error("Cannot calibrate axis {0} from an empty batch")]
    EmptyCalibrationBatch(Axis),

    #[error("Spectrogram row width mismatch: expected {expected} bins, got {actual}")]
    RowWidthMismatch { expected: usize, actual: usize },
}

/// `n` evenly spaced values from `start` to `end`, both included.
///
/// A single value is `start`; zero values is empty.
#[allow(clippy::cast_precision_loss)]
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + i as f64 * step).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linspace_includes_both_ends() {
        let v = linspace(-1.0, 0.0, 400);
        assert_eq!(v.len(), 400);
        assert!((v[0] + 1.0).abs() < 1e-12);
        assert!(v[399].abs() < 1e-12);
        assert_eq!(linspace(3.0, 9.0, 1), vec![3.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }
}
