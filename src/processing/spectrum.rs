//! Windowed magnitude spectrum using realfft
//!
//! A block of N real samples becomes a one-sided amplitude spectrum:
//!
//! - real-input DFT, magnitude of each bin
//! - uniform `2/N` amplitude scaling (DC included, so a constant `c` reads `2c` at bin 0)
//! - truncated to bins `k` with `k <= F*N/R`, i.e. `floor(F*N/R) + 1` bins,
//!   never more than the `N/2 + 1` bins a real transform produces
//!
//! Bin `k` sits at `k*R/N` Hz. No tapering window is applied.
//!
//! # Example
//!
//! ```ignore
//! let computer = SpectrumComputer::new(4000, 400.0, 100.0)?;
//! let spectrum = computer.compute(&samples)?;
//! assert_eq!(spectrum.magnitudes.len(), 1001);
//! ```

use realfft::{num_complex::Complex, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::ProcessingError;

// ============================================================================
// Spectrum
// ============================================================================

/// Frequency-limited magnitude spectrum of one block window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    /// Bin centre frequencies (Hz), starting at DC
    pub frequencies_hz: Vec<f64>,
    /// Scaled magnitude per bin (milli-g)
    pub magnitudes: Vec<f64>,
    /// Number of samples transformed
    pub window_len: usize,
    /// Sample rate used for the frequency labels
    pub sample_rate_hz: f64,
    /// RMS of the magnitudes
    pub rms: f64,
    /// Frequency of the largest non-DC magnitude (0 when the spectrum is flat)
    pub peak_frequency_hz: f64,
}

impl Spectrum {
    /// All-zero spectrum with the bin layout a window of `window_len` would produce.
    pub fn zeros(window_len: usize, sample_rate_hz: f64, freq_limit_hz: f64) -> Self {
        let frequencies_hz = frequency_bins(window_len, sample_rate_hz, freq_limit_hz);
        let magnitudes = vec![0.0; frequencies_hz.len()];
        Self {
            frequencies_hz,
            magnitudes,
            window_len,
            sample_rate_hz,
            rms: 0.0,
            peak_frequency_hz: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }

    fn from_magnitudes(
        magnitudes: Vec<f64>,
        frequencies_hz: Vec<f64>,
        window_len: usize,
        sample_rate_hz: f64,
    ) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let rms = if magnitudes.is_empty() {
            0.0
        } else {
            (magnitudes.iter().map(|m| m * m).sum::<f64>() / magnitudes.len() as f64).sqrt()
        };

        let peak_frequency_hz = magnitudes
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, &m)| m > 0.0)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map_or(0.0, |(k, _)| frequencies_hz[k]);

        Self {
            frequencies_hz,
            magnitudes,
            window_len,
            sample_rate_hz,
            rms,
            peak_frequency_hz,
        }
    }
}

// ============================================================================
// Bin layout
// ============================================================================

/// Number of bins kept for a window of `n` samples at `sample_rate_hz`
/// limited to `freq_limit_hz`.
pub fn bin_count(n: usize, sample_rate_hz: f64, freq_limit_hz: f64) -> usize {
    if n == 0 {
        return 0;
    }
    let one_sided = n / 2 + 1;
    #[allow(clippy::cast_precision_loss)]
    let highest = (freq_limit_hz * n as f64 / sample_rate_hz).floor();
    if highest < 0.0 {
        return 1;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let kept = (highest as usize).saturating_add(1);
    kept.min(one_sided)
}

/// Frequency label (Hz) of every kept bin.
#[allow(clippy::cast_precision_loss)]
pub fn frequency_bins(n: usize, sample_rate_hz: f64, freq_limit_hz: f64) -> Vec<f64> {
    let resolution = sample_rate_hz / n.max(1) as f64;
    (0..bin_count(n, sample_rate_hz, freq_limit_hz))
        .map(|k| k as f64 * resolution)
        .collect()
}

// ============================================================================
// SpectrumComputer
// ============================================================================

/// Pre-planned transform for repeated windows of one fixed length.
///
/// Holds no per-call state: `compute` only reads the plan, so identical
/// input always gives bit-identical output.
pub struct SpectrumComputer {
    fft: Arc<dyn RealToComplex<f64>>,
    window_len: usize,
    sample_rate_hz: f64,
    freq_limit_hz: f64,
    frequencies_hz: Vec<f64>,
}

impl std::fmt::Debug for SpectrumComputer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumComputer")
            .field("window_len", &self.window_len)
            .field("sample_rate_hz", &self.sample_rate_hz)
            .field("freq_limit_hz", &self.freq_limit_hz)
            .finish_non_exhaustive()
    }
}

impl SpectrumComputer {
    pub fn new(window_len: usize, sample_rate_hz: f64, freq_limit_hz: f64) -> Result<Self, ProcessingError> {
        if window_len == 0 {
            return Err(ProcessingError::InsufficientData {
                needed: 1,
                available: 0,
            });
        }
        if !(sample_rate_hz.is_finite() && sample_rate_hz > 0.0) {
            return Err(ProcessingError::InvalidSampleRate(sample_rate_hz));
        }
        if !(freq_limit_hz.is_finite() && freq_limit_hz >= 0.0) {
            return Err(ProcessingError::InvalidFrequencyLimit(freq_limit_hz));
        }

        let mut planner = RealFftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(window_len);

        Ok(Self {
            fft,
            window_len,
            sample_rate_hz,
            freq_limit_hz,
            frequencies_hz: frequency_bins(window_len, sample_rate_hz, freq_limit_hz),
        })
    }

    pub const fn window_len(&self) -> usize {
        self.window_len
    }

    pub fn bin_count(&self) -> usize {
        self.frequencies_hz.len()
    }

    pub fn frequencies_hz(&self) -> &[f64] {
        &self.frequencies_hz
    }

    /// All-zero spectrum with this computer's bin layout.
    pub fn zeros(&self) -> Spectrum {
        Spectrum::zeros(self.window_len, self.sample_rate_hz, self.freq_limit_hz)
    }

    /// Transform exactly `window_len` samples.
    pub fn compute(&self, samples: &[f64]) -> Result<Spectrum, ProcessingError> {
        if samples.len() != self.window_len {
            return Err(ProcessingError::WindowLength {
                expected: self.window_len,
                actual: samples.len(),
            });
        }

        // realfft uses the input as scratch space.
        let mut input = samples.to_vec();
        let mut output: Vec<Complex<f64>> = self.fft.make_output_vec();
        self.fft
            .process(&mut input, &mut output)
            .map_err(|e| ProcessingError::Fft(e.to_string()))?;

        #[allow(clippy::cast_precision_loss)]
        let scale = 2.0 / self.window_len as f64;
        let magnitudes: Vec<f64> = output
            .iter()
            .take(self.frequencies_hz.len())
            .map(|c| c.norm() * scale)
            .collect();

        Ok(Spectrum::from_magnitudes(
            magnitudes,
            self.frequencies_hz.clone(),
            self.window_len,
            self.sample_rate_hz,
        ))
    }
}

/// One-off spectrum of `samples`, planning a transform for their length.
pub fn compute_spectrum(
    samples: &[f64],
    sample_rate_hz: f64,
    freq_limit_hz: f64,
) -> Result<Spectrum, ProcessingError> {
    SpectrumComputer::new(samples.len(), sample_rate_hz, freq_limit_hz)?.compute(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn tone(n: usize, rate: f64, freq: f64, amplitude: f64) -> Vec<f64> {
        (0..n)
            .map(|i| amplitude * (2.0 * PI * freq * i as f64 / rate).sin())
            .collect()
    }

    #[test]
    fn test_bin_counts_follow_limit_formula() {
        assert_eq!(bin_count(400, 400.0, 100.0), 101);
        assert_eq!(bin_count(4_000, 400.0, 100.0), 1_001);
        assert_eq!(bin_count(24_000, 400.0, 100.0), 6_001);
    }

    #[test]
    fn test_bin_count_capped_at_one_sided_length() {
        // Limit above Nyquist keeps every bin of the real transform.
        assert_eq!(bin_count(400, 400.0, 1_000.0), 201);
        assert_eq!(bin_count(7, 10.0, 100.0), 4);
    }

    #[test]
    fn test_frequency_labels_step_by_resolution() {
        let bins = frequency_bins(4_000, 400.0, 100.0);
        assert_eq!(bins.len(), 1_001);
        assert!((bins[1] - 0.1).abs() < 1e-12);
        assert!((bins[1_000] - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_sine_amplitude_recovered_at_its_bin() {
        let computer = SpectrumComputer::new(4_000, 400.0, 100.0).unwrap();
        let spectrum = computer.compute(&tone(4_000, 400.0, 25.0, 3.0)).unwrap();

        // 25 Hz at 0.1 Hz resolution lands on bin 250.
        assert!((spectrum.magnitudes[250] - 3.0).abs() < 1e-9);
        assert!((spectrum.peak_frequency_hz - 25.0).abs() < 1e-9);
        assert!(spectrum.magnitudes[100] < 1e-9);
    }

    #[test]
    fn test_constant_input_reads_twice_at_dc() {
        let spectrum = compute_spectrum(&[1.5; 400], 400.0, 100.0).unwrap();
        assert!((spectrum.magnitudes[0] - 3.0).abs() < 1e-12);
        assert!(spectrum.magnitudes[1..].iter().all(|m| m.abs() < 1e-9));
    }

    #[test]
    fn test_compute_is_deterministic() {
        let computer = SpectrumComputer::new(512, 400.0, 100.0).unwrap();
        let samples: Vec<f64> = (0..512).map(|i| ((i * 37) % 101) as f64 - 50.0).collect();
        let a = computer.compute(&samples).unwrap();
        let b = computer.compute(&samples).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_input_gives_zero_spectrum() {
        let computer = SpectrumComputer::new(400, 400.0, 100.0).unwrap();
        let spectrum = computer.compute(&[0.0; 400]).unwrap();
        assert_eq!(spectrum, computer.zeros());
        assert_eq!(spectrum.peak_frequency_hz, 0.0);
    }

    #[test]
    fn test_wrong_window_length_rejected() {
        let computer = SpectrumComputer::new(400, 400.0, 100.0).unwrap();
        assert!(matches!(
            computer.compute(&[0.0; 399]),
            Err(ProcessingError::WindowLength { expected: 400, actual: 399 })
        ));
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        assert!(matches!(
            SpectrumComputer::new(400, 0.0, 100.0),
            Err(ProcessingError::InvalidSampleRate(_))
        ));
        assert!(matches!(
            SpectrumComputer::new(400, 400.0, f64::NAN),
            Err(ProcessingError::InvalidFrequencyLimit(_))
        ));
        assert!(SpectrumComputer::new(0, 400.0, 100.0).is_err());
    }
}
