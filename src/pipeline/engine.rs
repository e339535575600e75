//! Spectral Engine - per-batch orchestration of the analysis pipeline
//!
//! ## Per-Batch Flow
//!
//! ```text
//! validate ─► ingest gate ─► calibrate / apply offsets
//!          ─► raw window (sliding, display)
//!          ─► short window (block) ─► spectrum ─► spectrogram row
//!          ─► long window (block)  ─► spectrum ─► baseline candidate
//!          ─► snapshot
//! ```
//!
//! All three axes are processed identically and independently. A batch
//! that fails validation is discarded before any state changes. The engine
//! is single-writer: it is owned by one task and fed through the event
//! queue in [`super::processing_loop`].

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::gate::IngestGate;
use super::snapshot::{AxisSnapshot, EngineSnapshot, RawSeries};
use crate::baseline::{BaselineError, BaselineStore};
use crate::config::{defaults, IngestPolicy, MonitorConfig};
use crate::processing::{
    linspace, Calibrator, ProcessingError, RingBuffer, SpectrogramHistory, Spectrum, SpectrumComputer,
};
use crate::types::{Axis, MalformedBatch, PerAxis, SampleBatch};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("Malformed batch: {0}")]
    Malformed(#[from] MalformedBatch),

    #[error("Batch arrived inside the minimum ingest interval")]
    Throttled,

    #[error("Baseline not ready: no long-window spectrum yet")]
    BaselineNotReady,

    #[error("Configuration mismatch: spectrogram expects {expected} bins, spectrum has {actual}")]
    ConfigurationMismatch { expected: usize, actual: usize },

    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("Processing error: {0}")]
    Processing(ProcessingError),
}

impl From<ProcessingError> for EngineError {
    fn from(e: ProcessingError) -> Self {
        match e {
            ProcessingError::RowWidthMismatch { expected, actual } => {
                Self::ConfigurationMismatch { expected, actual }
            }
            other => Self::Processing(other),
        }
    }
}

impl EngineError {
    /// Fatal errors mean the engine's own invariants are broken and it must stop.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::ConfigurationMismatch { .. } | Self::Processing(_))
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Construction-time parameters, fixed for the life of the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub sample_rate_hz: f64,
    pub raw_window: NonZeroUsize,
    pub short_window: NonZeroUsize,
    pub long_window: NonZeroUsize,
    pub spectrogram_rows: NonZeroUsize,
    pub freq_limit_hz: f64,
    pub min_ingest_interval: Duration,
    pub ingest_policy: IngestPolicy,
}

const fn nonzero_or_one(n: usize) -> NonZeroUsize {
    match NonZeroUsize::new(n) {
        Some(v) => v,
        None => NonZeroUsize::MIN,
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: defaults::SAMPLE_RATE_HZ,
            raw_window: nonzero_or_one(defaults::RAW_WINDOW_SAMPLES),
            short_window: nonzero_or_one(defaults::SHORT_WINDOW_SAMPLES),
            long_window: nonzero_or_one(defaults::LONG_WINDOW_SAMPLES),
            spectrogram_rows: nonzero_or_one(defaults::SPECTROGRAM_ROWS),
            freq_limit_hz: defaults::FREQ_LIMIT_HZ,
            min_ingest_interval: Duration::from_millis(defaults::MIN_INGEST_INTERVAL_MS),
            ingest_policy: IngestPolicy::DropBatch,
        }
    }
}

impl TryFrom<&MonitorConfig> for EngineConfig {
    type Error = EngineError;

    fn try_from(c: &MonitorConfig) -> Result<Self, EngineError> {
        let nonzero = |v: usize, name: &str| {
            NonZeroUsize::new(v)
                .ok_or_else(|| EngineError::InvalidConfig(format!("{name} must be greater than zero")))
        };
        Ok(Self {
            sample_rate_hz: c.sensor.sample_rate_hz,
            raw_window: nonzero(c.windows.raw_samples, "windows.raw_samples")?,
            short_window: nonzero(c.windows.short_samples, "windows.short_samples")?,
            long_window: nonzero(c.windows.long_samples, "windows.long_samples")?,
            spectrogram_rows: nonzero(c.spectrogram.rows, "spectrogram.rows")?,
            freq_limit_hz: c.spectrum.freq_limit_hz,
            min_ingest_interval: Duration::from_millis(c.ingest.min_interval_ms),
            ingest_policy: c.ingest.policy,
        })
    }
}

impl EngineConfig {
    #[allow(clippy::cast_precision_loss)]
    fn seconds(&self, samples: NonZeroUsize) -> f64 {
        samples.get() as f64 / self.sample_rate_hz
    }
}

// ============================================================================
// Outcome & Statistics
// ============================================================================

/// Result of one processed batch.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Samples per axis in the batch
    pub samples: usize,
    /// This batch set the calibration offsets (and was reported as zeros)
    pub calibrated_now: bool,
    /// Short windows completed on each axis
    pub short_windows_completed: usize,
    /// Long windows completed on each axis
    pub long_windows_completed: usize,
    /// Published snapshot; `None` when publication was rate limited
    pub snapshot: Option<Arc<EngineSnapshot>>,
}

/// Running counters; every discard path has its own counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub batches_received: u64,
    pub batches_processed: u64,
    pub batches_malformed: u64,
    pub batches_throttled: u64,
    pub samples_ingested: u64,
    pub short_windows_completed: u64,
    pub long_windows_completed: u64,
    pub baseline_captures: u64,
    pub baseline_not_ready: u64,
    pub snapshots_published: u64,
}

// ============================================================================
// Per-Axis Channel
// ============================================================================

#[derive(Debug, Default, Clone, Copy)]
struct WindowsCompleted {
    short: usize,
    long: usize,
}

#[derive(Debug)]
struct AxisChannel {
    raw: RingBuffer<f64>,
    short: RingBuffer<f64>,
    long: RingBuffer<f64>,
    spectrogram: SpectrogramHistory,
    baseline: BaselineStore,
    short_spectrum: Option<Spectrum>,
    long_spectrum: Option<Spectrum>,
}

impl AxisChannel {
    fn new(config: &EngineConfig, short: &SpectrumComputer, long: &SpectrumComputer) -> Self {
        Self {
            raw: RingBuffer::new(config.raw_window),
            short: RingBuffer::new(config.short_window),
            long: RingBuffer::new(config.long_window),
            spectrogram: SpectrogramHistory::new(
                config.spectrogram_rows,
                short.frequencies_hz().to_vec(),
                config.seconds(config.short_window),
            ),
            baseline: BaselineStore::new(long.zeros()),
            short_spectrum: None,
            long_spectrum: None,
        }
    }

    /// Push adjusted samples through every window, completing blocks as they fill.
    fn ingest(
        &mut self,
        axis: Axis,
        values: &[f64],
        short: &SpectrumComputer,
        long: &SpectrumComputer,
    ) -> Result<WindowsCompleted, EngineError> {
        let mut done = WindowsCompleted::default();
        for &v in values {
            self.raw.push(v);

            self.short.push(v);
            if self.short.is_full() {
                let window = self.short.drain();
                let spectrum = short.compute(&window)?;
                self.spectrogram.push_row(&spectrum.magnitudes)?;
                debug!(
                    axis = %axis,
                    peak_hz = spectrum.peak_frequency_hz,
                    rms = spectrum.rms,
                    "Short window complete"
                );
                self.short_spectrum = Some(spectrum);
                done.short += 1;
            }

            self.long.push(v);
            if self.long.is_full() {
                let window = self.long.drain();
                let spectrum = long.compute(&window)?;
                debug!(
                    axis = %axis,
                    peak_hz = spectrum.peak_frequency_hz,
                    rms = spectrum.rms,
                    "Long window complete"
                );
                self.long_spectrum = Some(spectrum);
                done.long += 1;
            }
        }
        Ok(done)
    }

    fn snapshot(&self, raw_times: &[f64]) -> AxisSnapshot {
        let ordered = self.raw.to_ordered_vec();
        let filled = ordered.len();
        let mut values = vec![0.0; self.raw.capacity() - filled];
        values.extend(ordered);

        AxisSnapshot {
            raw: RawSeries {
                times_s: raw_times.to_vec(),
                values,
                filled,
            },
            short_spectrum: self.short_spectrum.clone(),
            long_spectrum: self.long_spectrum.clone(),
            spectrogram: self.spectrogram.snapshot(),
            baseline: self.baseline.view(),
        }
    }
}

// ============================================================================
// Spectral Engine
// ============================================================================

#[derive(Debug)]
pub struct SpectralEngine {
    config: EngineConfig,
    calibrator: Calibrator,
    gate: IngestGate,
    short_computer: SpectrumComputer,
    long_computer: SpectrumComputer,
    channels: PerAxis<AxisChannel>,
    raw_times: Vec<f64>,
    stats: EngineStats,
    sequence: u64,
}

impl SpectralEngine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let plan = |window: NonZeroUsize| {
            SpectrumComputer::new(window.get(), config.sample_rate_hz, config.freq_limit_hz)
                .map_err(|e| EngineError::InvalidConfig(e.to_string()))
        };
        let short_computer = plan(config.short_window)?;
        let long_computer = plan(config.long_window)?;

        let channels =
            PerAxis::from_fn(|_| AxisChannel::new(&config, &short_computer, &long_computer));
        let raw_times = linspace(
            -config.seconds(config.raw_window),
            0.0,
            config.raw_window.get(),
        );

        info!(
            sample_rate_hz = config.sample_rate_hz,
            raw = config.raw_window.get(),
            short = config.short_window.get(),
            long = config.long_window.get(),
            short_bins = short_computer.bin_count(),
            long_bins = long_computer.bin_count(),
            policy = ?config.ingest_policy,
            "Spectral engine initialised"
        );

        Ok(Self {
            gate: IngestGate::new(config.min_ingest_interval),
            config,
            calibrator: Calibrator::new(),
            short_computer,
            long_computer,
            channels,
            raw_times,
            stats: EngineStats::default(),
            sequence: 0,
        })
    }

    /// Decode a transport message and process it.
    pub fn process_payload(&mut self, payload: &[u8], now: Instant) -> Result<BatchOutcome, EngineError> {
        match SampleBatch::from_json(payload) {
            Ok(batch) => self.process_batch(&batch, now),
            Err(e) => {
                self.stats.batches_received += 1;
                Err(self.reject(e))
            }
        }
    }

    /// Run one batch through validation, gating, calibration and all windows.
    pub fn process_batch(&mut self, batch: &SampleBatch, now: Instant) -> Result<BatchOutcome, EngineError> {
        self.stats.batches_received += 1;
        let n = match batch.validate() {
            Ok(n) => n,
            Err(e) => return Err(self.reject(e)),
        };

        let admitted = self.gate.admit(now);
        if !admitted {
            self.stats.batches_throttled += 1;
            if self.config.ingest_policy == IngestPolicy::DropBatch {
                debug!(samples = n, "Batch inside minimum interval, dropped");
                return Err(EngineError::Throttled);
            }
            debug!(samples = n, "Batch inside minimum interval, samples retained without publishing");
        }

        let calibrated_now = !self.calibrator.is_fully_calibrated();
        let adjusted = if calibrated_now {
            self.calibrate(batch)?;
            PerAxis::from_fn(|_| vec![0.0; n])
        } else {
            self.adjust(batch)?
        };

        let mut completed = WindowsCompleted::default();
        for axis in Axis::ALL {
            let done = self.channels[axis]
                .ingest(axis, &adjusted[axis], &self.short_computer, &self.long_computer)
                .inspect_err(|e| error!(axis = %axis, error = %e, "Window processing failed"))?;
            completed.short = completed.short.max(done.short);
            completed.long = completed.long.max(done.long);
        }

        self.stats.batches_processed += 1;
        self.stats.samples_ingested += n as u64;
        self.stats.short_windows_completed += completed.short as u64;
        self.stats.long_windows_completed += completed.long as u64;
        if completed.long > 0 {
            info!(
                long_windows = self.stats.long_windows_completed,
                "Long-window spectra updated, baseline candidate available"
            );
        }

        let snapshot = admitted.then(|| self.snapshot());
        Ok(BatchOutcome {
            samples: n,
            calibrated_now,
            short_windows_completed: completed.short,
            long_windows_completed: completed.long,
            snapshot,
        })
    }

    /// Capture each axis' latest long-window spectrum as its baseline.
    pub fn capture_baseline(&mut self) -> Result<(), EngineError> {
        let mut missing = Vec::new();
        for axis in Axis::ALL {
            let channel = &mut self.channels[axis];
            if let Err(BaselineError::NotReady) =
                channel.baseline.try_capture(channel.long_spectrum.as_ref())
            {
                missing.push(axis);
            }
        }

        if missing.is_empty() {
            self.stats.baseline_captures += 1;
            info!(captures = self.stats.baseline_captures, "Baseline updated with latest long-window spectrum");
            Ok(())
        } else {
            self.stats.baseline_not_ready += 1;
            warn!(axes = ?missing, "No long-window spectrum available for baseline");
            Err(EngineError::BaselineNotReady)
        }
    }

    /// Build and number a new immutable snapshot.
    pub fn snapshot(&mut self) -> Arc<EngineSnapshot> {
        self.sequence += 1;
        self.stats.snapshots_published += 1;
        Arc::new(EngineSnapshot {
            sequence: self.sequence,
            generated_at: Utc::now(),
            calibrated: self.calibrator.is_fully_calibrated(),
            offsets: self.calibrator.offsets(),
            axes: self.channels.as_ref().map(|_, ch| ch.snapshot(&self.raw_times)),
        })
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub const fn stats(&self) -> EngineStats {
        self.stats
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrator.is_fully_calibrated()
    }

    pub const fn offsets(&self) -> PerAxis<Option<f64>> {
        self.calibrator.offsets()
    }

    pub fn short_spectrum(&self, axis: Axis) -> Option<&Spectrum> {
        self.channels[axis].short_spectrum.as_ref()
    }

    pub fn long_spectrum(&self, axis: Axis) -> Option<&Spectrum> {
        self.channels[axis].long_spectrum.as_ref()
    }

    /// Stored baseline spectrum and readiness for `axis`.
    pub fn baseline(&self, axis: Axis) -> (&Spectrum, bool) {
        self.channels[axis].baseline.current()
    }

    // ------------------------------------------------------------------------

    fn reject(&mut self, e: MalformedBatch) -> EngineError {
        self.stats.batches_malformed += 1;
        warn!(error = %e, "Discarding malformed batch");
        EngineError::Malformed(e)
    }

    fn calibrate(&mut self, batch: &SampleBatch) -> Result<(), EngineError> {
        for axis in Axis::ALL {
            if !self.calibrator.is_calibrated(axis) {
                self.calibrator.observe_first_batch(axis, batch.samples(axis))?;
            }
        }
        let offsets = self.calibrator.offsets();
        info!(
            x = offsets.x.unwrap_or_default(),
            y = offsets.y.unwrap_or_default(),
            z = offsets.z.unwrap_or_default(),
            "Offsets calculated from first batch"
        );
        Ok(())
    }

    fn adjust(&self, batch: &SampleBatch) -> Result<PerAxis<Vec<f64>>, EngineError> {
        let mut adjusted: PerAxis<Vec<f64>> = PerAxis::default();
        for axis in Axis::ALL {
            adjusted[axis] = batch
                .samples(axis)
                .iter()
                .map(|&raw| self.calibrator.apply(axis, raw))
                .collect::<Result<_, _>>()?;
        }
        Ok(adjusted)
    }
}

// ============================================================================
// Tests
// ============================================================================
