//! Triaxial Monitor: real-time vibration spectral analysis
//!
//! Ingests tri-axial accelerometer batches, removes each axis' resting
//! offset, and maintains raw, 10 s and 60 s views of every axis with a
//! rolling spectrogram and an operator-captured baseline spectrum.
//!
//! ## Architecture
//!
//! - **Processing**: ring buffers, calibration, FFT spectra, spectrogram history
//! - **Baseline**: operator-triggered reference spectra
//! - **Pipeline**: the single-writer spectral engine, its event loop and sources
//! - **Acquisition**: synthetic sensor and TCP transport client
//! - **Storage**: sled-backed raw sample log
//! - **API**: snapshot and capture endpoints for renderers

pub mod acquisition;
pub mod api;
pub mod baseline;
pub mod config;
pub mod pipeline;
pub mod processing;
pub mod storage;
pub mod types;

// Re-export configuration
pub use config::MonitorConfig;

// Re-export commonly used types
pub use types::{Axis, MalformedBatch, PerAxis, SampleBatch};

// Re-export the engine surface
pub use pipeline::{
    EngineConfig, EngineError, EngineEvent, EngineSnapshot, EngineStats, SpectralEngine,
};

// Re-export processing components
pub use processing::{Spectrum, SpectrumComputer};

// Re-export baseline components
pub use baseline::{BaselineError, BaselineStore};
