//! Immutable per-cycle view of engine state handed to renderers.
//!
//! Every field is cloned out of the engine's buffers, so a snapshot stays
//! valid while the engine keeps ingesting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::baseline::BaselineView;
use crate::processing::{SpectrogramGrid, Spectrum};
use crate::types::{Axis, PerAxis};

/// The most recent zero-offset samples, padded to the display window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSeries {
    /// Time label (s, relative to now) of each value
    pub times_s: Vec<f64>,
    /// Always the window capacity long; leading zeros until the window fills
    pub values: Vec<f64>,
    /// Real samples at the end of `values`
    pub filled: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisSnapshot {
    pub raw: RawSeries,
    /// Spectrum of the last completed short window
    pub short_spectrum: Option<Spectrum>,
    /// Spectrum of the last completed long window (the baseline candidate)
    pub long_spectrum: Option<Spectrum>,
    pub spectrogram: SpectrogramGrid,
    pub baseline: BaselineView,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Increases by one for every snapshot the engine builds
    pub sequence: u64,
    pub generated_at: DateTime<Utc>,
    pub calibrated: bool,
    pub offsets: PerAxis<Option<f64>>,
    pub axes: PerAxis<AxisSnapshot>,
}

impl EngineSnapshot {
    pub fn axis(&self, axis: Axis) -> &AxisSnapshot {
        &self.axes[axis]
    }

    /// True when every axis holds a captured baseline.
    pub fn baseline_ready(&self) -> bool {
        Axis::ALL.iter().all(|&a| self.axes[a].baseline.ready)
    }
}
