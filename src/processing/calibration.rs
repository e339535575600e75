//! One-shot zero-offset calibration.
//!
//! The resting bias of each axis is taken as the mean of the first valid
//! batch and subtracted from every later reading. Offsets are never
//! recomputed for the life of the engine.

use tracing::info;

use super::ProcessingError;
use crate::types::{Axis, PerAxis};

#[derive(Debug, Clone, Default)]
pub struct Calibrator {
    offsets: PerAxis<Option<f64>>,
}

impl Calibrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the offset for `axis` as the mean of `samples`.
    ///
    /// Refused if the axis is already calibrated or `samples` is empty.
    pub fn observe_first_batch(&mut self, axis: Axis, samples: &[f64]) -> Result<f64, ProcessingError> {
        if self.offsets[axis].is_some() {
            return Err(ProcessingError::AlreadyCalibrated(axis));
        }
        if samples.is_empty() {
            return Err(ProcessingError::EmptyCalibrationBatch(axis));
        }

        #[allow(clippy::cast_precision_loss)]
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        self.offsets[axis] = Some(mean);
        info!(axis = %axis, offset = mean, "Calibration offset recorded");
        Ok(mean)
    }

    /// Zero-offset adjusted value for `raw`.
    pub fn apply(&self, axis: Axis, raw: f64) -> Result<f64, ProcessingError> {
        self.offsets[axis]
            .map(|offset| raw - offset)
            .ok_or(ProcessingError::NotCalibrated(axis))
    }

    pub fn is_calibrated(&self, axis: Axis) -> bool {
        self.offsets[axis].is_some()
    }

    /// True once every axis has an offset.
    pub fn is_fully_calibrated(&self) -> bool {
        Axis::ALL.iter().all(|&a| self.is_calibrated(a))
    }

    pub const fn offsets(&self) -> PerAxis<Option<f64>> {
        self.offsets
    }
}
