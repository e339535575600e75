//! Baseline Spectrum Store - operator-triggered reference spectra
//!
//! Holds the reference spectrum an operator compares live long-window spectra
//! against. A baseline is never learned automatically: it changes only when a
//! capture trigger fires while a long-window spectrum exists.
//!
//! ## Architecture
//!
//! - `BaselineStore`: one per axis, `NotReady` until the first capture
//! - `BaselineView`: serializable copy of the stored spectrum and its readiness
//!
//! ## Usage
//!
//! ```ignore
//! let mut store = BaselineStore::new(computer.zeros());
//!
//! // Before any long window completes:
//! assert!(store.try_capture(None).is_err());
//!
//! // After the 60 s window completes:
//! store.try_capture(Some(&long_spectrum))?;
//! let (spectrum, ready) = store.current();
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::processing::Spectrum;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BaselineError {
    #[error("No long-window spectrum available for baseline")]
    NotReady,
}

/// Readiness of a baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineState {
    /// No capture has succeeded yet; the stored spectrum is all zeros
    NotReady,
    /// Holds the long-window spectrum from the most recent capture
    Ready,
}

/// Serializable copy of a baseline for snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineView {
    pub spectrum: Spectrum,
    pub ready: bool,
    pub captured_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct BaselineStore {
    spectrum: Spectrum,
    state: BaselineState,
    captured_at: Option<DateTime<Utc>>,
    captures: u64,
}

impl BaselineStore {
    /// `zero` is the all-zero spectrum reported until the first capture.
    pub const fn new(zero: Spectrum) -> Self {
        Self {
            spectrum: zero,
            state: BaselineState::NotReady,
            captured_at: None,
            captures: 0,
        }
    }

    /// Store `latest` as the baseline, overwriting any earlier capture.
    ///
    /// With no long spectrum the store is left untouched and
    /// [`BaselineError::NotReady`] is returned.
    pub fn try_capture(&mut self, latest: Option<&Spectrum>) -> Result<&Spectrum, BaselineError> {
        let latest = latest.ok_or(BaselineError::NotReady)?;
        self.spectrum = latest.clone();
        self.state = BaselineState::Ready;
        self.captured_at = Some(Utc::now());
        self.captures += 1;
        debug!(
            bins = self.spectrum.len(),
            peak_hz = self.spectrum.peak_frequency_hz,
            captures = self.captures,
            "Baseline updated with latest long-window spectrum"
        );
        Ok(&self.spectrum)
    }

    /// Stored spectrum and whether it came from a capture.
    pub fn current(&self) -> (&Spectrum, bool) {
        (&self.spectrum, self.is_ready())
    }

    pub fn is_ready(&self) -> bool {
        self.state == BaselineState::Ready
    }

    pub const fn state(&self) -> BaselineState {
        self.state
    }

    pub const fn captures(&self) -> u64 {
        self.captures
    }

    pub fn view(&self) -> BaselineView {
        BaselineView {
            spectrum: self.spectrum.clone(),
            ready: self.is_ready(),
            captured_at: self.captured_at,
        }
    }
}
