//! Monitor State and System Status
//!
//! Shared state read by API handlers and written by the processing loop.
//! Wrapped in `Arc<RwLock<>>`; the engine itself is never shared, only the
//! snapshots and counters it publishes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use super::engine::EngineStats;
use super::snapshot::EngineSnapshot;

// ============================================================================
// Monitor State
// ============================================================================

#[derive(Debug, Clone)]
pub struct MonitorState {
    /// Sensor identifier from config
    pub sensor_name: String,

    /// Source the loop is reading from (e.g. "stdin", "TCP", "synthetic")
    pub source_name: String,

    /// Process start, for uptime
    pub started_at: Instant,

    pub status: MonitorStatus,

    /// Most recent published snapshot
    pub latest_snapshot: Option<Arc<EngineSnapshot>>,

    /// Engine counters as of the last processed event
    pub stats: EngineStats,

    /// Wall-clock time of the last batch the engine accepted
    pub last_batch_at: Option<DateTime<Utc>>,

    /// Description of the error that stopped the loop, if any
    pub last_error: Option<String>,
}

impl Default for MonitorState {
    fn default() -> Self {
        Self {
            sensor_name: crate::config::defaults::SENSOR_NAME.to_string(),
            source_name: String::new(),
            started_at: Instant::now(),
            status: MonitorStatus::Initializing,
            latest_snapshot: None,
            stats: EngineStats::default(),
            last_batch_at: None,
            last_error: None,
        }
    }
}

impl MonitorState {
    pub fn new(sensor_name: impl Into<String>, source_name: impl Into<String>) -> Self {
        Self {
            sensor_name: sensor_name.into(),
            source_name: source_name.into(),
            ..Self::default()
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Replace the published snapshot and move the status forward.
    pub fn publish(&mut self, snapshot: Arc<EngineSnapshot>) {
        self.status = if snapshot.calibrated {
            MonitorStatus::Monitoring
        } else {
            MonitorStatus::Calibrating
        };
        self.latest_snapshot = Some(snapshot);
    }
}

/// Operational status reported by `/api/v1/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorStatus {
    /// No batch processed yet
    Initializing,
    /// Waiting for the first valid batch to fix offsets
    Calibrating,
    /// Offsets fixed, windows filling and spectra updating
    Monitoring,
    /// Source exhausted or shutdown requested
    Stopped,
    /// Engine stopped on a fatal error
    Error,
}

impl std::fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initializing => write!(f, "Initializing"),
            Self::Calibrating => write!(f, "Calibrating"),
            Self::Monitoring => write!(f, "Monitoring"),
            Self::Stopped => write!(f, "Stopped"),
            Self::Error => write!(f, "Error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{EngineConfig, SpectralEngine};

    #[test]
    fn test_monitor_state_default() {
        let state = MonitorState::default();
        assert_eq!(state.status, MonitorStatus::Initializing);
        assert!(state.latest_snapshot.is_none());
        assert_eq!(state.stats, EngineStats::default());
    }

    #[test]
    fn test_publish_tracks_calibration() {
        let mut engine = SpectralEngine::new(EngineConfig::default()).unwrap();
        let mut state = MonitorState::new("accel", "test");

        state.publish(engine.snapshot());
        assert_eq!(state.status, MonitorStatus::Calibrating);

        let batch = crate::types::SampleBatch::new(vec![1.0], vec![2.0], vec![3.0]);
        let outcome = engine.process_batch(&batch, Instant::now()).unwrap();
        state.publish(outcome.snapshot.unwrap());
        assert_eq!(state.status, MonitorStatus::Monitoring);
        assert_eq!(state.latest_snapshot.as_ref().map(|s| s.sequence), Some(2));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(MonitorStatus::Calibrating.to_string(), "Calibrating");
        assert_eq!(MonitorStatus::Error.to_string(), "Error");
    }
}
