//! API request handlers
//!
//! Read handlers only touch the published [`MonitorState`]; the one write
//! endpoint (baseline capture) enqueues an event for the processing loop
//! rather than reaching into the engine.

use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use super::envelope::{ApiErrorResponse, ApiResponse};
use crate::pipeline::{EngineEvent, EngineStats, MonitorState};
use crate::types::{Axis, PerAxis};

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    /// State published by the processing loop
    pub monitor: Arc<RwLock<MonitorState>>,
    /// Write side of the engine queue
    pub events: mpsc::Sender<EngineEvent>,
}

impl ApiState {
    pub const fn new(monitor: Arc<RwLock<MonitorState>>, events: mpsc::Sender<EngineEvent>) -> Self {
        Self { monitor, events }
    }
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// GET /health
pub async fn health_check(State(state): State<ApiState>) -> Json<HealthResponse> {
    let monitor = state.monitor.read().await;
    Json(HealthResponse {
        status: monitor.status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: monitor.uptime_secs(),
    })
}

// ============================================================================
// Status
// ============================================================================

/// Live spectral summary for one axis.
#[derive(Debug, Serialize)]
pub struct AxisStatus {
    pub short_peak_hz: Option<f64>,
    pub short_rms: Option<f64>,
    pub long_peak_hz: Option<f64>,
    pub baseline_ready: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub sensor: String,
    pub source: String,
    pub status: String,
    pub uptime_seconds: u64,
    pub calibrated: bool,
    pub offsets: PerAxis<Option<f64>>,
    pub axes: Option<PerAxis<AxisStatus>>,
    pub latest_sequence: Option<u64>,
    pub last_batch_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub stats: EngineStats,
}

/// GET /api/v1/status
pub async fn get_status(State(state): State<ApiState>) -> Response {
    let monitor = state.monitor.read().await;
    let snapshot = monitor.latest_snapshot.as_deref();

    let axes = snapshot.map(|snap| {
        snap.axes.as_ref().map(|_, axis| AxisStatus {
            short_peak_hz: axis.short_spectrum.as_ref().map(|s| s.peak_frequency_hz),
            short_rms: axis.short_spectrum.as_ref().map(|s| s.rms),
            long_peak_hz: axis.long_spectrum.as_ref().map(|s| s.peak_frequency_hz),
            baseline_ready: axis.baseline.ready,
        })
    });

    ApiResponse::ok(StatusResponse {
        sensor: monitor.sensor_name.clone(),
        source: monitor.source_name.clone(),
        status: monitor.status.to_string(),
        uptime_seconds: monitor.uptime_secs(),
        calibrated: snapshot.is_some_and(|s| s.calibrated),
        offsets: snapshot.map(|s| s.offsets).unwrap_or_default(),
        axes,
        latest_sequence: snapshot.map(|s| s.sequence),
        last_batch_at: monitor.last_batch_at,
        last_error: monitor.last_error.clone(),
        stats: monitor.stats,
    })
}

// ============================================================================
// Snapshots
// ============================================================================

/// GET /api/v1/snapshot
pub async fn get_snapshot(State(state): State<ApiState>) -> Response {
    let snapshot = state.monitor.read().await.latest_snapshot.clone();
    match snapshot {
        Some(snapshot) => ApiResponse::from_snapshot(snapshot.as_ref(), snapshot.sequence),
        None => ApiErrorResponse::service_unavailable("No snapshot published yet"),
    }
}

/// GET /api/v1/snapshot/:axis
pub async fn get_axis_snapshot(State(state): State<ApiState>, Path(axis): Path<String>) -> Response {
    let axis: Axis = match axis.parse() {
        Ok(axis) => axis,
        Err(e) => return ApiErrorResponse::bad_request(e),
    };
    let snapshot = state.monitor.read().await.latest_snapshot.clone();
    match snapshot {
        Some(snapshot) => ApiResponse::from_snapshot(snapshot.axis(axis), snapshot.sequence),
        None => ApiErrorResponse::service_unavailable("No snapshot published yet"),
    }
}

// ============================================================================
// Baseline
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CaptureQueued {
    pub queued: bool,
}

/// POST /api/v1/baseline/capture
///
/// Queues the trigger; the outcome shows up in `/status` and the next snapshot.
pub async fn capture_baseline(State(state): State<ApiState>) -> Response {
    match state.events.try_send(EngineEvent::CaptureBaseline) {
        Ok(()) => {
            tracing::info!("Baseline capture requested");
            ApiResponse::accepted(CaptureQueued { queued: true })
        }
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::warn!("Baseline capture rejected: engine queue full");
            ApiErrorResponse::service_unavailable("Engine queue full, retry shortly")
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            ApiErrorResponse::service_unavailable("Engine is not running")
        }
    }
}
