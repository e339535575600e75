//! API route definitions
//!
//! - /api/v1/status - counters, offsets and per-axis spectral summary
//! - /api/v1/snapshot - latest full engine snapshot
//! - /api/v1/snapshot/:axis - one axis of the latest snapshot
//! - /api/v1/baseline/capture - queue a baseline capture

use axum::{routing::{get, post}, Router};

use super::handlers::{self, ApiState};

pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/status", get(handlers::get_status))
        .route("/snapshot", get(handlers::get_snapshot))
        .route("/snapshot/:axis", get(handlers::get_axis_snapshot))
        .route("/baseline/capture", post(handlers::capture_baseline))
        .with_state(state)
}

/// Health endpoint at root level
pub fn health_routes(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .with_state(state)
}
