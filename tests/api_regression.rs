//! API Regression Tests
//!
//! In-process tests that build the Axum app via `create_app()` next to a
//! running processing loop and exercise every /api/v1/* endpoint using
//! `tower::ServiceExt::oneshot()`. No binary spawn, no network port.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use triaxial_monitor::api::{create_app, ApiState};
use triaxial_monitor::pipeline::{
    EngineConfig, EngineError, EngineEvent, EngineStats, MonitorState, MonitorStatus, ProcessingLoop,
    SpectralEngine,
};
use triaxial_monitor::types::SampleBatch;

struct Harness {
    app: Router,
    monitor: Arc<RwLock<MonitorState>>,
    events: mpsc::Sender<EngineEvent>,
    cancel_token: CancellationToken,
    handle: JoinHandle<Result<EngineStats, EngineError>>,
}

impl Harness {
    fn start() -> Self {
        let nz = |n| NonZeroUsize::new(n).unwrap();
        let engine = SpectralEngine::new(EngineConfig {
            raw_window: nz(8),
            short_window: nz(16),
            long_window: nz(32),
            spectrogram_rows: nz(3),
            min_ingest_interval: Duration::ZERO,
            ..EngineConfig::default()
        })
        .unwrap();

        let monitor = Arc::new(RwLock::new(MonitorState::new("bench", "test")));
        let cancel_token = CancellationToken::new();
        let (events, rx) = mpsc::channel(32);
        let handle = tokio::spawn(ProcessingLoop::new(engine, monitor.clone(), cancel_token.clone()).run(rx));
        let app = create_app(ApiState::new(monitor.clone(), events.clone()));

        Self {
            app,
            monitor,
            events,
            cancel_token,
            handle,
        }
    }

    async fn send_batches(&self, count: usize, level: f64) {
        for _ in 0..count {
            let batch = SampleBatch::new(vec![level; 8], vec![level; 8], vec![level; 8]);
            self.events.send(EngineEvent::Batch(batch)).await.unwrap();
        }
    }

    /// Wait until the loop has published what `ready` is looking for.
    async fn wait_for(&self, ready: impl Fn(&MonitorState) -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !ready(&*self.monitor.read().await) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("processing loop did not catch up");
    }

    async fn request(&self, method: Method, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = self
            .app
            .clone()
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        self.request(Method::GET, uri).await
    }

    async fn stop(self) -> EngineStats {
        self.cancel_token.cancel();
        self.handle.await.unwrap().unwrap()
    }
}

#[tokio::test]
async fn test_snapshot_unavailable_before_first_batch() {
    let harness = Harness::start();

    let (status, json) = harness.get("/api/v1/snapshot").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"]["code"], "SERVICE_UNAVAILABLE");

    let (status, json) = harness.get("/api/v1/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "Initializing");
    assert_eq!(json["data"]["calibrated"], false);
    assert!(json["data"]["axes"].is_null());

    harness.stop().await;
}

#[tokio::test]
async fn test_status_and_snapshot_follow_the_engine() {
    let harness = Harness::start();
    harness.send_batches(4, 2.5).await;
    harness.wait_for(|m| m.stats.batches_processed == 4).await;

    let (status, json) = harness.get("/api/v1/status").await;
    assert_eq!(status, StatusCode::OK);
    let data = &json["data"];
    assert_eq!(data["sensor"], "bench");
    assert_eq!(data["status"], "Monitoring");
    assert_eq!(data["calibrated"], true);
    assert_eq!(data["offsets"]["z"], 2.5);
    assert_eq!(data["stats"]["samples_ingested"], 32);
    assert_eq!(data["stats"]["long_windows_completed"], 1);
    assert_eq!(data["axes"]["x"]["baseline_ready"], false);
    assert_eq!(json["meta"]["api_version"], "1");
    assert!(json["meta"].get("sequence").is_none());

    let (status, json) = harness.get("/api/v1/snapshot").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["meta"]["sequence"], json["data"]["sequence"]);
    let x = &json["data"]["axes"]["x"];
    assert_eq!(x["raw"]["values"].as_array().unwrap().len(), 8);
    assert_eq!(x["spectrogram"]["rows"].as_array().unwrap().len(), 3);
    assert!(x["long_spectrum"]["magnitudes"].is_array());

    let (status, json) = harness.get("/api/v1/snapshot/Y").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["data"]["short_spectrum"].is_object());

    harness.stop().await;
}

#[tokio::test]
async fn test_unknown_axis_is_bad_request() {
    let harness = Harness::start();
    harness.send_batches(1, 0.0).await;
    harness.wait_for(|m| m.latest_snapshot.is_some()).await;

    let (status, json) = harness.get("/api/v1/snapshot/w").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"]["message"].as_str().unwrap().contains("unknown axis"));

    harness.stop().await;
}

#[tokio::test]
async fn test_capture_is_queued_then_applied() {
    let harness = Harness::start();

    // Too early: accepted by the API, refused by the engine.
    let (status, json) = harness.request(Method::POST, "/api/v1/baseline/capture").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["data"]["queued"], true);
    harness.wait_for(|m| m.stats.baseline_not_ready == 1).await;

    harness.send_batches(4, 1.0).await;
    let (status, _) = harness.request(Method::POST, "/api/v1/baseline/capture").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    harness.wait_for(|m| m.stats.baseline_captures == 1).await;

    let (_, json) = harness.get("/api/v1/snapshot/z").await;
    assert_eq!(json["data"]["baseline"]["ready"], true);
    assert_eq!(
        json["data"]["baseline"]["spectrum"],
        json["data"]["long_spectrum"]
    );

    let stats = harness.stop().await;
    assert_eq!(stats.baseline_captures, 1);
    assert_eq!(stats.baseline_not_ready, 1);
}

#[tokio::test]
async fn test_capture_reports_stopped_engine() {
    let harness = Harness::start();
    harness.cancel_token.cancel();
    // Wait for the loop to exit and drop its receiver.
    harness.wait_for(|m| m.status == MonitorStatus::Stopped).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    let (status, json) = harness.request(Method::POST, "/api/v1/baseline/capture").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"]["code"], "SERVICE_UNAVAILABLE");
}

#[tokio::test]
async fn test_health_and_fallback() {
    let harness = Harness::start();

    let (status, json) = harness.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));

    let (status, json) = harness.get("/api/v1/does-not-exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "NOT_FOUND");

    harness.stop().await;
}
