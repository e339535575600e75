//! Processing Loop Integration Tests
//!
//! Replay file -> source reader -> event queue -> processing loop ->
//! shared monitor state, wired the way `main` wires them.

use std::io::Write;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use triaxial_monitor::acquisition::{SyntheticProfile, SyntheticSensor};
use triaxial_monitor::pipeline::source::ReplaySource;
use triaxial_monitor::pipeline::{
    forward_source, EngineConfig, EngineEvent, MonitorState, MonitorStatus, ProcessingLoop,
    SpectralEngine,
};

fn nz(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

/// 0.1 s raw, 0.2 s short, 0.4 s long windows with no ingest throttling,
/// since replayed batches arrive back to back.
fn fast_config() -> EngineConfig {
    EngineConfig {
        raw_window: nz(40),
        short_window: nz(80),
        long_window: nz(160),
        spectrogram_rows: nz(3),
        min_ingest_interval: Duration::ZERO,
        ..EngineConfig::default()
    }
}

/// Write `batches` synthetic batches, one JSON object per line.
fn recording(batches: usize, extra_lines: &[&str]) -> tempfile::NamedTempFile {
    let mut sensor = SyntheticSensor::new(SyntheticProfile::default(), 400.0, 40, Some(11));
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for _ in 0..batches {
        writeln!(file, "{}", sensor.next_batch().to_json().unwrap()).unwrap();
    }
    for line in extra_lines {
        writeln!(file, "{line}").unwrap();
    }
    file
}

fn shared_state() -> Arc<RwLock<MonitorState>> {
    Arc::new(RwLock::new(MonitorState::new("bench", "replay")))
}

#[tokio::test]
async fn replay_fills_windows_and_captures_baseline() {
    let file = recording(10, &["", "{not json"]);
    let state = shared_state();
    let cancel_token = CancellationToken::new();
    let (tx, rx) = mpsc::channel(64);

    let engine = SpectralEngine::new(fast_config()).unwrap();
    let processing = ProcessingLoop::new(engine, state.clone(), cancel_token.clone());
    let handle = tokio::spawn(processing.run(rx));

    let mut source = ReplaySource::open(file.path(), Duration::ZERO).await.unwrap();
    let forwarded = forward_source(&mut source, tx.clone(), cancel_token.clone())
        .await
        .unwrap();
    assert_eq!(forwarded, 11, "blank line is skipped");

    tx.send(EngineEvent::CaptureBaseline).await.unwrap();
    drop(tx);

    let stats = handle.await.unwrap().unwrap();
    assert_eq!(stats.batches_processed, 10);
    assert_eq!(stats.batches_malformed, 1);
    assert_eq!(stats.samples_ingested, 400);
    assert_eq!(stats.short_windows_completed, 5);
    assert_eq!(stats.long_windows_completed, 2);
    assert_eq!(stats.baseline_captures, 1);

    let state = state.read().await;
    assert_eq!(state.status, MonitorStatus::Stopped);
    assert_eq!(state.stats, stats);
    assert!(state.last_batch_at.is_some());
    assert!(state.last_error.is_none());

    let snapshot = state.latest_snapshot.as_ref().unwrap();
    assert!(snapshot.calibrated);
    assert!(snapshot.baseline_ready());
    assert_eq!(snapshot.sequence, stats.snapshots_published);
    let z = snapshot.axes.z.long_spectrum.as_ref().unwrap();
    assert_eq!(&snapshot.axes.z.baseline.spectrum, z);
}

#[tokio::test]
async fn non_utf8_line_is_counted_and_replay_continues() {
    let mut sensor = SyntheticSensor::new(SyntheticProfile::default(), 400.0, 40, Some(5));
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "{}", sensor.next_batch().to_json().unwrap()).unwrap();
    file.write_all(b"\xff\xfe garbage\n").unwrap();
    writeln!(file, "{}", sensor.next_batch().to_json().unwrap()).unwrap();

    let state = shared_state();
    let cancel_token = CancellationToken::new();
    let (tx, rx) = mpsc::channel(8);
    let engine = SpectralEngine::new(fast_config()).unwrap();
    let handle = tokio::spawn(ProcessingLoop::new(engine, state.clone(), cancel_token.clone()).run(rx));

    let mut source = ReplaySource::open(file.path(), Duration::ZERO).await.unwrap();
    let forwarded = forward_source(&mut source, tx, cancel_token).await.unwrap();
    assert_eq!(forwarded, 3);

    let stats = handle.await.unwrap().unwrap();
    assert_eq!(stats.batches_received, 3);
    assert_eq!(stats.batches_processed, 2);
    assert_eq!(stats.batches_malformed, 1);
    assert_eq!(stats.samples_ingested, 80);

    let state = state.read().await;
    assert_eq!(state.status, MonitorStatus::Stopped);
    assert!(state.last_error.is_none());
}

#[tokio::test]
async fn early_capture_is_refused_without_stopping() {
    let file = recording(2, &[]);
    let state = shared_state();
    let cancel_token = CancellationToken::new();
    let (tx, rx) = mpsc::channel(8);

    let engine = SpectralEngine::new(fast_config()).unwrap();
    let handle = tokio::spawn(ProcessingLoop::new(engine, state.clone(), cancel_token.clone()).run(rx));

    let mut source = ReplaySource::open(file.path(), Duration::ZERO).await.unwrap();
    forward_source(&mut source, tx.clone(), cancel_token).await.unwrap();
    tx.send(EngineEvent::CaptureBaseline).await.unwrap();
    drop(tx);

    let stats = handle.await.unwrap().unwrap();
    assert_eq!(stats.batches_processed, 2);
    assert_eq!(stats.baseline_not_ready, 1);
    assert_eq!(stats.baseline_captures, 0);

    let state = state.read().await;
    assert!(state.last_error.is_none());
    assert!(!state.latest_snapshot.as_ref().unwrap().baseline_ready());
}

#[tokio::test]
async fn cancellation_stops_reader_and_loop() {
    let state = shared_state();
    let cancel_token = CancellationToken::new();
    let (tx, rx) = mpsc::channel(8);

    let engine = SpectralEngine::new(fast_config()).unwrap();
    let handle = tokio::spawn(ProcessingLoop::new(engine, state.clone(), cancel_token.clone()).run(rx));

    tx.send(EngineEvent::Payload(
        br#"{"x_values":[1.0],"y_values":[2.0],"z_values":[3.0]}"#.to_vec(),
    ))
    .await
    .unwrap();

    // Sender stays alive: only cancellation can end the loop.
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel_token.cancel();

    let stats = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("loop should stop after cancel")
        .unwrap()
        .unwrap();
    assert_eq!(stats.batches_processed, 1);
    assert_eq!(state.read().await.status, MonitorStatus::Stopped);
    drop(tx);
}
