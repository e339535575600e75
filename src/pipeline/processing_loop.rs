//! Single-writer processing loop.
//!
//! The loop owns the [`SpectralEngine`]. Everything that wants to change
//! engine state (source reader, HTTP capture trigger) sends an
//! [`EngineEvent`] through one bounded `mpsc` queue, so batches and
//! baseline captures are applied strictly in arrival order.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::engine::{EngineError, EngineStats, SpectralEngine};
use super::source::{BatchSource, SourceEvent};
use super::state::{MonitorState, MonitorStatus};
use crate::config::defaults::PROGRESS_LOG_INTERVAL_BATCHES;
use crate::types::SampleBatch;

/// Input to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Undecoded transport message
    Payload(Vec<u8>),
    /// Already-decoded batch
    Batch(SampleBatch),
    /// Operator request to capture the baseline
    CaptureBaseline,
}

// ============================================================================
// Processing Loop
// ============================================================================

/// Owns the engine and the write side of the shared monitor state.
///
/// Built with [`new()`](ProcessingLoop::new) then consumed by
/// [`run()`](ProcessingLoop::run).
pub struct ProcessingLoop {
    engine: SpectralEngine,
    state: Arc<RwLock<MonitorState>>,
    cancel_token: CancellationToken,
    progress_interval: u64,
}

impl ProcessingLoop {
    pub fn new(engine: SpectralEngine, state: Arc<RwLock<MonitorState>>, cancel_token: CancellationToken) -> Self {
        Self {
            engine,
            state,
            cancel_token,
            progress_interval: PROGRESS_LOG_INTERVAL_BATCHES,
        }
    }

    /// Log a progress line every `batches` received batches (0 disables).
    #[must_use]
    pub const fn with_progress_interval(mut self, batches: u64) -> Self {
        self.progress_interval = batches;
        self
    }

    /// Apply events until cancellation, queue closure, or a fatal engine error.
    ///
    /// Returns final engine statistics, or the fatal error that stopped the loop.
    pub async fn run(mut self, mut events: mpsc::Receiver<EngineEvent>) -> Result<EngineStats, EngineError> {
        info!("Processing loop started");

        loop {
            let event = tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!("Processing loop: shutdown signal received");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => event,
                    None => {
                        info!("Processing loop: event queue closed");
                        break;
                    }
                }
            };

            let is_batch = !matches!(event, EngineEvent::CaptureBaseline);
            let now = Instant::now();
            let published = match event {
                EngineEvent::Payload(bytes) => self
                    .engine
                    .process_payload(&bytes, now)
                    .map(|outcome| outcome.snapshot),
                EngineEvent::Batch(batch) => self
                    .engine
                    .process_batch(&batch, now)
                    .map(|outcome| outcome.snapshot),
                EngineEvent::CaptureBaseline => self
                    .engine
                    .capture_baseline()
                    .map(|()| Some(self.engine.snapshot())),
            };

            let stats = self.engine.stats();
            {
                let mut state = self.state.write().await;
                state.stats = stats;
                match published {
                    Ok(snapshot) => {
                        if is_batch {
                            state.last_batch_at = Some(Utc::now());
                        }
                        if let Some(snapshot) = snapshot {
                            state.publish(snapshot);
                        }
                    }
                    Err(e) if e.is_fatal() => {
                        error!(error = %e, "Engine stopped on fatal error");
                        state.status = MonitorStatus::Error;
                        state.last_error = Some(e.to_string());
                        return Err(e);
                    }
                    // Logged and counted by the engine.
                    Err(_) => {}
                }
            }

            if is_batch && self.progress_interval > 0 && stats.batches_received % self.progress_interval == 0 {
                info!(
                    received = stats.batches_received,
                    processed = stats.batches_processed,
                    malformed = stats.batches_malformed,
                    throttled = stats.batches_throttled,
                    short_windows = stats.short_windows_completed,
                    long_windows = stats.long_windows_completed,
                    "Progress"
                );
            }
        }

        let stats = self.engine.stats();
        {
            let mut state = self.state.write().await;
            state.stats = stats;
            state.status = MonitorStatus::Stopped;
        }
        log_final_stats(&stats);
        Ok(stats)
    }
}

/// Forward source messages onto the engine queue.
///
/// Returns the number of messages forwarded when the source ends, the
/// queue closes, or cancellation fires. Source errors are returned.
pub async fn forward_source<S: BatchSource + ?Sized>(
    source: &mut S,
    events: mpsc::Sender<EngineEvent>,
    cancel_token: CancellationToken,
) -> Result<u64> {
    let mut forwarded = 0u64;
    info!(source = source.source_name(), "Reading batches");

    loop {
        let event = tokio::select! {
            () = cancel_token.cancelled() => {
                debug!(source = source.source_name(), "Reader: shutdown signal received");
                break;
            }
            result = source.next_message() => match result {
                Ok(event) => event,
                Err(e) => {
                    warn!(source = source.source_name(), error = %e, "Source error");
                    return Err(e);
                }
            }
        };

        match event {
            SourceEvent::Message(bytes) => {
                if events.send(EngineEvent::Payload(bytes)).await.is_err() {
                    debug!("Engine queue closed, reader stopping");
                    break;
                }
                forwarded += 1;
            }
            SourceEvent::Eof => {
                info!(source = source.source_name(), forwarded, "Source reached end");
                break;
            }
        }
    }
    Ok(forwarded)
}

fn log_final_stats(stats: &EngineStats) {
    info!("FINAL STATISTICS");
    info!("   Batches Received:     {}", stats.batches_received);
    info!("   Batches Processed:    {}", stats.batches_processed);
    info!("   Malformed:            {}", stats.batches_malformed);
    info!("   Throttled:            {}", stats.batches_throttled);
    info!("   Samples Ingested:     {}", stats.samples_ingested);
    info!("   Short Windows:        {}", stats.short_windows_completed);
    info!("   Long Windows:         {}", stats.long_windows_completed);
    info!("   Baseline Captures:    {}", stats.baseline_captures);
}
