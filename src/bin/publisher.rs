//! Batch Publisher
//!
//! Generates tri-axial accelerometer batches from the synthetic sensor and
//! publishes them as line-delimited JSON, optionally logging every raw
//! sample to a sled database.
//!
//! # Usage
//! ```bash
//! # Pipe straight into the monitor
//! triaxial-publisher --seed 7 | triaxial-monitor --stdin
//!
//! # Serve TCP subscribers and keep a raw log
//! triaxial-publisher --listen 0.0.0.0:5005 --record ./data/samples.db
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use triaxial_monitor::acquisition::{SyntheticProfile, SyntheticSensor};
use triaxial_monitor::config::MonitorConfig;
use triaxial_monitor::storage::SampleLog;

/// Messages buffered per subscriber before it starts lagging
const SUBSCRIBER_BUFFER: usize = 256;

/// Shortest tick the publisher will ask tokio for.
const MIN_TICK: Duration = Duration::from_millis(1);

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "triaxial-publisher")]
#[command(about = "Synthetic tri-axial batch publisher for the Triaxial Monitor")]
#[command(version)]
struct Args {
    /// Serve line-delimited JSON to TCP subscribers instead of stdout
    #[arg(long, value_name = "HOST:PORT")]
    listen: Option<String>,

    /// Log raw samples to a sled database at this path
    #[arg(long, value_name = "PATH")]
    record: Option<PathBuf>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many batches (default: run until Ctrl+C)
    #[arg(long)]
    count: Option<u64>,

    /// Time compression factor (1 = real-time, 0 = no pacing)
    #[arg(short, long, default_value = "1")]
    speed: u32,

    /// Config file for sample rate, batch length and storage settings
    #[arg(short, long, env = "TRIAX_CONFIG")]
    config: Option<PathBuf>,
}

// ============================================================================
// Outputs
// ============================================================================

enum Output {
    Stdout(tokio::io::Stdout),
    Subscribers(broadcast::Sender<String>),
}

impl Output {
    /// Publish one line. Returns false once the consumer is gone.
    async fn publish(&mut self, line: String) -> Result<bool> {
        match self {
            Self::Stdout(stdout) => {
                let mut bytes = line.into_bytes();
                bytes.push(b'\n');
                match stdout.write_all(&bytes).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => return Ok(false),
                    Err(e) => return Err(e).context("writing to stdout"),
                }
                stdout.flush().await.context("flushing stdout")?;
                Ok(true)
            }
            Self::Subscribers(tx) => {
                // No subscribers yet is not an error.
                let _ = tx.send(line);
                Ok(true)
            }
        }
    }
}

/// Accept subscribers until cancelled; each gets its own broadcast receiver.
/// Batch period at `speed`x real time; `None` means unpaced (speed 0).
fn paced_period(batch_period: Duration, speed: u32) -> Option<Duration> {
    (speed != 0).then(|| (batch_period / speed).max(MIN_TICK))
}

async fn serve_subscribers(listener: TcpListener, tx: broadcast::Sender<String>, cancel_token: CancellationToken) {
    loop {
        let accepted = tokio::select! {
            () = cancel_token.cancelled() => break,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((socket, peer)) => {
                info!(peer = %peer, "Subscriber connected");
                tokio::spawn(stream_to_subscriber(socket, tx.subscribe(), cancel_token.clone()));
            }
            Err(e) => warn!(error = %e, "Accept failed"),
        }
    }
}

async fn stream_to_subscriber(
    mut socket: TcpStream,
    mut rx: broadcast::Receiver<String>,
    cancel_token: CancellationToken,
) {
    let peer = socket
        .peer_addr()
        .map_or_else(|_| "unknown".to_string(), |a| a.to_string());
    loop {
        let line = tokio::select! {
            () = cancel_token.cancelled() => break,
            received = rx.recv() => match received {
                Ok(line) => line,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(peer = %peer, skipped, "Subscriber lagging, batches skipped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        };
        let write = async {
            socket.write_all(line.as_bytes()).await?;
            socket.write_all(b"\n").await
        };
        if let Err(e) = write.await {
            debug!(peer = %peer, error = %e, "Subscriber write failed");
            break;
        }
    }
    info!(peer = %peer, "Subscriber disconnected");
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // stdout carries data, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cfg = match &args.config {
        Some(path) => MonitorConfig::load_from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => MonitorConfig::load(),
    };

    let mut sensor = SyntheticSensor::new(
        SyntheticProfile::default(),
        cfg.sensor.sample_rate_hz,
        cfg.sensor.batch_len,
        args.seed,
    );
    let mut log = match &args.record {
        Some(path) => Some(
            SampleLog::open(path, cfg.storage.flush_samples)
                .with_context(|| format!("opening sample log {}", path.display()))?,
        ),
        None => None,
    };

    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, stopping publisher");
            shutdown_token.cancel();
        }
    });

    let mut output = match &args.listen {
        Some(addr) => {
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("binding publisher to {addr}"))?;
            info!(address = %addr, "Publishing to TCP subscribers");
            let (tx, _) = broadcast::channel(SUBSCRIBER_BUFFER);
            tokio::spawn(serve_subscribers(listener, tx.clone(), cancel_token.clone()));
            Output::Subscribers(tx)
        }
        None => Output::Stdout(tokio::io::stdout()),
    };

    let period = paced_period(cfg.batch_period(), args.speed);
    let mut ticker = tokio::time::interval(period.unwrap_or(MIN_TICK));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!(
        rate_hz = cfg.sensor.sample_rate_hz,
        batch_len = sensor.batch_len(),
        speed = args.speed,
        recording = log.is_some(),
        "Publisher started"
    );

    let mut published = 0u64;
    while args.count.map_or(true, |n| published < n) {
        if period.is_some() {
            tokio::select! {
                () = cancel_token.cancelled() => break,
                _ = ticker.tick() => {}
            }
        } else if cancel_token.is_cancelled() {
            break;
        } else {
            tokio::task::yield_now().await;
        }

        let batch = sensor.next_batch();
        if let Some(log) = log.as_mut() {
            log.record_batch(&batch).context("recording samples")?;
        }
        if !output.publish(batch.to_json()?).await? {
            info!("Consumer closed the pipe");
            break;
        }
        published += 1;
    }

    if let Some(mut log) = log {
        let tail = log.flush().context("flushing sample log")?;
        info!(stored = log.count(), tail, "Sample log flushed");
    }
    cancel_token.cancel();
    info!(published, samples = sensor.samples_generated(), "Publisher stopped");
    Ok(())
}
