//! Triaxial Monitor - real-time vibration spectral monitor
//!
//! Reads tri-axial accelerometer batches from a transport, runs the
//! spectral engine, and serves snapshots over HTTP.
//!
//! # Usage
//!
//! ```bash
//! # Built-in synthetic sensor
//! cargo run --release
//!
//! # Pipe from the publisher
//! triaxial-publisher | triaxial-monitor --stdin
//!
//! # Subscribe to a publisher over TCP
//! triaxial-monitor --tcp 192.168.1.20:5005
//!
//! # Replay a recorded session (one JSON batch per line)
//! triaxial-monitor --replay session.jsonl --replay-delay-ms 0
//! ```
//!
//! # Environment Variables
//!
//! - `TRIAX_CONFIG`: path to the TOML config (default: ./monitor_config.toml)
//! - `TRIAX_CORS_ORIGINS`: comma-separated origins allowed to read the API
//! - `RUST_LOG`: logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use axum::Router;
use triaxial_monitor::acquisition::{SyntheticProfile, SyntheticSensor};
use triaxial_monitor::api::{create_app, ApiState};
use triaxial_monitor::config::{self, MonitorConfig};
use triaxial_monitor::pipeline::source::{
    BatchSource, ReplaySource, StdinSource, SyntheticSource, TcpSource,
};
use triaxial_monitor::pipeline::{
    forward_source, EngineConfig, EngineEvent, MonitorState, ProcessingLoop, SpectralEngine,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "triaxial-monitor")]
#[command(about = "Tri-axial vibration spectral monitor")]
#[command(version)]
struct CliArgs {
    /// Read JSON batches from stdin, one per line
    #[arg(long, conflicts_with_all = ["tcp", "replay"])]
    stdin: bool,

    /// Subscribe to a batch publisher over TCP
    #[arg(long, value_name = "HOST:PORT", conflicts_with = "replay")]
    tcp: Option<String>,

    /// Replay a file of JSON batches, one per line
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// Delay between replayed batches (0 = as fast as possible)
    #[arg(long, default_value = "100")]
    replay_delay_ms: u64,

    /// Seed for the built-in synthetic sensor
    #[arg(long)]
    seed: Option<u64>,

    /// Override the HTTP bind address from config
    #[arg(short, long)]
    addr: Option<String>,

    /// Config file (overrides TRIAX_CONFIG and ./monitor_config.toml)
    #[arg(short, long, env = "TRIAX_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

// ============================================================================
// Supervised Tasks
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskName {
    HttpServer,
    SourceReader,
    EngineProcessor,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::HttpServer => "http-server",
            Self::SourceReader => "source-reader",
            Self::EngineProcessor => "engine",
        })
    }
}

/// Time allowed for tasks to wind down after cancellation.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// ============================================================================
// Setup
// ============================================================================

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<MonitorConfig> {
    match path {
        Some(path) => {
            let config = MonitorConfig::load_from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?;
            info!(path = %path.display(), "Loaded monitor config");
            Ok(config)
        }
        None => Ok(MonitorConfig::load()),
    }
}

async fn open_source(args: &CliArgs, cfg: &MonitorConfig) -> Result<Box<dyn BatchSource>> {
    if let Some(addr) = &args.tcp {
        info!(address = %addr, "Input: TCP publisher");
        return Ok(Box::new(TcpSource::connect(addr, &cfg.transport).await?));
    }
    if args.stdin {
        info!("Input: stdin (JSON batches)");
        return Ok(Box::new(StdinSource::new()));
    }
    if let Some(path) = &args.replay {
        info!(path = %path.display(), delay_ms = args.replay_delay_ms, "Input: replay");
        return Ok(Box::new(
            ReplaySource::open(path, Duration::from_millis(args.replay_delay_ms)).await?,
        ));
    }

    info!(
        rate_hz = cfg.sensor.sample_rate_hz,
        batch_len = cfg.sensor.batch_len,
        "Input: synthetic sensor"
    );
    let sensor = SyntheticSensor::new(
        SyntheticProfile::default(),
        cfg.sensor.sample_rate_hz,
        cfg.sensor.batch_len,
        args.seed,
    );
    Ok(Box::new(SyntheticSource::new(sensor, cfg.batch_period())))
}

// ============================================================================
// Tasks
// ============================================================================

/// Serve the snapshot API until cancellation.
fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: tokio::net::TcpListener,
    app: Router,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        let task = TaskName::HttpServer;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!(task = %task, "Draining HTTP connections");
            })
            .await
            .context("HTTP server error")?;
        info!(task = %task, "HTTP server stopped");
        Ok(task)
    });
}

/// Spawn the source reader feeding the engine queue.
fn spawn_reader(
    task_set: &mut JoinSet<Result<TaskName>>,
    mut source: Box<dyn BatchSource>,
    events: mpsc::Sender<EngineEvent>,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        let forwarded = forward_source(source.as_mut(), events, cancel_token).await?;
        info!(task = %TaskName::SourceReader, forwarded, "Input finished, last snapshot stays available until shutdown");
        Ok(TaskName::SourceReader)
    });
}

/// Spawn the engine processing loop.
fn spawn_processor(
    task_set: &mut JoinSet<Result<TaskName>>,
    processing: ProcessingLoop,
    events: mpsc::Receiver<EngineEvent>,
) {
    task_set.spawn(async move {
        processing
            .run(events)
            .await
            .context("spectral engine stopped")?;
        Ok(TaskName::EngineProcessor)
    });
}

/// Watch the task set; the first failure or panic cancels everything.
///
/// A task finishing normally (e.g. the reader at end of input) leaves the
/// others running so the last snapshot stays available.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!(tasks = task_set.len(), "Supervisor watching tasks");

    loop {
        let joined = tokio::select! {
            () = cancel_token.cancelled() => {
                info!("Supervisor: shutdown requested");
                return Ok(());
            }
            joined = task_set.join_next() => joined,
        };

        match joined {
            Some(Ok(Ok(task))) => info!(task = %task, "Task finished"),
            Some(Ok(Err(e))) => {
                let chain = format!("{e:#}");
                error!(error = %chain, "Task failed, shutting down");
                cancel_token.cancel();
                return Err(e);
            }
            Some(Err(e)) => {
                error!(error = %e, "Task panicked, shutting down");
                cancel_token.cancel();
                return Err(anyhow::anyhow!("task panicked: {e}"));
            }
            None => {
                info!("Supervisor: no tasks left");
                return Ok(());
            }
        }
    }
}

/// Wait for cancelled tasks to finish so final statistics get logged.
async fn drain_tasks(task_set: &mut JoinSet<Result<TaskName>>) {
    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        while let Some(result) = task_set.join_next().await {
            match result {
                Ok(Ok(task)) => info!(task = %task, "Stopped"),
                Ok(Err(e)) => {
                    let chain = format!("{e:#}");
                    warn!(error = %chain, "Task ended with error during shutdown");
                }
                Err(e) => warn!(error = %e, "Task join error during shutdown"),
            }
        }
    })
    .await;
    if drained.is_err() {
        warn!(grace = ?SHUTDOWN_GRACE, "Tasks still running after grace period, aborting");
        task_set.abort_all();
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_json);

    config::init(load_config(args.config.as_ref())?);
    let cfg = config::get();

    let engine_config = EngineConfig::try_from(cfg)?;
    let engine = SpectralEngine::new(engine_config)?;
    let server_addr = args.addr.clone().unwrap_or_else(|| cfg.server.addr.clone());

    info!("Triaxial Monitor v{}", env!("CARGO_PKG_VERSION"));
    info!(
        sensor = %cfg.sensor.name,
        rate_hz = cfg.sensor.sample_rate_hz,
        short_s = cfg.short_window_secs(),
        freq_limit_hz = cfg.spectrum.freq_limit_hz,
        "Configuration"
    );

    let source = open_source(&args, cfg).await?;
    let monitor = Arc::new(RwLock::new(MonitorState::new(
        cfg.sensor.name.clone(),
        source.source_name(),
    )));
    let (events_tx, events_rx) = mpsc::channel(cfg.ingest.queue_capacity.max(1));

    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Unable to listen for Ctrl+C");
            return;
        }
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let listener = tokio::net::TcpListener::bind(&server_addr)
        .await
        .with_context(|| format!("binding HTTP server to {server_addr}"))?;
    info!(address = %server_addr, "API listening");
    let app = create_app(ApiState::new(monitor.clone(), events_tx.clone()));

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();
    spawn_http_server(&mut task_set, listener, app, cancel_token.clone());
    spawn_reader(&mut task_set, source, events_tx, cancel_token.clone());
    spawn_processor(
        &mut task_set,
        ProcessingLoop::new(engine, monitor, cancel_token.clone()),
        events_rx,
    );

    let outcome = run_supervisor(&mut task_set, cancel_token.clone()).await;
    cancel_token.cancel();
    drain_tasks(&mut task_set).await;

    info!("Triaxial Monitor shutdown complete");
    outcome
}
