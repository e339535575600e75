//! System-wide default constants.
//!
//! Every `MonitorConfig` default comes from here. Grouped by subsystem.

// ============================================================================
// Sensor
// ============================================================================

/// Nominal accelerometer sample rate (Hz).
pub const SAMPLE_RATE_HZ: f64 = 400.0;

/// Samples per axis in one transport message.
///
/// 40 samples at 400 Hz = one message every 100 ms.
pub const BATCH_LEN: usize = 40;

/// Display name used in logs and the status endpoint.
pub const SENSOR_NAME: &str = "accelerometer";

// ============================================================================
// Windows
// ============================================================================

/// Raw display window (samples). 400 = 1 s at 400 Hz.
pub const RAW_WINDOW_SAMPLES: usize = 400;

/// Short spectral block window (samples). 4 000 = 10 s at 400 Hz.
pub const SHORT_WINDOW_SAMPLES: usize = 4_000;

/// Long spectral block window (samples). 24 000 = 60 s at 400 Hz.
pub const LONG_WINDOW_SAMPLES: usize = 24_000;

// ============================================================================
// Spectrum / Spectrogram
// ============================================================================

/// Spectra are truncated to bins at or below this frequency (Hz).
pub const FREQ_LIMIT_HZ: f64 = 100.0;

/// Rows kept in each spectrogram history. 6 rows × 10 s = one minute.
pub const SPECTROGRAM_ROWS: usize = 6;

// ============================================================================
// Ingest
// ============================================================================

/// Minimum spacing between admitted batches (ms).
pub const MIN_INGEST_INTERVAL_MS: u64 = 10;

/// Capacity of the processing loop's event queue (events).
pub const EVENT_QUEUE_CAPACITY: usize = 1_024;

/// Batches between progress log lines in the processing loop.
pub const PROGRESS_LOG_INTERVAL_BATCHES: u64 = 100;

// ============================================================================
// Transport
// ============================================================================

/// TCP connect timeout (seconds).
pub const TCP_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Read timeout before a silent TCP connection is re-established (seconds).
pub const TCP_READ_TIMEOUT_SECS: u64 = 30;

/// Reconnection attempts before the TCP source gives up.
pub const TCP_MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// Initial reconnection delay (ms), doubled each attempt.
pub const TCP_INITIAL_RECONNECT_DELAY_MS: u64 = 500;

/// Reconnection delay cap (ms).
pub const TCP_MAX_RECONNECT_DELAY_MS: u64 = 30_000;

// ============================================================================
// Server / Storage
// ============================================================================

/// HTTP bind address for the snapshot API.
pub const SERVER_ADDR: &str = "0.0.0.0:8080";

/// Raw samples buffered before one batched write to the sample log.
///
/// 4 000 = every 10 s at 400 Hz.
pub const STORAGE_FLUSH_SAMPLES: usize = 4_000;

/// Default sample log location.
pub const STORAGE_PATH: &str = "./data/samples.db";
