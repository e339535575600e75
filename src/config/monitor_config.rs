//! Monitor Configuration - every tunable as a TOML value
//!
//! Each section implements `Default` with the values in [`super::defaults`],
//! so running without a config file reproduces the stock 400 Hz setup.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::defaults;

/// Environment variable naming the config file to load.
pub const CONFIG_ENV_VAR: &str = "TRIAX_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "monitor_config.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration.
///
/// Load with `MonitorConfig::load()` which searches:
/// 1. `$TRIAX_CONFIG` env var
/// 2. `./monitor_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub sensor: SensorConfig,

    #[serde(default)]
    pub windows: WindowConfig,

    #[serde(default)]
    pub spectrum: SpectrumConfig,

    #[serde(default)]
    pub spectrogram: SpectrogramConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

impl MonitorConfig {
    /// Load configuration using the standard search order:
    /// 1. `$TRIAX_CONFIG` environment variable
    /// 2. `./monitor_config.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), sensor = %config.sensor.name, "Loaded monitor config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(sensor = %config.sensor.name, "Loaded monitor config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    ///
    /// Unknown keys and suspicious values are logged as warnings; only
    /// impossible values are errors.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;

        for w in super::validation::validate_ranges(&config) {
            warn!("{}", w);
        }
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Reject values the engine cannot run with.
    ///
    /// Every violation is collected so one pass reports them all.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        let rate = self.sensor.sample_rate_hz;
        if !(rate.is_finite() && rate > 0.0) {
            errors.push(format!("sensor.sample_rate_hz ({rate}) must be a positive number"));
        }
        Self::check_positive(self.sensor.batch_len, "sensor.batch_len", &mut errors);
        Self::check_positive(self.windows.raw_samples, "windows.raw_samples", &mut errors);
        Self::check_positive(self.windows.short_samples, "windows.short_samples", &mut errors);
        Self::check_positive(self.windows.long_samples, "windows.long_samples", &mut errors);
        Self::check_positive(self.spectrogram.rows, "spectrogram.rows", &mut errors);
        Self::check_positive(self.ingest.queue_capacity, "ingest.queue_capacity", &mut errors);
        Self::check_positive(self.storage.flush_samples, "storage.flush_samples", &mut errors);

        let limit = self.spectrum.freq_limit_hz;
        if !(limit.is_finite() && limit >= 0.0) {
            errors.push(format!("spectrum.freq_limit_hz ({limit}) must be a non-negative number"));
        }

        if self.server.addr.parse::<SocketAddr>().is_err() {
            errors.push(format!(
                "server.addr ('{}') is not a valid HOST:PORT socket address",
                self.server.addr
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_positive(value: usize, name: &str, errors: &mut Vec<String>) {
        if value == 0 {
            errors.push(format!("{name} must be greater than zero"));
        }
    }

    /// Seconds covered by one short window at the nominal rate.
    #[allow(clippy::cast_precision_loss)]
    pub fn short_window_secs(&self) -> f64 {
        self.windows.short_samples as f64 / self.sensor.sample_rate_hz
    }

    /// Nominal spacing between transport messages.
    #[allow(clippy::cast_precision_loss)]
    pub fn batch_period(&self) -> Duration {
        Duration::from_secs_f64(self.sensor.batch_len as f64 / self.sensor.sample_rate_hz)
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Sensor
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Sensor name, used in logs and status only
    #[serde(default = "default_sensor_name")]
    pub name: String,

    /// Nominal sample rate (Hz)
    #[serde(default = "default_sample_rate")]
    pub sample_rate_hz: f64,

    /// Samples per axis in one message (synthetic sensor and publisher)
    #[serde(default = "default_batch_len")]
    pub batch_len: usize,
}

fn default_sensor_name() -> String {
    defaults::SENSOR_NAME.to_string()
}
const fn default_sample_rate() -> f64 {
    defaults::SAMPLE_RATE_HZ
}
const fn default_batch_len() -> usize {
    defaults::BATCH_LEN
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            name: default_sensor_name(),
            sample_rate_hz: default_sample_rate(),
            batch_len: default_batch_len(),
        }
    }
}

// ============================================================================
// Windows
// ============================================================================

/// Buffer capacities, in samples per axis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Sliding raw display window
    #[serde(default = "default_raw_samples")]
    pub raw_samples: usize,

    /// Short spectral block window (feeds the spectrogram)
    #[serde(default = "default_short_samples")]
    pub short_samples: usize,

    /// Long spectral block window (baseline candidate)
    #[serde(default = "default_long_samples")]
    pub long_samples: usize,
}

const fn default_raw_samples() -> usize {
    defaults::RAW_WINDOW_SAMPLES
}
const fn default_short_samples() -> usize {
    defaults::SHORT_WINDOW_SAMPLES
}
const fn default_long_samples() -> usize {
    defaults::LONG_WINDOW_SAMPLES
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            raw_samples: default_raw_samples(),
            short_samples: default_short_samples(),
            long_samples: default_long_samples(),
        }
    }
}

// ============================================================================
// Spectrum / Spectrogram
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectrumConfig {
    /// Upper frequency kept in every spectrum (Hz)
    #[serde(default = "default_freq_limit")]
    pub freq_limit_hz: f64,
}

const fn default_freq_limit() -> f64 {
    defaults::FREQ_LIMIT_HZ
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            freq_limit_hz: default_freq_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectrogramConfig {
    /// Time steps kept per axis
    #[serde(default = "default_spectrogram_rows")]
    pub rows: usize,
}

const fn default_spectrogram_rows() -> usize {
    defaults::SPECTROGRAM_ROWS
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            rows: default_spectrogram_rows(),
        }
    }
}

// ============================================================================
// Ingest
// ============================================================================

/// What happens to a valid batch that arrives inside the minimum interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestPolicy {
    /// Discard the whole batch before calibration and buffering
    #[default]
    DropBatch,
    /// Buffer every batch; only snapshot publication is rate limited
    RetainSamples,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Minimum spacing between admitted batches (ms)
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    #[serde(default)]
    pub policy: IngestPolicy,

    /// Event queue capacity between sources/API and the processing loop
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

const fn default_min_interval_ms() -> u64 {
    defaults::MIN_INGEST_INTERVAL_MS
}
const fn default_queue_capacity() -> usize {
    defaults::EVENT_QUEUE_CAPACITY
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
            policy: IngestPolicy::default(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

// ============================================================================
// Server
// ============================================================================

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server bind address.
    ///
    /// Can be overridden by the `--addr` CLI flag.
    #[serde(default = "default_server_addr")]
    pub addr: String,
}

fn default_server_addr() -> String {
    defaults::SERVER_ADDR.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_server_addr(),
        }
    }
}

// ============================================================================
// Transport
// ============================================================================

/// TCP source resilience settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    #[serde(default = "default_max_reconnect")]
    pub max_reconnect_attempts: u32,
}

const fn default_connect_timeout() -> u64 {
    defaults::TCP_CONNECT_TIMEOUT_SECS
}
const fn default_read_timeout() -> u64 {
    defaults::TCP_READ_TIMEOUT_SECS
}
const fn default_max_reconnect() -> u32 {
    defaults::TCP_MAX_RECONNECT_ATTEMPTS
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            max_reconnect_attempts: default_max_reconnect(),
        }
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Raw sample log settings (publisher side).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: String,

    /// Samples buffered before one batched write
    #[serde(default = "default_flush_samples")]
    pub flush_samples: usize,
}

fn default_storage_path() -> String {
    defaults::STORAGE_PATH.to_string()
}
const fn default_flush_samples() -> usize {
    defaults::STORAGE_FLUSH_SAMPLES
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            flush_samples: default_flush_samples(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = MonitorConfig::default();
        assert!(config.validate().is_ok(), "Default config must always validate");
    }

    #[test]
    fn test_empty_toml_produces_defaults() {
        let config: MonitorConfig = toml::from_str("").expect("empty TOML should parse");
        assert_eq!(config.sensor.sample_rate_hz, 400.0);
        assert_eq!(config.windows.raw_samples, 400);
        assert_eq!(config.windows.short_samples, 4_000);
        assert_eq!(config.windows.long_samples, 24_000);
        assert_eq!(config.spectrogram.rows, 6);
        assert_eq!(config.spectrum.freq_limit_hz, 100.0);
        assert_eq!(config.ingest.min_interval_ms, 10);
        assert_eq!(config.ingest.policy, IngestPolicy::DropBatch);
    }

    #[test]
    fn test_partial_toml_override() {
        let toml_str = r#"
[windows]
short_samples = 2000

[ingest]
policy = "retain_samples"
"#;
        let config = MonitorConfig::from_toml_str(toml_str).expect("should parse");
        assert_eq!(config.windows.short_samples, 2_000);
        assert_eq!(config.windows.long_samples, 24_000);
        assert_eq!(config.ingest.policy, IngestPolicy::RetainSamples);
    }

    #[test]
    fn test_validation_collects_every_violation() {
        let mut config = MonitorConfig::default();
        config.sensor.sample_rate_hz = 0.0;
        config.windows.short_samples = 0;
        config.server.addr = "not-an-address".to_string();

        match config.validate() {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors.len(), 3, "{errors:?}");
                assert!(errors.iter().any(|e| e.contains("sample_rate_hz")));
                assert!(errors.iter().any(|e| e.contains("short_samples")));
                assert!(errors.iter().any(|e| e.contains("server.addr")));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_policy_is_parse_error() {
        let result = MonitorConfig::from_toml_str("[ingest]\npolicy = \"sometimes\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_, _))));
    }

    #[test]
    fn test_toml_round_trip_keeps_values() {
        let mut config = MonitorConfig::default();
        config.sensor.name = "bench-rig".to_string();
        let text = config.to_toml().unwrap();
        let back = MonitorConfig::from_toml_str(&text).unwrap();
        assert_eq!(back.sensor.name, "bench-rig");
    }

    #[test]
    fn test_derived_timings() {
        let config = MonitorConfig::default();
        assert!((config.short_window_secs() - 10.0).abs() < 1e-12);
        assert_eq!(config.batch_period(), Duration::from_millis(100));
    }
}
