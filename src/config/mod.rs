//! Monitor Configuration Module
//!
//! Sample rate, window sizes, frequency limit, ingest policy and the
//! collaborator settings, loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `TRIAX_CONFIG` environment variable (path to TOML file)
//! 2. `monitor_config.toml` in the current working directory
//! 3. Built-in defaults (400 Hz, 1 s / 10 s / 60 s windows, 100 Hz limit)
//!
//! ## Usage
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere:
//!
//! ```ignore
//! config::init(MonitorConfig::load());
//!
//! let rate = config::get().sensor.sample_rate_hz;
//! ```
//!
//! The spectral engine itself never reads the global: it receives an
//! `EngineConfig` by value at construction, which keeps it testable.

mod monitor_config;
pub mod defaults;
pub mod validation;

pub use monitor_config::*;

use std::sync::OnceLock;

/// Global monitor configuration, initialized once at startup.
static MONITOR_CONFIG: OnceLock<MonitorConfig> = OnceLock::new();

/// Initialize the global monitor configuration.
///
/// Later calls are ignored with a warning.
pub fn init(config: MonitorConfig) {
    if MONITOR_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Get a reference to the global monitor configuration.
///
/// Panics if `init()` has not been called: a missing config is a startup bug.
#[allow(clippy::expect_used)]
pub fn get() -> &'static MonitorConfig {
    MONITOR_CONFIG
        .get()
        .expect("config::get() called before config::init()")
}
