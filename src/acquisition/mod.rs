//! Sensor data acquisition module
//!
//! Everything that produces raw batches before they reach the engine:
//! the synthetic accelerometer and the TCP client for a remote publisher.

pub mod synthetic;
pub mod tcp_client;

pub use synthetic::{SyntheticProfile, SyntheticSensor, Tone};
pub use tcp_client::{BatchStreamClient, TransportError, TransportStats};
