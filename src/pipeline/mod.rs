//! Processing Pipeline Module
//!
//! ## Architecture
//!
//! ```text
//! BatchSource ──► reader task ──┐
//!                               ├──► mpsc<EngineEvent> ──► ProcessingLoop ──► MonitorState ──► API
//! POST /baseline/capture ───────┘                            (owns SpectralEngine)
//! ```
//!
//! The engine is never shared: producers talk to it through the queue and
//! readers see only the immutable snapshots it publishes.

mod engine;
mod gate;
mod snapshot;
mod state;
pub mod processing_loop;
pub mod source;

pub use engine::{BatchOutcome, EngineConfig, EngineError, EngineStats, SpectralEngine};
pub use gate::IngestGate;
pub use processing_loop::{forward_source, EngineEvent, ProcessingLoop};
pub use snapshot::{AxisSnapshot, EngineSnapshot, RawSeries};
pub use state::{MonitorState, MonitorStatus};
