//! Core data types shared by the engine, the sources and the API.

mod axis;
mod batch;

pub use axis::{Axis, PerAxis};
pub use batch::{BatchPayload, MalformedBatch, SampleBatch};
