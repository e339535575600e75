//! Persistent storage using Sled DB.

mod sample_log;

pub use sample_log::{SampleLog, StorageError, StoredSample};
