//! Raw Sample Log
//!
//! Persists raw tri-axial readings to Sled DB in fixed-size blocks.
//! Readings are buffered in memory and written as one atomic `sled::Batch`
//! per block, so a crash loses at most the unflushed tail.
//!
//! Key: arrival sequence as u64 big-endian bytes (sorts in arrival order)
//! Value: JSON `[x, y, z]`

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{Axis, PerAxis, SampleBatch};

/// Error type for storage operations
#[derive(Debug)]
pub enum StorageError {
    DatabaseError(String),
    SerializationError(String),
    CorruptKey(usize),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DatabaseError(msg) => write!(f, "Database error: {msg}"),
            Self::SerializationError(msg) => write!(f, "Serialization error: {msg}"),
            Self::CorruptKey(len) => write!(f, "Corrupt key: expected 8 bytes, found {len}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        Self::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// One persisted reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoredSample {
    pub sequence: u64,
    pub values: PerAxis<f64>,
}

pub struct SampleLog {
    db: Arc<sled::Db>,
    pending: Vec<PerAxis<f64>>,
    flush_samples: usize,
    next_sequence: u64,
    blocks_written: u64,
}

impl SampleLog {
    /// Open or create the log, continuing the sequence after any stored samples.
    pub fn open<P: AsRef<Path>>(path: P, flush_samples: usize) -> Result<Self, StorageError> {
        let db = sled::open(path.as_ref())?;
        let next_sequence = match db.last()? {
            Some((key, _)) => decode_key(&key)? + 1,
            None => 0,
        };

        tracing::info!(
            path = %path.as_ref().display(),
            stored = db.len(),
            flush_samples,
            "Sample log opened"
        );

        Ok(Self {
            db: Arc::new(db),
            pending: Vec::with_capacity(flush_samples),
            flush_samples: flush_samples.max(1),
            next_sequence,
            blocks_written: 0,
        })
    }

    /// Buffer one reading; writes a block once `flush_samples` are pending.
    ///
    /// Returns true when this call wrote a block.
    pub fn record(&mut self, reading: PerAxis<f64>) -> Result<bool, StorageError> {
        self.pending.push(reading);
        if self.pending.len() >= self.flush_samples {
            self.write_block()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Buffer every reading of a batch. Returns the number of blocks written.
    pub fn record_batch(&mut self, batch: &SampleBatch) -> Result<usize, StorageError> {
        let mut blocks = 0;
        for i in 0..batch.len() {
            let reading = PerAxis::from_fn(|axis: Axis| batch.samples(axis)[i]);
            if self.record(reading)? {
                blocks += 1;
            }
        }
        Ok(blocks)
    }

    /// Write any pending readings and flush sled to disk.
    pub fn flush(&mut self) -> Result<usize, StorageError> {
        let written = self.pending.len();
        if written > 0 {
            self.write_block()?;
        }
        self.db.flush()?;
        Ok(written)
    }

    fn write_block(&mut self) -> Result<(), StorageError> {
        let mut batch = sled::Batch::default();
        for reading in &self.pending {
            let value = serde_json::to_vec(&[reading.x, reading.y, reading.z])?;
            batch.insert(&self.next_sequence.to_be_bytes()[..], value);
            self.next_sequence += 1;
        }
        self.db.apply_batch(batch)?;
        self.blocks_written += 1;
        tracing::debug!(
            samples = self.pending.len(),
            next_sequence = self.next_sequence,
            "Sample block written"
        );
        self.pending.clear();
        Ok(())
    }

    /// Persisted readings (pending ones excluded).
    pub fn count(&self) -> usize {
        self.db.len()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub const fn blocks_written(&self) -> u64 {
        self.blocks_written
    }

    /// The most recent `limit` persisted readings, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<StoredSample>, StorageError> {
        let mut samples = Vec::with_capacity(limit);
        for item in self.db.iter().rev().take(limit) {
            let (key, value) = item?;
            let [x, y, z]: [f64; 3] = serde_json::from_slice(&value)?;
            samples.push(StoredSample {
                sequence: decode_key(&key)?,
                values: PerAxis::new(x, y, z),
            });
        }
        Ok(samples)
    }

    pub fn size_bytes(&self) -> u64 {
        self.db.size_on_disk().unwrap_or(0)
    }
}

fn decode_key(key: &[u8]) -> Result<u64, StorageError> {
    let bytes: [u8; 8] = key.try_into().map_err(|_| StorageError::CorruptKey(key.len()))?;
    Ok(u64::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn reading(v: f64) -> PerAxis<f64> {
        PerAxis::new(v, v + 1.0, v + 2.0)
    }

    #[test]
    fn test_writes_only_full_blocks() {
        let dir = tempdir().unwrap();
        let mut log = SampleLog::open(dir.path().join("samples.db"), 4).unwrap();

        for i in 0..3 {
            assert!(!log.record(reading(f64::from(i))).unwrap());
        }
        assert_eq!(log.count(), 0);
        assert_eq!(log.pending(), 3);

        assert!(log.record(reading(3.0)).unwrap());
        assert_eq!(log.count(), 4);
        assert_eq!(log.pending(), 0);
        assert_eq!(log.blocks_written(), 1);
    }

    #[test]
    fn test_flush_writes_partial_tail() {
        let dir = tempdir().unwrap();
        let mut log = SampleLog::open(dir.path().join("samples.db"), 100).unwrap();
        let batch = SampleBatch::new(vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]);
        assert_eq!(log.record_batch(&batch).unwrap(), 0);
        assert_eq!(log.flush().unwrap(), 2);

        let recent = log.recent(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].sequence, 1);
        assert_eq!(recent[0].values, PerAxis::new(2.0, 4.0, 6.0));
        assert_eq!(recent[1].values, PerAxis::new(1.0, 3.0, 5.0));
    }

    #[test]
    fn test_reopen_continues_sequence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("samples.db");
        {
            let mut log = SampleLog::open(&path, 2).unwrap();
            log.record(reading(0.0)).unwrap();
            log.record(reading(1.0)).unwrap();
            log.flush().unwrap();
        }
        let mut log = SampleLog::open(&path, 2).unwrap();
        log.record(reading(9.0)).unwrap();
        log.flush().unwrap();

        let recent = log.recent(1).unwrap();
        assert_eq!(recent[0].sequence, 2);
        assert_eq!(log.count(), 3);
    }
}
