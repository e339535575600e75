//! Batch source abstraction for transport ingestion.
//!
//! Provides a unified trait for reading batch messages from different
//! sources: stdin (JSON lines), TCP (line-delimited JSON from a publisher),
//! file replay, and the in-process synthetic sensor.
//!
//! Sources deliver raw message bytes, one line per message. They never
//! interpret the bytes: a line that is not UTF-8 or not JSON is still a
//! message, and the engine classifies and counts it like any other
//! malformed batch.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::acquisition::{BatchStreamClient, SyntheticSensor};
use crate::config::TransportConfig;

/// Events produced by a batch source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// One raw transport message (expected to be a JSON batch object).
    Message(Vec<u8>),
    /// Source reached end of data (EOF for files/stdin, exhausted synthetic run).
    Eof,
}

/// Trait abstracting where batch messages come from.
///
/// Implementations handle framing, reconnection, and pacing internally.
/// The reader task calls [`next_message`](BatchSource::next_message) in a
/// `select!` with cancellation.
#[async_trait]
pub trait BatchSource: Send + 'static {
    /// Read the next message from the source.
    ///
    /// Returns `SourceEvent::Eof` when no more data is available.
    /// Returns `Err` on unrecoverable errors (e.g. failed reconnection).
    async fn next_message(&mut self) -> Result<SourceEvent>;

    /// Human-readable name for logging (e.g. "stdin", "TCP", "replay").
    fn source_name(&self) -> &str;
}

/// Read lines until one is non-blank after trimming ASCII whitespace.
///
/// Returns `None` at EOF. Bytes are passed through untouched, so invalid
/// UTF-8 reaches the engine as a malformed message.
async fn next_non_blank_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin + Send,
{
    loop {
        buf.clear();
        if reader.read_until(b'\n', buf).await? == 0 {
            return Ok(None);
        }
        let line = buf.trim_ascii();
        if !line.is_empty() {
            return Ok(Some(line.to_vec()));
        }
    }
}

// ============================================================================
// Stdin Source (JSON batches, one per line)
// ============================================================================

/// Reads JSON batch messages from stdin.
///
/// `triaxial-publisher | triaxial-monitor --stdin`
pub struct StdinSource {
    reader: BufReader<tokio::io::Stdin>,
    line_buffer: Vec<u8>,
}

impl StdinSource {
    pub fn new() -> Self {
        Self {
            reader: BufReader::new(tokio::io::stdin()),
            line_buffer: Vec::with_capacity(4096),
        }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BatchSource for StdinSource {
    async fn next_message(&mut self) -> Result<SourceEvent> {
        let line = next_non_blank_line(&mut self.reader, &mut self.line_buffer)
            .await
            .context("reading stdin")?;
        Ok(line.map_or(SourceEvent::Eof, SourceEvent::Message))
    }

    fn source_name(&self) -> &str {
        "stdin"
    }
}

// ============================================================================
// TCP Source (line-delimited JSON from a publisher)
// ============================================================================

/// Reads batches from a publisher over TCP.
///
/// Wraps [`BatchStreamClient`], which handles timeouts and reconnection.
/// An error from the client means reconnection has already been exhausted.
pub struct TcpSource {
    client: BatchStreamClient,
}

impl TcpSource {
    /// Connect to a publisher and return a ready source.
    pub async fn connect(addr: &str, transport: &TransportConfig) -> Result<Self> {
        let mut client = BatchStreamClient::new(addr, transport);
        client
            .connect()
            .await
            .with_context(|| format!("connecting to publisher at {addr}"))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl BatchSource for TcpSource {
    async fn next_message(&mut self) -> Result<SourceEvent> {
        let line = self
            .client
            .read_message()
            .await
            .with_context(|| format!("publisher stream {}", self.client.addr()))?;
        Ok(SourceEvent::Message(line))
    }

    fn source_name(&self) -> &str {
        "TCP"
    }
}

// ============================================================================
// Replay Source (recorded JSON lines)
// ============================================================================

/// Replays a file of JSON batch lines with an optional inter-message delay.
pub struct ReplaySource {
    reader: BufReader<tokio::fs::File>,
    line_buffer: Vec<u8>,
    delay: Duration,
    yielded_first: bool,
}

impl ReplaySource {
    pub async fn open(path: &Path, delay: Duration) -> Result<Self> {
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("opening replay file {}", path.display()))?;
        Ok(Self {
            reader: BufReader::new(file),
            line_buffer: Vec::with_capacity(4096),
            delay,
            yielded_first: false,
        })
    }
}

#[async_trait]
impl BatchSource for ReplaySource {
    async fn next_message(&mut self) -> Result<SourceEvent> {
        // No delay before the first message.
        if self.yielded_first && !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match next_non_blank_line(&mut self.reader, &mut self.line_buffer)
            .await
            .context("reading replay file")?
        {
            Some(line) => {
                self.yielded_first = true;
                Ok(SourceEvent::Message(line))
            }
            None => Ok(SourceEvent::Eof),
        }
    }

    fn source_name(&self) -> &str {
        "replay"
    }
}

// ============================================================================
// Synthetic Source (in-process sensor)
// ============================================================================

/// Paces the synthetic sensor at one batch per `period`.
///
/// Batches are encoded to the transport format so they take the same
/// decode path as real messages.
pub struct SyntheticSource {
    sensor: SyntheticSensor,
    ticker: tokio::time::Interval,
    remaining: Option<u64>,
}

impl SyntheticSource {
    pub fn new(sensor: SyntheticSensor, period: Duration) -> Self {
        let mut ticker = tokio::time::interval(period.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        Self {
            sensor,
            ticker,
            remaining: None,
        }
    }

    /// Stop with `Eof` after `batches` messages.
    #[must_use]
    pub const fn with_limit(mut self, batches: u64) -> Self {
        self.remaining = Some(batches);
        self
    }
}

#[async_trait]
impl BatchSource for SyntheticSource {
    async fn next_message(&mut self) -> Result<SourceEvent> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return Ok(SourceEvent::Eof);
            }
            *remaining -= 1;
        }
        self.ticker.tick().await;
        let batch = self.sensor.next_batch();
        let text = batch.to_json().context("encoding synthetic batch")?;
        Ok(SourceEvent::Message(text.into_bytes()))
    }

    fn source_name(&self) -> &str {
        "synthetic"
    }
}
