//! Line-delimited batch stream over TCP
//!
//! The publisher writes one JSON batch object per line. This client reads
//! those lines with a per-read timeout, keeps the socket alive with TCP
//! keepalive, and reconnects with exponential backoff when the publisher
//! goes quiet or drops the connection.

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::config::{defaults, TransportConfig};

/// Transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Timeout waiting for data")]
    Timeout,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Reconnection exhausted after {0} attempts")]
    ReconnectExhausted(u32),
}

/// TCP client for a line-delimited JSON batch stream
pub struct BatchStreamClient {
    addr: String,
    stream: Option<BufReader<TcpStream>>,
    line_buffer: Vec<u8>,
    connect_timeout: Duration,
    read_timeout: Duration,
    max_reconnect_attempts: u32,
    initial_reconnect_delay: Duration,
    max_reconnect_delay: Duration,
    /// Total lines received since creation
    lines_received: u64,
    /// Total reconnections performed
    reconnections: u64,
    /// Total read timeouts encountered
    timeouts: u64,
}

impl BatchStreamClient {
    pub fn new(addr: impl Into<String>, transport: &TransportConfig) -> Self {
        Self {
            addr: addr.into(),
            stream: None,
            line_buffer: Vec::with_capacity(4096),
            connect_timeout: Duration::from_secs(transport.connect_timeout_secs),
            read_timeout: Duration::from_secs(transport.read_timeout_secs),
            max_reconnect_attempts: transport.max_reconnect_attempts,
            initial_reconnect_delay: Duration::from_millis(defaults::TCP_INITIAL_RECONNECT_DELAY_MS),
            max_reconnect_delay: Duration::from_millis(defaults::TCP_MAX_RECONNECT_DELAY_MS),
            lines_received: 0,
            reconnections: 0,
            timeouts: 0,
        }
    }

    /// Override the backoff schedule (initial delay doubles up to `max`).
    #[must_use]
    pub const fn with_reconnect_delays(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_reconnect_delay = initial;
        self.max_reconnect_delay = max;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Connect with timeout and enable keepalive.
    pub async fn connect(&mut self) -> Result<(), TransportError> {
        if self.stream.is_some() {
            return Ok(());
        }

        tracing::info!(address = %self.addr, "Connecting to batch publisher");

        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let sock_ref = socket2::SockRef::from(&stream);
        let keepalive = socket2::TcpKeepalive::new()
            .with_time(Duration::from_secs(30))
            .with_interval(Duration::from_secs(10));
        if let Err(e) = sock_ref.set_tcp_keepalive(&keepalive) {
            tracing::debug!(error = %e, "TCP keepalive not available");
        }

        self.stream = Some(BufReader::new(stream));
        tracing::info!(address = %self.addr, "Publisher connection established");
        Ok(())
    }

    pub async fn disconnect(&mut self) {
        if let Some(mut reader) = self.stream.take() {
            let _ = reader.get_mut().shutdown().await;
            tracing::info!(address = %self.addr, "Publisher connection closed");
        }
    }

    /// Reconnect with exponential backoff.
    pub async fn reconnect(&mut self) -> Result<(), TransportError> {
        self.disconnect().await;

        for attempt in 1..=self.max_reconnect_attempts {
            let delay = self
                .initial_reconnect_delay
                .saturating_mul(2u32.saturating_pow(attempt - 1))
                .min(self.max_reconnect_delay);

            tracing::warn!(
                attempt,
                max_attempts = self.max_reconnect_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Reconnecting to publisher"
            );
            tokio::time::sleep(delay).await;

            match self.connect().await {
                Ok(()) => {
                    self.reconnections += 1;
                    tracing::info!(
                        attempt,
                        total_reconnections = self.reconnections,
                        "Publisher reconnection successful"
                    );
                    return Ok(());
                }
                Err(e) => tracing::warn!(attempt, error = %e, "Reconnection attempt failed"),
            }
        }

        tracing::error!(
            max_attempts = self.max_reconnect_attempts,
            "Publisher reconnection exhausted"
        );
        Err(TransportError::ReconnectExhausted(self.max_reconnect_attempts))
    }

    /// Next non-empty line from the stream, reconnecting on timeout or drop.
    ///
    /// The line is returned as raw bytes; it may not be valid UTF-8.
    pub async fn read_message(&mut self) -> Result<Vec<u8>, TransportError> {
        if self.stream.is_none() {
            self.connect().await?;
        }

        loop {
            match self.read_line_inner().await {
                Ok(line) => {
                    self.lines_received += 1;
                    return Ok(line);
                }
                Err(TransportError::Timeout) => {
                    self.timeouts += 1;
                    tracing::warn!(
                        timeout_secs = self.read_timeout.as_secs(),
                        total_timeouts = self.timeouts,
                        "Publisher read timeout, reconnecting"
                    );
                    self.reconnect().await?;
                }
                Err(TransportError::ConnectionClosed) => {
                    tracing::warn!("Publisher closed the connection, reconnecting");
                    self.reconnect().await?;
                }
                Err(TransportError::ConnectionFailed(reason)) => {
                    tracing::warn!(%reason, "Publisher read failed, reconnecting");
                    self.reconnect().await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn read_line_inner(&mut self) -> Result<Vec<u8>, TransportError> {
        let reader = self
            .stream
            .as_mut()
            .ok_or_else(|| TransportError::ConnectionFailed("Not connected".to_string()))?;

        loop {
            self.line_buffer.clear();
            let read = reader.read_until(b'\n', &mut self.line_buffer);
            let bytes = match tokio::time::timeout(self.read_timeout, read).await {
                Ok(Ok(b)) => b,
                Ok(Err(e)) => return Err(TransportError::ConnectionFailed(e.to_string())),
                Err(_) => return Err(TransportError::Timeout),
            };
            if bytes == 0 {
                return Err(TransportError::ConnectionClosed);
            }
            let line = self.line_buffer.trim_ascii();
            if !line.is_empty() {
                return Ok(line.to_vec());
            }
        }
    }

    pub const fn stats(&self) -> TransportStats {
        TransportStats {
            connected: self.stream.is_some(),
            lines_received: self.lines_received,
            reconnections: self.reconnections,
            timeouts: self.timeouts,
        }
    }
}

/// Connection health counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct TransportStats {
    pub connected: bool,
    pub lines_received: u64,
    pub reconnections: u64,
    pub timeouts: u64,
}
