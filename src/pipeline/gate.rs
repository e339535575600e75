//! Minimum-interval admission gate for incoming batches

use std::time::{Duration, Instant};

/// Admits at most one batch per `min_interval`.
///
/// The caller supplies `now`, so tests and replays control time.
#[derive(Debug, Clone)]
pub struct IngestGate {
    min_interval: Duration,
    last_admitted: Option<Instant>,
}

impl IngestGate {
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_admitted: None,
        }
    }

    /// Returns true and records `now` if at least `min_interval` has passed
    /// since the last admission. The first call always admits.
    pub fn admit(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_admitted {
            if now.saturating_duration_since(last) < self.min_interval {
                return false;
            }
        }
        self.last_admitted = Some(now);
        true
    }

    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub const fn last_admitted(&self) -> Option<Instant> {
        self.last_admitted
    }
}
