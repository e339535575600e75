//! Rolling spectrogram history: one row per completed short window.
//!
//! Row 0 is the oldest, the last row the newest. The grid starts as all-zero
//! rows so a snapshot always has the full shape.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::num::NonZeroUsize;

use super::{linspace, ProcessingError};

/// By-value copy of a spectrogram for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrogramGrid {
    /// `rows[i][k]` is the magnitude of bin `k` in time step `i` (oldest first)
    pub rows: Vec<Vec<f64>>,
    /// Time label (s, relative to now) for each row
    pub times_s: Vec<f64>,
    /// Frequency label (Hz) for each column
    pub frequencies_hz: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct SpectrogramHistory {
    rows: VecDeque<Vec<f64>>,
    row_count: usize,
    frequencies_hz: Vec<f64>,
    row_period_s: f64,
    rows_pushed: u64,
}

impl SpectrogramHistory {
    /// `row_period_s` is the time span one row covers (the short window length in seconds).
    pub fn new(row_count: NonZeroUsize, frequencies_hz: Vec<f64>, row_period_s: f64) -> Self {
        let width = frequencies_hz.len();
        let rows = (0..row_count.get()).map(|_| vec![0.0; width]).collect();
        Self {
            rows,
            row_count: row_count.get(),
            frequencies_hz,
            row_period_s,
            rows_pushed: 0,
        }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.frequencies_hz.len()
    }

    /// Rows pushed since construction (zero rows from initialisation excluded).
    pub const fn rows_pushed(&self) -> u64 {
        self.rows_pushed
    }

    /// Discard the oldest row and append `row` as the newest.
    pub fn push_row(&mut self, row: &[f64]) -> Result<(), ProcessingError> {
        if row.len() != self.column_count() {
            return Err(ProcessingError::RowWidthMismatch {
                expected: self.column_count(),
                actual: row.len(),
            });
        }
        if self.rows.len() == self.row_count {
            self.rows.pop_front();
        }
        self.rows.push_back(row.to_vec());
        self.rows_pushed += 1;
        Ok(())
    }

    pub fn snapshot(&self) -> SpectrogramGrid {
        SpectrogramGrid {
            rows: self.rows.iter().cloned().collect(),
            times_s: row_times(self.row_count, self.row_period_s),
            frequencies_hz: self.frequencies_hz.clone(),
        }
    }
}

/// Row labels from `-(rows * period)` up to `0`.
fn row_times(rows: usize, period_s: f64) -> Vec<f64> {
    #[allow(clippy::cast_precision_loss)]
    let span = rows as f64 * period_s;
    linspace(-span, 0.0, rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(rows: usize, cols: usize) -> SpectrogramHistory {
        let freqs = (0..cols).map(|k| k as f64).collect();
        SpectrogramHistory::new(NonZeroUsize::new(rows).unwrap(), freqs, 10.0)
    }

    #[test]
    fn test_starts_as_zero_grid() {
        let grid = history(6, 4).snapshot();
        assert_eq!(grid.rows.len(), 6);
        assert!(grid.rows.iter().all(|r| r == &vec![0.0; 4]));
    }

    #[test]
    fn test_overflow_evicts_exactly_the_oldest_row() {
        let mut h = history(3, 2);
        for marker in 1..=4 {
            h.push_row(&[f64::from(marker), f64::from(marker)]).unwrap();
        }
        let grid = h.snapshot();
        assert_eq!(grid.rows, vec![vec![2.0, 2.0], vec![3.0, 3.0], vec![4.0, 4.0]]);
        assert_eq!(h.rows_pushed(), 4);
    }

    #[test]
    fn test_newest_row_is_last_after_partial_fill() {
        let mut h = history(4, 1);
        h.push_row(&[7.0]).unwrap();
        let grid = h.snapshot();
        assert_eq!(grid.rows.len(), 4);
        assert_eq!(grid.rows[3], vec![7.0]);
        assert_eq!(grid.rows[0], vec![0.0]);
    }

    #[test]
    fn test_width_mismatch_rejected_without_change() {
        let mut h = history(2, 3);
        let err = h.push_row(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            ProcessingError::RowWidthMismatch { expected: 3, actual: 2 }
        ));
        assert_eq!(h.rows_pushed(), 0);
    }

    #[test]
    fn test_time_labels_span_history() {
        let grid = history(6, 1).snapshot();
        assert_eq!(grid.times_s.len(), 6);
        assert!((grid.times_s[0] + 60.0).abs() < 1e-9);
        assert!((grid.times_s[1] + 48.0).abs() < 1e-9);
        assert!(grid.times_s[5].abs() < 1e-9);
    }
}
