//! Running precision of suggested mines against the real mine layout.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::board::Coord;
use crate::error::EngineResult;

/// Marker line written once at the start of every session.
pub const SESSION_MARKER: &str = "GameData";

/// Cumulative counters for one session.
///
/// Every call to [`AccuracyLedger::record`] judges one suggestion snapshot, so
/// a cell suggested on several moves is counted on each of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccuracyLedger {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub total_predictions: usize,
}

impl AccuracyLedger {
    /// Adds one snapshot's outcome and returns the precision so far.
    pub fn record(&mut self, actual: &HashSet<Coord>, predicted: &HashSet<Coord>) -> f64 {
        self.true_positives += actual.intersection(predicted).count();
        self.false_positives += predicted.difference(actual).count();
        self.false_negatives += actual.difference(predicted).count();
        self.total_predictions += predicted.len();
        self.precision()
    }

    /// `true_positives / total_predictions`, or 0.0 before any prediction.
    pub fn precision(&self) -> f64 {
        if self.total_predictions == 0 {
            return 0.0;
        }
        self.true_positives as f64 / self.total_predictions as f64
    }
}

/// Append-only destination for accuracy lines.
pub trait AccuracySink {
    /// Appends `line` followed by a newline.
    fn append_line(&mut self, line: &str) -> EngineResult<()>;
}

/// Appends to a file, reopening it in append mode for every line so that
/// earlier sessions are never overwritten.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        FileSink {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AccuracySink for FileSink {
    fn append_line(&mut self, line: &str) -> EngineResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

impl AccuracySink for Vec<String> {
    fn append_line(&mut self, line: &str) -> EngineResult<()> {
        self.push(line.to_string());
        Ok(())
    }
}

/// Session-scoped tracker: owns the ledger and writes every update to a sink.
#[derive(Debug)]
pub struct AccuracyTracker<S> {
    ledger: AccuracyLedger,
    sink: S,
}

impl<S: AccuracySink> AccuracyTracker<S> {
    /// Opens a session by writing the marker line.
    pub fn start(mut sink: S) -> EngineResult<Self> {
        sink.append_line(SESSION_MARKER)?;
        Ok(AccuracyTracker {
            ledger: AccuracyLedger::default(),
            sink,
        })
    }

    /// Judges one snapshot of predicted mines and appends the running precision.
    pub fn record(
        &mut self,
        actual: &HashSet<Coord>,
        predicted: &HashSet<Coord>,
    ) -> EngineResult<f64> {
        let precision = self.ledger.record(actual, predicted);
        self.sink
            .append_line(&format!("Accuracy Per Update: {precision:.4}"))?;
        tracing::debug!(
            precision,
            true_positives = self.ledger.true_positives,
            total_predictions = self.ledger.total_predictions,
            "accuracy updated"
        );
        Ok(precision)
    }

    pub fn ledger(&self) -> &AccuracyLedger {
        &self.ledger
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Ends the session and returns the final counters.
    pub fn finish(self) -> AccuracyLedger {
        self.ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords(cells: &[(usize, usize)]) -> HashSet<Coord> {
        cells.iter().map(|&cell| Coord::from(cell)).collect()
    }

    #[test]
    fn test_record_counts() {
        let mut ledger = AccuracyLedger::default();
        let precision = ledger.record(&coords(&[(0, 0), (1, 1)]), &coords(&[(0, 0), (2, 2)]));

        assert_eq!(
            ledger,
            AccuracyLedger {
                true_positives: 1,
                false_positives: 1,
                false_negatives: 1,
                total_predictions: 2,
            }
        );
        assert_eq!(precision, 0.5);
    }

    #[test]
    fn test_empty_prediction_has_zero_precision() {
        let mut ledger = AccuracyLedger::default();
        assert_eq!(ledger.record(&HashSet::new(), &HashSet::new()), 0.0);
        assert_eq!(ledger.record(&coords(&[(3, 3)]), &HashSet::new()), 0.0);
        assert_eq!(ledger.false_negatives, 1);
    }

    #[test]
    fn test_repeated_predictions_accumulate() {
        let mut ledger = AccuracyLedger::default();
        let actual = coords(&[(0, 0)]);

        ledger.record(&actual, &coords(&[(0, 0)]));
        let precision = ledger.record(&actual, &coords(&[(0, 0), (0, 1)]));

        assert_eq!(ledger.true_positives, 2);
        assert_eq!(ledger.total_predictions, 3);
        assert!((precision - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_tracker_writes_marker_and_updates() {
        let mut tracker = AccuracyTracker::start(Vec::new()).unwrap();
        tracker
            .record(&coords(&[(0, 0), (1, 1)]), &coords(&[(0, 0), (2, 2)]))
            .unwrap();
        tracker.record(&coords(&[(0, 0)]), &coords(&[(0, 0)])).unwrap();

        assert_eq!(
            tracker.sink(),
            &vec![
                "GameData".to_string(),
                "Accuracy Per Update: 0.5000".to_string(),
                "Accuracy Per Update: 0.6667".to_string(),
            ]
        );
        assert_eq!(tracker.finish().total_predictions, 3);
    }

    #[test]
    fn test_file_sink_appends_across_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accuracy_data.txt");

        for _ in 0..2 {
            let mut tracker = AccuracyTracker::start(FileSink::new(&path)).unwrap();
            tracker.record(&coords(&[(0, 0)]), &coords(&[(0, 0)])).unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "GameData\nAccuracy Per Update: 1.0000\nGameData\nAccuracy Per Update: 1.0000\n"
        );
    }
}
