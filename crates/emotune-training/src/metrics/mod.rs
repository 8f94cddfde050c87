//! Per-epoch metric histories.

pub mod classification;

pub use classification::{ClassificationSummary, accuracy, argmax_rows, classification_report, macro_f1};

use crate::error::{TrainingError, TrainingResult};
use serde::{Deserialize, Serialize};

/// Evaluation result of one completed epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    /// 1-based epoch number.
    pub epoch: usize,
    pub macro_f1: f64,
    pub accuracy: f64,
    /// Seconds since the run started.
    pub elapsed_secs: f64,
    pub report: String,
}

/// Append-only, epoch-ordered record of evaluation results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsHistory {
    records: Vec<EpochRecord>,
}

impl MetricsHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the record for the next epoch.
    ///
    /// Records must arrive as epoch 1, 2, 3, ...; anything else is rejected.
    pub fn append(&mut self, record: EpochRecord) -> TrainingResult<()> {
        let expected = self.records.len() + 1;
        if record.epoch != expected {
            return Err(TrainingError::TrainingFailure(format!(
                "epoch record out of order: expected epoch {expected}, got {}",
                record.epoch
            )));
        }
        self.records.push(record);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn records(&self) -> &[EpochRecord] {
        &self.records
    }

    #[must_use]
    pub fn last(&self) -> Option<&EpochRecord> {
        self.records.last()
    }

    /// `(epoch, macro_f1)` points.
    #[must_use]
    pub fn f1_series(&self) -> Vec<(f64, f64)> {
        self.series(|r| r.macro_f1)
    }

    #[must_use]
    pub fn accuracy_series(&self) -> Vec<(f64, f64)> {
        self.series(|r| r.accuracy)
    }

    #[must_use]
    pub fn duration_series(&self) -> Vec<(f64, f64)> {
        self.series(|r| r.elapsed_secs)
    }

    fn series(&self, value: impl Fn(&EpochRecord) -> f64) -> Vec<(f64, f64)> {
        self.records.iter().map(|r| (r.epoch as f64, value(r))).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LossEntry {
    pub epoch: usize,
    pub loss: f64,
}

/// Training and validation losses as reported by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LossLog {
    pub training: Vec<LossEntry>,
    pub validation: Vec<LossEntry>,
}

impl LossLog {
    pub fn record_training(&mut self, epoch: usize, loss: f64) {
        self.training.push(LossEntry { epoch, loss });
    }

    pub fn record_validation(&mut self, epoch: usize, loss: f64) {
        self.validation.push(LossEntry { epoch, loss });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.training.is_empty() && self.validation.is_empty()
    }

    #[must_use]
    pub fn training_series(&self) -> Vec<(f64, f64)> {
        self.training.iter().map(|e| (e.epoch as f64, e.loss)).collect()
    }

    #[must_use]
    pub fn validation_series(&self) -> Vec<(f64, f64)> {
        self.validation.iter().map(|e| (e.epoch as f64, e.loss)).collect()
    }
}

/// Test-set metrics computed once after training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalMetrics {
    pub macro_f1: f64,
    pub accuracy: f64,
    pub duration_secs: f64,
    pub report: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(epoch: usize) -> EpochRecord {
        EpochRecord {
            epoch,
            macro_f1: 0.1 * epoch as f64,
            accuracy: 0.2 * epoch as f64,
            elapsed_secs: 10.0 * epoch as f64,
            report: String::new(),
        }
    }

    #[test]
    fn test_append_in_order() {
        let mut history = MetricsHistory::new();
        history.append(record(1)).unwrap();
        history.append(record(2)).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history.duration_series(), vec![(1.0, 10.0), (2.0, 20.0)]);
    }

    #[test]
    fn test_append_rejects_skipped_or_repeated_epoch() {
        let mut history = MetricsHistory::new();
        assert!(history.append(record(2)).is_err());
        history.append(record(1)).unwrap();
        assert!(history.append(record(1)).is_err());
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_loss_log_series() {
        let mut log = LossLog::default();
        assert!(log.is_empty());
        log.record_training(1, 2.5);
        log.record_validation(1, 2.7);
        assert_eq!(log.training_series(), vec![(1.0, 2.5)]);
        assert_eq!(log.validation_series(), vec![(1.0, 2.7)]);
    }
}
