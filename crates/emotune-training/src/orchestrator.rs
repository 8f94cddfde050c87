//! The epoch loop.

use crate::error::{TrainingError, TrainingResult};
use crate::labels::LabelMap;
use crate::metrics::{ClassificationSummary, EpochRecord, LossLog, MetricsHistory, argmax_rows};
use crate::model::{EvalPrediction, Split, TrainingEngine};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::strategy::{HyperParameters, TrainingStrategy};
use std::time::Instant;

/// Histories produced by a completed run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingRun {
    pub history: MetricsHistory,
    pub loss_log: LossLog,
}

/// Runs `num_epochs` sequential train/evaluate cycles.
#[derive(Debug, Clone)]
pub struct TrainingOrchestrator {
    strategy: TrainingStrategy,
    num_epochs: usize,
    hyperparams: HyperParameters,
}

fn epoch_failure(epoch: usize, step: &str, err: TrainingError) -> TrainingError {
    match err {
        TrainingError::TrainingFailure(msg) => {
            TrainingError::TrainingFailure(format!("epoch {epoch} {step} step: {msg}"))
        }
        other => TrainingError::TrainingFailure(format!("epoch {epoch} {step} step: {other}")),
    }
}

impl TrainingOrchestrator {
    #[must_use]
    pub fn new(strategy: TrainingStrategy, num_epochs: usize, hyperparams: HyperParameters) -> Self {
        Self { strategy, num_epochs, hyperparams }
    }

    /// Drive the engine through every epoch.
    ///
    /// `on_evaluate` receives the 1-based epoch, the validation predictions
    /// and the history, and must append exactly one record. Any failure
    /// aborts the run.
    pub fn run<E, F>(
        &self,
        engine: &mut E,
        progress: &dyn ProgressSink,
        mut on_evaluate: F,
    ) -> TrainingResult<TrainingRun>
    where
        E: TrainingEngine,
        F: FnMut(usize, &EvalPrediction, &mut MetricsHistory) -> TrainingResult<()>,
    {
        progress.on_event(ProgressEvent::Started {
            strategy: self.strategy,
            num_epochs: self.num_epochs,
        });

        engine
            .prepare(&self.hyperparams, self.num_epochs)
            .map_err(|e| epoch_failure(0, "prepare", e))?;

        let mut history = MetricsHistory::new();
        let mut loss_log = LossLog::default();

        for epoch in 1..=self.num_epochs {
            tracing::info!(epoch, total = self.num_epochs, "starting epoch");

            let train_loss = engine
                .train_epoch(epoch)
                .map_err(|e| epoch_failure(epoch, "training", e))?;
            loss_log.record_training(epoch, train_loss);

            let prediction = engine
                .evaluate(Split::Validation)
                .map_err(|e| epoch_failure(epoch, "evaluation", e))?;
            loss_log.record_validation(epoch, prediction.loss);

            on_evaluate(epoch, &prediction, &mut history)
                .map_err(|e| epoch_failure(epoch, "metrics", e))?;
            if history.len() != epoch {
                return Err(TrainingError::TrainingFailure(format!(
                    "evaluation callback must append exactly one record per epoch \
                     (epoch {epoch}, history has {})",
                    history.len()
                )));
            }

            if let Some(record) = history.last() {
                tracing::debug!(epoch, train_loss, eval_loss = prediction.loss, "epoch losses");
                progress.on_event(ProgressEvent::EpochFinished {
                    epoch,
                    total: self.num_epochs,
                    macro_f1: record.macro_f1,
                    accuracy: record.accuracy,
                    elapsed_secs: record.elapsed_secs,
                });
            }
        }

        progress.on_event(ProgressEvent::Finished { epochs: history.len() });
        Ok(TrainingRun { history, loss_log })
    }
}

/// The standard evaluation callback: argmax the logits, score them and
/// append an [`EpochRecord`] timed against `started`.
pub fn metrics_callback(
    labels: LabelMap,
    started: Instant,
) -> impl FnMut(usize, &EvalPrediction, &mut MetricsHistory) -> TrainingResult<()> {
    move |epoch, prediction, history| {
        let predicted = argmax_rows(&prediction.logits);
        let summary = ClassificationSummary::compute(&prediction.label_ids, &predicted, &labels);
        history.append(EpochRecord {
            epoch,
            macro_f1: summary.macro_f1,
            accuracy: summary.accuracy,
            elapsed_secs: started.elapsed().as_secs_f64(),
            report: summary.report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassifierModel, ParameterInfo, TensorState};
    use crate::progress::NullProgressSink;

    struct NoModel;

    impl ClassifierModel for NoModel {
        fn parameters(&self) -> Vec<ParameterInfo> {
            Vec::new()
        }
        fn set_trainable(&mut self, _name: &str, _trainable: bool) -> TrainingResult<()> {
            Ok(())
        }
        fn parameter_state(&self, name: &str) -> TrainingResult<TensorState> {
            Err(TrainingError::Persistence(name.to_string()))
        }
    }

    struct CountingEngine {
        model: NoModel,
        trained: Vec<usize>,
        fail_at: Option<usize>,
    }

    impl TrainingEngine for CountingEngine {
        type Model = NoModel;

        fn model(&self) -> &NoModel {
            &self.model
        }
        fn model_mut(&mut self) -> &mut NoModel {
            &mut self.model
        }
        fn prepare(&mut self, _hyperparams: &HyperParameters, _num_epochs: usize) -> TrainingResult<()> {
            Ok(())
        }
        fn train_epoch(&mut self, epoch: usize) -> TrainingResult<f64> {
            if self.fail_at == Some(epoch) {
                return Err(TrainingError::Other(anyhow::anyhow!("out of memory")));
            }
            self.trained.push(epoch);
            Ok(1.0 / epoch as f64)
        }
        fn evaluate(&mut self, _split: Split) -> TrainingResult<EvalPrediction> {
            Ok(EvalPrediction { logits: vec![vec![0.0, 1.0]], label_ids: vec![1], loss: 0.5 })
        }
        fn texts(&self, _split: Split) -> Vec<String> {
            vec!["text".to_string()]
        }
        fn device_name(&self) -> String {
            "cpu".to_string()
        }
    }

    fn engine(fail_at: Option<usize>) -> CountingEngine {
        CountingEngine { model: NoModel, trained: Vec::new(), fail_at }
    }

    fn orchestrator(epochs: usize) -> TrainingOrchestrator {
        TrainingOrchestrator::new(
            TrainingStrategy::Head,
            epochs,
            HyperParameters::for_strategy(TrainingStrategy::Head),
        )
    }

    #[test]
    fn test_history_length_matches_epochs() {
        let mut engine = engine(None);
        let run = orchestrator(3)
            .run(&mut engine, &NullProgressSink, metrics_callback(LabelMap::default(), Instant::now()))
            .unwrap();
        assert_eq!(run.history.len(), 3);
        assert_eq!(engine.trained, vec![1, 2, 3]);
        assert_eq!(run.loss_log.training.len(), 3);
        assert_eq!(run.loss_log.validation.len(), 3);
        assert_eq!(run.history.records()[0].accuracy, 1.0);
    }

    #[test]
    fn test_failure_aborts_run() {
        let mut engine = engine(Some(2));
        let err = orchestrator(4)
            .run(&mut engine, &NullProgressSink, metrics_callback(LabelMap::default(), Instant::now()))
            .unwrap_err();
        assert!(matches!(err, TrainingError::TrainingFailure(_)));
        assert!(err.to_string().contains("epoch 2 training step"));
        assert_eq!(engine.trained, vec![1]);
    }

    #[test]
    fn test_callback_that_skips_append_is_rejected() {
        let mut engine = engine(None);
        let err = orchestrator(1)
            .run(&mut engine, &NullProgressSink, |_, _, _| Ok(()))
            .unwrap_err();
        assert!(err.to_string().contains("exactly one record"));
    }
}
