//! One complete fine-tuning run, start to finish.

use crate::artifacts::{ArtifactKind, RunId, RunSummary, SampledPredictions, make_artifact};
use crate::config::RunConfig;
use crate::error::{TrainingError, TrainingResult};
use crate::freeze::{FreezeOutcome, FreezePolicy};
use crate::labels::LabelMap;
use crate::layout::RunLayout;
use crate::metrics::{ClassificationSummary, FinalMetrics, argmax_rows};
use crate::model::{ModelLayout, Split, TrainingEngine};
use crate::orchestrator::{TrainingOrchestrator, TrainingRun, metrics_callback};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::report::{ChartRenderer, ReportGenerator};
use crate::sampler::{PredictionSample, PredictionSampler, PredictionSet};
use crate::strategy::BundleKey;
use crate::weights::WeightSelector;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

/// What a finished run hands back to the caller.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub freeze: FreezeOutcome,
    pub training: TrainingRun,
    pub bundle_keys: BTreeSet<BundleKey>,
    pub final_metrics: FinalMetrics,
    pub samples: SampledPredictions,
    pub charts: Vec<PathBuf>,
    pub summary_path: PathBuf,
}

/// Write one sample line; I/O failures surface as a recoverable display error.
pub fn write_sample<W: Write + ?Sized>(out: &mut W, sample: &PredictionSample) -> TrainingResult<()> {
    writeln!(
        out,
        "[{}, {:?}, {}, {}]",
        sample.index, sample.text, sample.true_label, sample.predicted_label
    )
    .map_err(|e| TrainingError::Display(e.to_string()))
}

pub struct FineTuneRun<'a> {
    config: &'a RunConfig,
    model_layout: ModelLayout,
    labels: LabelMap,
    progress: &'a dyn ProgressSink,
    renderer: &'a dyn ChartRenderer,
    sample_out: Box<dyn Write + 'a>,
    started: Instant,
}

impl<'a> FineTuneRun<'a> {
    pub fn new(config: &'a RunConfig, progress: &'a dyn ProgressSink, renderer: &'a dyn ChartRenderer) -> Self {
        Self {
            config,
            model_layout: ModelLayout::default(),
            labels: LabelMap::default(),
            progress,
            renderer,
            sample_out: Box::new(std::io::stdout()),
            started: Instant::now(),
        }
    }

    #[must_use]
    pub fn with_model_layout(mut self, layout: ModelLayout) -> Self {
        self.model_layout = layout;
        self
    }

    #[must_use]
    pub fn with_labels(mut self, labels: LabelMap) -> Self {
        self.labels = labels;
        self
    }

    /// Where sampled predictions are echoed (stdout by default).
    #[must_use]
    pub fn with_sample_output(mut self, out: Box<dyn Write + 'a>) -> Self {
        self.sample_out = out;
        self
    }

    /// Baseline for epoch and run durations; defaults to construction time.
    /// Callers pass the instant before model and dataset loading.
    #[must_use]
    pub fn with_started_at(mut self, started: Instant) -> Self {
        self.started = started;
        self
    }

    fn message(&self, message: String) {
        self.progress.on_event(ProgressEvent::Message { message });
    }

    /// Freeze, train, persist, sample and report.
    ///
    /// The engine is consumed: it is dropped once the tuned weights are
    /// extracted and the test predictions taken. Nothing is written to the
    /// weights path until both have succeeded.
    pub fn execute<E: TrainingEngine>(mut self, mut engine: E) -> TrainingResult<RunOutcome> {
        let started = self.started;
        let config = self.config;
        let strategy = config.strategy;
        let layout = RunLayout::new(config.output_path.clone());
        layout.ensure_dirs()?;

        self.message(format!("Device: {}", engine.device_name()));
        self.message(format!(
            "Learning rate: {} | Num epochs: {} | Batch size: {} | Weight decay: {} | Warmup steps: {}",
            config.hyperparams.learning_rate,
            config.num_epochs,
            config.hyperparams.batch_size,
            config.hyperparams.weight_decay,
            config.hyperparams.warmup_steps
        ));

        let freeze = FreezePolicy::new(self.model_layout.clone()).apply(strategy, engine.model_mut())?;
        for param in &freeze.parameters {
            self.message(format!(
                "Name: {} - Size: {:?} - Requires grad: {}",
                param.name, param.shape, param.trainable
            ));
        }
        self.message(format!("Trainable parameters: {}", freeze.trainable_parameter_count()));

        let orchestrator =
            TrainingOrchestrator::new(strategy, config.num_epochs, config.hyperparams.clone());
        let training = orchestrator.run(
            &mut engine,
            self.progress,
            metrics_callback(self.labels.clone(), started),
        )?;

        let selector = WeightSelector::new(self.model_layout.clone());
        let bundle = selector.extract(strategy, engine.model())?;
        let test = engine
            .evaluate(Split::Test)
            .map_err(|e| TrainingError::TrainingFailure(format!("test prediction: {e}")))?;
        let texts = engine.texts(Split::Test);
        let device = engine.device_name();
        drop(engine);

        let weights_path = layout.weights_path();
        selector.persist(&bundle, &weights_path)?;
        self.message(format!("Layer weights saved to {}", weights_path.display()));

        let predicted = argmax_rows(&test.logits);
        let summary = ClassificationSummary::compute(&test.label_ids, &predicted, &self.labels);
        let final_metrics = FinalMetrics {
            macro_f1: summary.macro_f1,
            accuracy: summary.accuracy,
            duration_secs: started.elapsed().as_secs_f64(),
            report: summary.report,
        };
        self.message(format!(
            "Metrics: F1: {:.4} Accuracy: {:.4}",
            final_metrics.macro_f1, final_metrics.accuracy
        ));
        self.message(format!("Final Report:\n{}", final_metrics.report));

        let predictions = PredictionSet::new(&texts, &test.label_ids, &predicted)?;
        let mut sampler = PredictionSampler::new(config.seed(), self.labels.clone());
        let count = config.settings.sample_count;
        let out = &mut self.sample_out;
        let correct = sampler.sample(&predictions, true, count, |s| write_sample(&mut **out, s))?;
        let incorrect = sampler.sample(&predictions, false, count, |s| write_sample(&mut **out, s))?;
        let samples = SampledPredictions { correct, incorrect };

        let charts = ReportGenerator::new(strategy).render(
            &training.history,
            &training.loss_log,
            &layout,
            self.renderer,
        )?;
        self.message("Graphs saved to disk".to_string());

        let mut artifacts = vec![make_artifact(ArtifactKind::WeightBundle, weights_path)?];
        for chart in &charts {
            artifacts.push(make_artifact(ArtifactKind::Chart, chart.clone())?);
        }

        let summary_path = layout.summary_path();
        RunSummary {
            run_id: RunId::new(),
            created_at: chrono::Utc::now(),
            config: config.clone(),
            device,
            epochs: training.history.records().to_vec(),
            losses: training.loss_log.clone(),
            final_metrics: final_metrics.clone(),
            samples: samples.clone(),
            artifacts,
        }
        .write(&summary_path)?;

        Ok(RunOutcome {
            freeze,
            training,
            bundle_keys: bundle.keys(),
            final_metrics,
            samples,
            charts,
            summary_path,
        })
    }
}
