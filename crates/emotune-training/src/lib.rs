//! Emotune Training
//!
//! Engine-agnostic pieces of an emotion-classifier fine-tuning run:
//! - Resolving run configuration (`ConfigResolver`)
//! - Freezing parameter groups per strategy (`FreezePolicy`)
//! - Driving epochs and recording metrics (`TrainingOrchestrator`)
//! - Persisting the tuned weight subset (`WeightSelector`)
//! - Sampling predictions and drawing charts (`PredictionSampler`, `ReportGenerator`)

pub mod artifacts;
pub mod config;
pub mod error;
pub mod freeze;
pub mod labels;
pub mod layout;
pub mod metrics;
pub mod model;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod sampler;
pub mod strategy;
pub mod weights;

pub use artifacts::{ArtifactKind, RunArtifact, RunId, RunSummary, SampledPredictions};
pub use config::{ConfigResolver, RunConfig, RunSettings, usage};
pub use error::{TrainingError, TrainingResult};
pub use freeze::{FreezeOutcome, FreezePolicy};
pub use labels::{GO_EMOTIONS_LABELS, LabelMap};
pub use layout::RunLayout;
pub use metrics::{ClassificationSummary, EpochRecord, FinalMetrics, LossLog, MetricsHistory};
pub use model::{ClassifierModel, EvalPrediction, ModelLayout, ParameterInfo, Split, TensorState, TrainingEngine};
pub use orchestrator::{TrainingOrchestrator, TrainingRun, metrics_callback};
pub use pipeline::{FineTuneRun, RunOutcome, write_sample};
pub use progress::{NullProgressSink, ProgressEvent, ProgressSink, StdoutProgressSink};
pub use report::{ChartRenderer, ChartSpec, PlottersRenderer, ReportGenerator, Series};
pub use sampler::{PredictionSample, PredictionSampler, PredictionSet};
pub use strategy::{BundleKey, HyperParameters, ParameterGroup, STRATEGY_CHOICES, StrategyProfile, TrainingStrategy};
pub use weights::{WeightBundle, WeightSelector};
