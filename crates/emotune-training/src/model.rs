//! Seams to the model and the training engine.
//!
//! The pipeline never touches tensors directly. A model exposes its named
//! parameters and their trainable flags; an engine runs epochs and returns
//! raw predictions.

use crate::error::{TrainingError, TrainingResult};
use crate::strategy::{HyperParameters, ParameterGroup};
use serde::{Deserialize, Serialize};

/// Shape and row-major values of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorState {
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
}

impl TensorState {
    pub fn new(shape: Vec<usize>, values: Vec<f32>) -> TrainingResult<Self> {
        let expected: usize = shape.iter().product();
        if expected != values.len() {
            return Err(TrainingError::Persistence(format!(
                "tensor of shape {:?} needs {} values, got {}",
                shape,
                expected,
                values.len()
            )));
        }
        Ok(Self { shape, values })
    }

    #[must_use]
    pub fn elem_count(&self) -> usize {
        self.values.len()
    }
}

/// A named parameter and whether the optimizer will update it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub name: String,
    pub shape: Vec<usize>,
    pub trainable: bool,
}

/// A classifier whose parameters can be frozen and snapshotted by name.
pub trait ClassifierModel {
    /// All parameters in a stable order.
    fn parameters(&self) -> Vec<ParameterInfo>;

    fn set_trainable(&mut self, name: &str, trainable: bool) -> TrainingResult<()>;

    fn parameter_state(&self, name: &str) -> TrainingResult<TensorState>;
}

/// How parameter names map to groups.
///
/// Defaults follow the Hugging Face BERT naming (`bert.encoder.layer.11.`,
/// `bert.pooler.`, `classifier.`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelLayout {
    pub classifier_prefix: String,
    pub pooler_prefix: String,
    pub encoder_layer_prefix: String,
    /// Index of the encoder layer treated as "the last one".
    pub final_encoder_layer: usize,
}

impl Default for ModelLayout {
    fn default() -> Self {
        Self {
            classifier_prefix: "classifier.".to_string(),
            pooler_prefix: "bert.pooler.".to_string(),
            encoder_layer_prefix: "bert.encoder.layer.".to_string(),
            final_encoder_layer: 11,
        }
    }
}

impl ModelLayout {
    #[must_use]
    pub fn final_encoder_prefix(&self) -> String {
        format!("{}{}.", self.encoder_layer_prefix, self.final_encoder_layer)
    }

    /// The most specific group a parameter belongs to.
    #[must_use]
    pub fn group_of(&self, name: &str) -> ParameterGroup {
        if name.starts_with(&self.classifier_prefix) {
            ParameterGroup::ClassificationHead
        } else if name.starts_with(&self.pooler_prefix) {
            ParameterGroup::PoolingLayer
        } else if name.starts_with(&self.final_encoder_prefix()) {
            ParameterGroup::FinalEncoderLayer
        } else {
            ParameterGroup::Backbone
        }
    }
}

/// Dataset split an engine can evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Train,
    Validation,
    Test,
}

/// Raw output of an evaluation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalPrediction {
    /// One row of class logits per example.
    pub logits: Vec<Vec<f32>>,
    pub label_ids: Vec<usize>,
    /// Mean loss over the pass.
    pub loss: f64,
}

impl EvalPrediction {
    #[must_use]
    pub fn len(&self) -> usize {
        self.label_ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.label_ids.is_empty()
    }
}

/// A blocking training engine that owns the model for the run.
pub trait TrainingEngine {
    type Model: ClassifierModel;

    fn model(&self) -> &Self::Model;

    fn model_mut(&mut self) -> &mut Self::Model;

    /// Build optimizer and schedule once trainable flags are final.
    fn prepare(&mut self, hyperparams: &HyperParameters, num_epochs: usize) -> TrainingResult<()>;

    /// One pass over the training split. Returns the mean training loss.
    fn train_epoch(&mut self, epoch: usize) -> TrainingResult<f64>;

    fn evaluate(&mut self, split: Split) -> TrainingResult<EvalPrediction>;

    /// Input texts of a split, index-aligned with `evaluate(split)`.
    fn texts(&self, split: Split) -> Vec<String>;

    /// Human-readable device name, e.g. "cpu" or "cuda:0".
    fn device_name(&self) -> String;
}
