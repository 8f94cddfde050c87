//! Shared fixtures for pipeline integration tests.
#![allow(dead_code)]

use emotune_training::{
    ChartRenderer, ChartSpec, ClassifierModel, EvalPrediction, HyperParameters, ParameterInfo, Split,
    TensorState, TrainingEngine, TrainingError, TrainingResult,
};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A tiny BERT-named model kept entirely in memory.
pub struct ScriptedModel {
    params: BTreeMap<String, (Vec<usize>, bool)>,
}

impl ScriptedModel {
    /// `layers` encoder layers plus embeddings, pooler and classifier.
    pub fn bert_like(layers: usize) -> Self {
        let mut names = vec!["bert.embeddings.word_embeddings.weight".to_string()];
        for layer in 0..layers {
            names.push(format!("bert.encoder.layer.{layer}.output.dense.weight"));
            names.push(format!("bert.encoder.layer.{layer}.output.dense.bias"));
        }
        names.push("bert.pooler.dense.weight".to_string());
        names.push("classifier.weight".to_string());
        names.push("classifier.bias".to_string());

        let params = names
            .into_iter()
            .map(|name| {
                let shape = if name.ends_with("bias") { vec![2] } else { vec![2, 2] };
                (name, (shape, true))
            })
            .collect();
        Self { params }
    }

    pub fn trainable_names(&self) -> Vec<String> {
        self.params
            .iter()
            .filter(|(_, (_, trainable))| *trainable)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl ClassifierModel for ScriptedModel {
    fn parameters(&self) -> Vec<ParameterInfo> {
        self.params
            .iter()
            .map(|(name, (shape, trainable))| ParameterInfo {
                name: name.clone(),
                shape: shape.clone(),
                trainable: *trainable,
            })
            .collect()
    }

    fn set_trainable(&mut self, name: &str, trainable: bool) -> TrainingResult<()> {
        match self.params.get_mut(name) {
            Some(entry) => {
                entry.1 = trainable;
                Ok(())
            }
            None => Err(TrainingError::StructuralMismatch(format!("no parameter {name}"))),
        }
    }

    fn parameter_state(&self, name: &str) -> TrainingResult<TensorState> {
        let (shape, _) = self
            .params
            .get(name)
            .ok_or_else(|| TrainingError::Persistence(format!("no parameter {name}")))?;
        let count = shape.iter().product();
        TensorState::new(shape.clone(), (0..count).map(|v| v as f32).collect())
    }
}

/// Engine that replays fixed predictions.
pub struct ScriptedEngine {
    pub model: ScriptedModel,
    pub fail_at_epoch: Option<usize>,
    pub fail_test_eval: bool,
    pub test_truth: Vec<usize>,
    pub test_predicted: Vec<usize>,
    pub epochs_run: usize,
}

impl ScriptedEngine {
    pub fn new(model: ScriptedModel) -> Self {
        Self {
            model,
            fail_at_epoch: None,
            fail_test_eval: false,
            test_truth: vec![0, 1, 2, 3, 4, 5],
            test_predicted: vec![0, 1, 2, 3, 4, 5],
            epochs_run: 0,
        }
    }

    /// Test predictions where exactly `wrong` of `total` examples are misclassified.
    pub fn with_test_errors(mut self, total: usize, wrong: usize) -> Self {
        self.test_truth = (0..total).map(|i| i % 28).collect();
        self.test_predicted = self
            .test_truth
            .iter()
            .enumerate()
            .map(|(i, &t)| if i < wrong { (t + 1) % 28 } else { t })
            .collect();
        self
    }

    fn one_hot(predicted: &[usize]) -> Vec<Vec<f32>> {
        predicted
            .iter()
            .map(|&p| {
                let mut row = vec![0.0; 28];
                row[p] = 1.0;
                row
            })
            .collect()
    }
}

impl TrainingEngine for ScriptedEngine {
    type Model = ScriptedModel;

    fn model(&self) -> &ScriptedModel {
        &self.model
    }

    fn model_mut(&mut self) -> &mut ScriptedModel {
        &mut self.model
    }

    fn prepare(&mut self, _hyperparams: &HyperParameters, _num_epochs: usize) -> TrainingResult<()> {
        Ok(())
    }

    fn train_epoch(&mut self, epoch: usize) -> TrainingResult<f64> {
        if self.fail_at_epoch == Some(epoch) {
            return Err(TrainingError::TrainingFailure("device out of memory".to_string()));
        }
        self.epochs_run += 1;
        Ok(2.0 / epoch as f64)
    }

    fn evaluate(&mut self, split: Split) -> TrainingResult<EvalPrediction> {
        match split {
            Split::Test if self.fail_test_eval => {
                Err(TrainingError::TrainingFailure("device lost".to_string()))
            }
            Split::Test => Ok(EvalPrediction {
                logits: Self::one_hot(&self.test_predicted),
                label_ids: self.test_truth.clone(),
                loss: 0.4,
            }),
            _ => Ok(EvalPrediction {
                logits: Self::one_hot(&[0, 1, 1]),
                label_ids: vec![0, 1, 2],
                loss: 0.9,
            }),
        }
    }

    fn texts(&self, split: Split) -> Vec<String> {
        let n = match split {
            Split::Test => self.test_truth.len(),
            _ => 3,
        };
        (0..n).map(|i| format!("sentence {i}")).collect()
    }

    fn device_name(&self) -> String {
        "cpu".to_string()
    }
}

/// Writes a marker file per chart and remembers what it drew.
#[derive(Default)]
pub struct RecordingRenderer {
    pub drawn: RefCell<Vec<(PathBuf, ChartSpec)>>,
}

impl ChartRenderer for RecordingRenderer {
    fn render(&self, chart: &ChartSpec, path: &Path) -> TrainingResult<()> {
        std::fs::write(path, chart.title.as_bytes())?;
        self.drawn.borrow_mut().push((path.to_path_buf(), chart.clone()));
        Ok(())
    }
}
