//! BERT sequence classifier built on candle-transformers.
//!
//! The encoder is `candle_transformers::models::bert::BertModel`; the
//! pooler and classification head sit on top under the Hugging Face
//! `BertForSequenceClassification` names, so every checkpoint tensor
//! (attention included) loads, freezes and saves by name.

use crate::error::{ModelError, ModelResult};
use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{Linear, Module, VarBuilder, VarMap};
use candle_transformers::models::bert::{BertModel, Config};
use emotune_training::{ClassifierModel, ParameterInfo, TensorState, TrainingError, TrainingResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{MutexGuard, PoisonError};

/// Dimensions read from a Hugging Face `config.json`; missing keys take
/// `bert-base-uncased` values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BertShape {
    pub vocab_size: usize,
    pub hidden_size: usize,
    pub num_hidden_layers: usize,
    pub num_attention_heads: usize,
    pub intermediate_size: usize,
    pub hidden_act: String,
    pub max_position_embeddings: usize,
    pub type_vocab_size: usize,
    pub layer_norm_eps: f64,
    pub pad_token_id: usize,
    #[serde(skip)]
    pub num_labels: usize,
}

impl Default for BertShape {
    fn default() -> Self {
        Self {
            vocab_size: 30522,
            hidden_size: 768,
            num_hidden_layers: 12,
            num_attention_heads: 12,
            intermediate_size: 3072,
            hidden_act: "gelu".to_string(),
            max_position_embeddings: 512,
            type_vocab_size: 2,
            layer_norm_eps: 1e-12,
            pad_token_id: 0,
            num_labels: 28,
        }
    }
}

impl BertShape {
    pub fn from_config_file(path: &Path, num_labels: usize) -> ModelResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ModelError::Source(format!("failed to read {}: {}", path.display(), e)))?;
        let mut shape: Self = serde_json::from_str(&text)?;
        shape.num_labels = num_labels;
        Ok(shape)
    }

    /// Encoder config for `BertModel`.
    pub fn encoder_config(&self) -> ModelResult<Config> {
        if self.num_attention_heads == 0 || self.hidden_size % self.num_attention_heads != 0 {
            return Err(ModelError::Source(format!(
                "hidden_size {} is not divisible by num_attention_heads {}",
                self.hidden_size, self.num_attention_heads
            )));
        }
        let value = serde_json::json!({
            "vocab_size": self.vocab_size,
            "hidden_size": self.hidden_size,
            "num_hidden_layers": self.num_hidden_layers,
            "num_attention_heads": self.num_attention_heads,
            "intermediate_size": self.intermediate_size,
            "hidden_act": self.hidden_act,
            "hidden_dropout_prob": 0.1,
            "max_position_embeddings": self.max_position_embeddings,
            "type_vocab_size": self.type_vocab_size,
            "initializer_range": 0.02,
            "layer_norm_eps": self.layer_norm_eps,
            "pad_token_id": self.pad_token_id,
        });
        Ok(serde_json::from_value(value)?)
    }
}

pub struct BertClassifier {
    varmap: VarMap,
    shape: BertShape,
    device: Device,
    bert: BertModel,
    pooler: Linear,
    classifier: Linear,
    frozen: BTreeSet<String>,
}

impl std::fmt::Debug for BertClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BertClassifier")
            .field("shape", &self.shape)
            .field("device", &self.device)
            .field("frozen", &self.frozen.len())
            .finish_non_exhaustive()
    }
}

impl BertClassifier {
    /// Randomly initialised model of the given shape.
    pub fn new(shape: BertShape, device: &Device) -> ModelResult<Self> {
        let config = shape.encoder_config()?;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let bert = BertModel::load(vb.pp("bert"), &config)?;
        let pooler = candle_nn::linear(shape.hidden_size, shape.hidden_size, vb.pp("bert.pooler.dense"))?;
        let classifier = candle_nn::linear(shape.hidden_size, shape.num_labels, vb.pp("classifier"))?;

        Ok(Self { varmap, shape, device: device.clone(), bert, pooler, classifier, frozen: BTreeSet::new() })
    }

    #[must_use]
    pub fn shape(&self) -> &BertShape {
        &self.shape
    }

    #[must_use]
    pub fn device(&self) -> &Device {
        &self.device
    }

    fn vars(&self) -> MutexGuard<'_, HashMap<String, Var>> {
        self.varmap.data().lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy in every checkpoint tensor whose name and shape match.
    ///
    /// Older checkpoints name LayerNorm parameters `gamma`/`beta`; both
    /// spellings are accepted. Returns the number of tensors loaded.
    pub fn load_pretrained(&mut self, weights: &Path) -> ModelResult<usize> {
        let tensors = candle_core::safetensors::load(weights, &self.device)?;
        let vars = self.vars();
        let mut loaded = 0usize;
        let mut skipped = Vec::new();

        for (name, var) in vars.iter() {
            let candidate = tensors.get(name).or_else(|| {
                let legacy = name
                    .strip_suffix("LayerNorm.weight")
                    .map(|p| format!("{p}LayerNorm.gamma"))
                    .or_else(|| name.strip_suffix("LayerNorm.bias").map(|p| format!("{p}LayerNorm.beta")))?;
                tensors.get(&legacy)
            });
            match candidate {
                Some(t) if t.dims() == var.dims() => {
                    var.set(&t.to_dtype(DType::F32)?)?;
                    loaded += 1;
                }
                _ => skipped.push(name.clone()),
            }
        }

        skipped.sort();
        tracing::info!(path = %weights.display(), loaded, skipped = skipped.len(), "loaded pretrained weights");
        tracing::debug!(?skipped, "parameters left at initialisation");
        Ok(loaded)
    }

    /// Variables the optimizer should update, ordered by name.
    #[must_use]
    pub fn trainable_vars(&self) -> Vec<Var> {
        let vars = self.vars();
        let mut named: Vec<(&String, &Var)> =
            vars.iter().filter(|(name, _)| !self.frozen.contains(*name)).collect();
        named.sort_by(|a, b| a.0.cmp(b.0));
        named.into_iter().map(|(_, var)| var.clone()).collect()
    }

    /// Logits `[batch, num_labels]` for `input_ids [batch, seq]` and a 0/1 `mask`.
    ///
    /// Pools the `[CLS]` position through `bert.pooler` as BERT does.
    pub fn forward(&self, input_ids: &Tensor, mask: &Tensor) -> ModelResult<Tensor> {
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.bert.forward(input_ids, &token_type_ids, Some(mask))?;
        let cls = hidden.narrow(1, 0, 1)?.squeeze(1)?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        Ok(self.classifier.forward(&pooled)?)
    }
}

fn to_training(err: candle_core::Error) -> TrainingError {
    ModelError::from(err).into()
}

impl ClassifierModel for BertClassifier {
    fn parameters(&self) -> Vec<ParameterInfo> {
        let vars = self.vars();
        let mut params: Vec<ParameterInfo> = vars
            .iter()
            .map(|(name, var)| ParameterInfo {
                name: name.clone(),
                shape: var.dims().to_vec(),
                trainable: !self.frozen.contains(name),
            })
            .collect();
        params.sort_by(|a, b| a.name.cmp(&b.name));
        params
    }

    fn set_trainable(&mut self, name: &str, trainable: bool) -> TrainingResult<()> {
        if !self.vars().contains_key(name) {
            return Err(ModelError::UnknownParameter(name.to_string()).into());
        }
        if trainable {
            self.frozen.remove(name);
        } else {
            self.frozen.insert(name.to_string());
        }
        Ok(())
    }

    fn parameter_state(&self, name: &str) -> TrainingResult<TensorState> {
        let tensor = {
            let vars = self.vars();
            let var = vars
                .get(name)
                .ok_or_else(|| TrainingError::from(ModelError::UnknownParameter(name.to_string())))?;
            var.as_tensor().clone()
        };
        let values = tensor
            .flatten_all()
            .and_then(|t| t.to_dtype(DType::F32))
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(to_training)?;
        TensorState::new(tensor.dims().to_vec(), values)
    }
}
