//! [`TrainingEngine`] backed by candle.

use crate::classifier::{BertClassifier, BertShape};
use crate::data::{EmotionDataset, EncodedSplit};
use crate::device::{device_name, select_device};
use crate::error::{ModelError, ModelResult};
use crate::scheduler::LinearSchedule;
use crate::source::ModelSource;
use crate::tokenizer::BertTokenizer;
use candle_core::Device;
use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use emotune_training::{
    EvalPrediction, HyperParameters, LabelMap, RunConfig, Split, TrainingEngine, TrainingResult,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

struct OptimizerState {
    optimizer: AdamW,
    schedule: LinearSchedule,
}

pub struct CandleEngine {
    model: BertClassifier,
    data: EmotionDataset,
    device: Device,
    batch_size: usize,
    state: Option<OptimizerState>,
    rng: StdRng,
}

impl CandleEngine {
    #[must_use]
    pub fn new(model: BertClassifier, data: EmotionDataset, seed: Option<u64>) -> Self {
        let device = model.device().clone();
        let rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self {
            model,
            data,
            device,
            batch_size: HyperParameters::BATCH_SIZE,
            state: None,
            rng,
        }
    }

    /// Load the dataset and the pretrained checkpoint a run config points at.
    pub fn from_config(config: &RunConfig, labels: &LabelMap) -> ModelResult<Self> {
        let settings = &config.settings;
        let files = ModelSource::from_config(config)?.resolve()?;
        let shape = match &files.config {
            Some(path) => BertShape::from_config_file(path, labels.len())?,
            None => BertShape { num_labels: labels.len(), ..BertShape::default() },
        };

        let tokenizer = BertTokenizer::from_file(
            &files.tokenizer,
            settings.max_seq_len.min(shape.max_position_embeddings),
        )?;
        if tokenizer.vocab_size() > shape.vocab_size {
            return Err(ModelError::Tokenizer(format!(
                "tokenizer has {} tokens but the embedding table only {}",
                tokenizer.vocab_size(),
                shape.vocab_size
            )));
        }
        let data = EmotionDataset::load(&settings.dataset_dir, labels.len(), &tokenizer)?;

        let device = select_device();
        let mut model = BertClassifier::new(shape, &device)?;
        model.load_pretrained(&files.weights)?;

        Ok(Self::new(model, data, config.seed()))
    }

    fn steps_per_epoch(&self) -> usize {
        self.data.train.len().div_ceil(self.batch_size.max(1))
    }

    fn run_epoch(&mut self, epoch: usize) -> ModelResult<f64> {
        let state = self.state.as_mut().ok_or(ModelError::NotPrepared)?;
        let mut order: Vec<usize> = (0..self.data.train.len()).collect();
        order.shuffle(&mut self.rng);

        let mut total = 0.0;
        let mut batches = 0usize;
        for rows in order.chunks(self.batch_size.max(1)) {
            let (ids, mask, labels) = self.data.train.batch(rows, &self.device)?;
            let logits = self.model.forward(&ids, &mask)?;
            let loss = candle_nn::loss::cross_entropy(&logits, &labels)?;

            state.optimizer.set_learning_rate(state.schedule.lr());
            state.optimizer.backward_step(&loss)?;
            state.schedule.step();

            let value = f64::from(loss.to_scalar::<f32>()?);
            total += value;
            batches += 1;
            tracing::debug!(epoch, batch = batches, loss = value, lr = state.schedule.lr(), "train step");
        }

        Ok(if batches == 0 { 0.0 } else { total / batches as f64 })
    }

    fn predict(&self, split: &EncodedSplit) -> ModelResult<EvalPrediction> {
        let mut logits = Vec::with_capacity(split.len());
        let mut loss_sum = 0.0;
        let rows: Vec<usize> = (0..split.len()).collect();

        for chunk in rows.chunks(self.batch_size.max(1)) {
            let (ids, mask, labels) = split.batch(chunk, &self.device)?;
            let out = self.model.forward(&ids, &mask)?.detach();
            let loss = candle_nn::loss::cross_entropy(&out, &labels)?;
            loss_sum += f64::from(loss.to_scalar::<f32>()?) * chunk.len() as f64;
            logits.extend(out.to_vec2::<f32>()?);
        }

        let loss = if split.is_empty() { 0.0 } else { loss_sum / split.len() as f64 };
        Ok(EvalPrediction { logits, label_ids: split.labels.clone(), loss })
    }
}

impl TrainingEngine for CandleEngine {
    type Model = BertClassifier;

    fn model(&self) -> &BertClassifier {
        &self.model
    }

    fn model_mut(&mut self) -> &mut BertClassifier {
        &mut self.model
    }

    fn prepare(&mut self, hyperparams: &HyperParameters, num_epochs: usize) -> TrainingResult<()> {
        self.batch_size = hyperparams.batch_size.max(1);
        let vars = self.model.trainable_vars();
        let params = ParamsAdamW {
            lr: hyperparams.learning_rate,
            weight_decay: hyperparams.weight_decay,
            ..ParamsAdamW::default()
        };
        let optimizer = AdamW::new(vars, params).map_err(ModelError::from)?;
        let total_steps = self.steps_per_epoch() * num_epochs;
        let schedule = LinearSchedule::new(hyperparams.learning_rate, hyperparams.warmup_steps, total_steps);

        tracing::info!(
            trainable_tensors = self.model.trainable_vars().len(),
            total_steps,
            warmup_steps = hyperparams.warmup_steps,
            "optimizer ready"
        );
        self.state = Some(OptimizerState { optimizer, schedule });
        Ok(())
    }

    fn train_epoch(&mut self, epoch: usize) -> TrainingResult<f64> {
        Ok(self.run_epoch(epoch)?)
    }

    fn evaluate(&mut self, split: Split) -> TrainingResult<EvalPrediction> {
        Ok(self.predict(self.data.split(split))?)
    }

    fn texts(&self, split: Split) -> Vec<String> {
        self.data.split(split).texts.clone()
    }

    fn device_name(&self) -> String {
        device_name(&self.device)
    }
}
